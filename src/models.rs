//! Data models for the digester monitor.
//!
//! `RawReading` is whatever a producer sends us, `CanonicalReading` is what
//! the rest of the service works with.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---

/// Raw sensor payload as delivered by either channel.
///
/// Every field is optional. The gas concentration may arrive as a generic
/// `gas` value (MQ-4 sensor, ppm) or under a field already named `methane`.
/// A field of the wrong type reads as absent rather than rejecting the
/// whole packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    // ---
    #[serde(rename = "_time", alias = "time", default, deserialize_with = "lenient_time")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gas: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub methane: Option<f64>,
    #[serde(default, alias = "device", deserialize_with = "lenient_string")]
    pub device_id: Option<String>,
}

/// Finite number, or a string holding one.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    // ---
    let value = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

/// RFC 3339 string, or epoch milliseconds rewritten as RFC 3339.
fn lenient_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    // ---
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339()),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    // ---
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl RawReading {
    // ---
    /// Resolve the gas concentration in ppm.
    ///
    /// `gas` always takes priority over `methane`; neither present means 0 ppm.
    pub fn gas_ppm(&self) -> f64 {
        self.gas.or(self.methane).unwrap_or(0.0)
    }
}

/// Normalized, display-ready sensor snapshot.
///
/// `timestamp` is an `HH:MM` string, not an instant. It doubles as the
/// history dedup key. `methane` is a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    // ---
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub methane: f64,
}

impl CanonicalReading {
    // ---
    /// True when every measured field is exactly zero.
    pub fn is_all_zero(&self) -> bool {
        self.temperature == 0.0 && self.humidity == 0.0 && self.ph == 0.0 && self.methane == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One entry of the rolling notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    // ---
    pub id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

impl Alert {
    // ---
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Alert {
            id: Uuid::new_v4(),
            severity,
            message: message.into(),
            fired_at: Utc::now(),
        }
    }
}

/// Historical window selector.
///
/// The dashboard offers `1h/24h/7d/30d`; the history page swaps `1h` for
/// `90d` when scoping exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TimeRange {
    // ---
    pub const DASHBOARD: [TimeRange; 4] = [
        TimeRange::Hour,
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
    ];

    pub const EXPORT: [TimeRange; 4] = [
        TimeRange::Day,
        TimeRange::Week,
        TimeRange::Month,
        TimeRange::Quarter,
    ];

    /// Selector label, e.g. `"7d"`.
    pub fn label(self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
        }
    }

    /// Signed duration understood by the history endpoint, e.g. `"-7d"`.
    pub fn api_param(self) -> &'static str {
        match self {
            TimeRange::Hour => "-1h",
            TimeRange::Day => "-24h",
            TimeRange::Week => "-7d",
            TimeRange::Month => "-30d",
            TimeRange::Quarter => "-90d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim() {
            "1h" => Ok(TimeRange::Hour),
            "24h" => Ok(TimeRange::Day),
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            "90d" => Ok(TimeRange::Quarter),
            other => Err(anyhow!("Unknown time range '{}'", other)),
        }
    }
}
