//! Reading normalizer.
//!
//! Turns a loosely-typed [`RawReading`] into a [`CanonicalReading`]. The
//! conversion is total: anything missing or unparseable degrades to zero (or
//! to [`UNKNOWN_TIMESTAMP`] for the time field) instead of failing, because a
//! partially populated sensor packet is still worth displaying.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};

use crate::models::{CanonicalReading, RawReading};

// ---

/// Raw gas concentration (ppm) that maps to 100% on the methane scale.
pub const FULL_SCALE_PPM: f64 = 2000.0;

/// Display format of `CanonicalReading::timestamp`. Minute resolution is
/// also the history dedup granularity.
pub const TIMESTAMP_FORMAT: &str = "%H:%M";

/// Timestamp used when the raw time field is missing or unparseable.
pub const UNKNOWN_TIMESTAMP: &str = "--:--";

/// Normalize a raw reading using the host's local time zone.
pub fn normalize(raw: &RawReading) -> CanonicalReading {
    normalize_in(raw, &Local)
}

/// Normalize a raw reading, rendering the timestamp in `tz`.
pub fn normalize_in<Tz>(raw: &RawReading, tz: &Tz) -> CanonicalReading
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // ---
    CanonicalReading {
        timestamp: format_timestamp(raw.time.as_deref(), tz),
        temperature: raw.temperature.unwrap_or(0.0),
        humidity: raw.humidity.unwrap_or(0.0),
        ph: raw.ph.unwrap_or(0.0),
        methane: methane_percent(raw.gas_ppm()),
    }
}

/// Scale a raw gas concentration to a `[0, 100]` percentage.
pub fn methane_percent(ppm: f64) -> f64 {
    // ---
    if ppm.is_nan() {
        return 0.0;
    }
    (ppm / FULL_SCALE_PPM * 100.0).clamp(0.0, 100.0)
}

fn format_timestamp<Tz>(time: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // ---
    let Some(time) = time else {
        return UNKNOWN_TIMESTAMP.to_string();
    };

    match DateTime::parse_from_rfc3339(time.trim()) {
        Ok(instant) => instant.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string(),
        Err(e) => {
            tracing::debug!("Unparseable reading time '{}': {}", time, e);
            UNKNOWN_TIMESTAMP.to_string()
        }
    }
}
