//! Read-only views handed to the rendering layer.
//!
//! Nothing in here mutates session state; everything is derived from an
//! [`AggregateState`] at publish time.

use serde::Serialize;

use crate::aggregator::AggregateState;
use crate::models::{Alert, CanonicalReading, TimeRange};

// ---

/// Lower bound of the productive methane band, percent.
pub const METHANE_OPTIMAL_PCT: f64 = 55.0;
/// Upper bound of the band counted as efficient production, percent.
pub const METHANE_EFFICIENT_MAX_PCT: f64 = 85.0;
pub const METHANE_HIGH_PCT: f64 = 71.0;
pub const METHANE_CRITICAL_BAND_PCT: f64 = 86.0;

/// The device counts as offline when the push channel is down, or when it is
/// up but the latest reading is all zeros (a dead sensor looks the same as
/// no sensor).
pub fn is_offline(connected: bool, current: Option<&CanonicalReading>) -> bool {
    !connected || current.map_or(true, CanonicalReading::is_all_zero)
}

/// Methane gauge band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethaneStatus {
    Low,
    Optimal,
    High,
    Critical,
}

impl MethaneStatus {
    // ---
    pub fn classify(methane: f64) -> Self {
        // ---
        if methane >= METHANE_CRITICAL_BAND_PCT {
            MethaneStatus::Critical
        } else if methane >= METHANE_HIGH_PCT {
            MethaneStatus::High
        } else if methane >= METHANE_OPTIMAL_PCT {
            MethaneStatus::Optimal
        } else {
            MethaneStatus::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MethaneStatus::Low => "Low Production",
            MethaneStatus::Optimal => "Optimal Production",
            MethaneStatus::High => "High Concentration",
            MethaneStatus::Critical => "Critical Level",
        }
    }
}

/// Summary figures over the history buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    // ---
    pub avg_ph: f64,
    pub peak_methane: f64,
    /// Share of readings (percent) with methane inside the productive band.
    pub efficiency: f64,
}

impl HistoryStats {
    // ---
    pub fn from_readings<'a>(readings: impl IntoIterator<Item = &'a CanonicalReading>) -> Self {
        // ---
        let mut count = 0usize;
        let mut ph_sum = 0.0;
        let mut peak = f64::MIN;
        let mut efficient = 0usize;

        for reading in readings {
            count += 1;
            ph_sum += reading.ph;
            peak = peak.max(reading.methane);
            if (METHANE_OPTIMAL_PCT..=METHANE_EFFICIENT_MAX_PCT).contains(&reading.methane) {
                efficient += 1;
            }
        }

        if count == 0 {
            return HistoryStats::default();
        }

        HistoryStats {
            avg_ph: ph_sum / count as f64,
            peak_methane: peak,
            efficiency: efficient as f64 / count as f64 * 100.0,
        }
    }
}

/// Everything the rendering layer reads, captured at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    // ---
    pub current: Option<CanonicalReading>,
    /// Oldest first.
    pub history: Vec<CanonicalReading>,
    /// Newest first.
    pub alerts: Vec<Alert>,
    pub is_connected: bool,
    pub is_offline: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub selected_range: TimeRange,
    pub methane_status: MethaneStatus,
    pub stats: HistoryStats,
}

impl Snapshot {
    // ---
    pub fn from_state(state: &AggregateState) -> Self {
        // ---
        let current = state.current().cloned();
        let methane = current.as_ref().map_or(0.0, |c| c.methane);

        Snapshot {
            is_offline: is_offline(state.is_connected(), current.as_ref()),
            methane_status: MethaneStatus::classify(methane),
            stats: HistoryStats::from_readings(state.history()),
            history: state.history().cloned().collect(),
            alerts: state.alerts().to_vec(),
            is_connected: state.is_connected(),
            is_loading: state.is_loading(),
            error: state.last_error().map(str::to_string),
            selected_range: state.selected_range(),
            current,
        }
    }

    /// Up to `limit` history rows, newest first, for the history table.
    pub fn recent_readings(&self, limit: usize) -> Vec<&CanonicalReading> {
        self.history.iter().rev().take(limit).collect()
    }
}
