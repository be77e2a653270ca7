//! Aggregation core.
//!
//! `AggregateState` is owned by exactly one session task. Every input (push
//! event, poll result, fetch result, consumer command) arrives as an
//! [`Update`] and is applied to completion by [`AggregateState::apply`], so
//! no two updates ever interleave mid-step.
//!
//! Ordering between updates is arrival order only. A slow poll response that
//! lands after newer push readings still overwrites `current`.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alerts::{self, AlertFeed};
use crate::models::{Alert, CanonicalReading, RawReading, TimeRange};
use crate::normalize::normalize;

// ---

/// Maximum number of readings kept in `history`.
pub const HISTORY_CAPACITY: usize = 20;

/// Which channel delivered a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Push,
    Poll,
}

/// A single input to the reducer.
#[derive(Debug, Clone)]
pub enum Update {
    // ---
    /// New reading from the push channel or the poll timer.
    Reading { raw: RawReading, source: Source },
    /// Push-channel liveness changed.
    Connectivity(bool),
    /// A full fetch (latest + history) was started.
    FetchStarted,
    /// Latest reading from a full fetch. Sets `current` only.
    LatestLoaded(RawReading),
    /// History from a range fetch. Replaces `history` wholesale.
    HistoryLoaded {
        range: TimeRange,
        readings: Vec<RawReading>,
    },
    /// A full fetch finished; `Some` carries the failure description.
    FetchFinished(Option<String>),
    DismissError,
}

/// Session-scoped view of sensor state.
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    current: Option<CanonicalReading>,
    history: VecDeque<CanonicalReading>,
    alerts: AlertFeed,
    connected: bool,
    selected_range: TimeRange,
    last_error: Option<String>,
    pending_fetches: usize,
}

impl AggregateState {
    // ---
    pub fn new(selected_range: TimeRange) -> Self {
        AggregateState {
            selected_range,
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<&CanonicalReading> {
        self.current.as_ref()
    }

    /// History, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &CanonicalReading> + DoubleEndedIterator {
        self.history.iter()
    }

    pub fn alerts(&self) -> &AlertFeed {
        &self.alerts
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn selected_range(&self) -> TimeRange {
        self.selected_range
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_fetches > 0
    }

    /// Apply one update.
    pub fn apply(&mut self, update: Update) {
        // ---
        match update {
            Update::Reading { raw, source } => {
                self.accept(&raw, source);
            }
            Update::Connectivity(connected) => {
                if self.connected != connected {
                    info!("Push channel {}", if connected { "connected" } else { "disconnected" });
                }
                self.connected = connected;
            }
            Update::FetchStarted => {
                self.pending_fetches += 1;
                self.last_error = None;
            }
            Update::LatestLoaded(raw) => {
                self.current = Some(normalize(&raw));
            }
            Update::HistoryLoaded { range, readings } => {
                debug!("Replacing history with {} readings for range {}", readings.len(), range);
                self.replace_history(&readings);
            }
            Update::FetchFinished(error) => {
                self.pending_fetches = self.pending_fetches.saturating_sub(1);
                if let Some(e) = error {
                    warn!("Sensor data fetch failed: {}", e);
                    self.last_error = Some(e);
                }
            }
            Update::DismissError => {
                self.last_error = None;
            }
        }
    }

    /// Incremental accept path shared by both channels.
    ///
    /// `current` is always overwritten. `history` is appended unless its last
    /// entry carries the same minute timestamp. Returns the alert raised, if
    /// any.
    pub fn accept(&mut self, raw: &RawReading, source: Source) -> Option<Alert> {
        // ---
        let reading = normalize(raw);
        debug!(
            source = ?source,
            device = raw.device_id.as_deref().unwrap_or("-"),
            "Accepted reading at {}: temp={:.1} humidity={:.1} ph={:.2} methane={:.1}%",
            reading.timestamp,
            reading.temperature,
            reading.humidity,
            reading.ph,
            reading.methane
        );

        self.current = Some(reading.clone());

        let same_minute = self
            .history
            .back()
            .is_some_and(|last| last.timestamp == reading.timestamp);
        if !same_minute {
            self.history.push_back(reading.clone());
            while self.history.len() > HISTORY_CAPACITY {
                self.history.pop_front();
            }
        }

        let alert = alerts::evaluate(&reading)?;
        warn!(severity = ?alert.severity, "{}", alert.message);
        self.alerts.push(alert.clone());
        Some(alert)
    }

    /// Bulk replace path. Keeps fetch order, trims to the newest
    /// [`HISTORY_CAPACITY`] entries and skips the minute dedup.
    pub fn replace_history(&mut self, readings: &[RawReading]) {
        // ---
        let skip = readings.len().saturating_sub(HISTORY_CAPACITY);
        self.history = readings[skip..].iter().map(normalize).collect();
    }

    /// Switch the active range. Returns `true` if it actually changed.
    pub fn select_range(&mut self, range: TimeRange) -> bool {
        // ---
        if self.selected_range == range {
            return false;
        }
        info!("Selected range {} -> {}", self.selected_range, range);
        self.selected_range = range;
        true
    }
}
