//! Threshold alerts derived from canonical readings.
//!
//! Rules are checked in priority order and the first match wins, so a single
//! reading never produces more than one alert.

use std::collections::VecDeque;

use crate::models::{Alert, CanonicalReading, Severity};

// ---

/// Number of alerts kept in the feed. Older ones are dropped silently.
pub const ALERT_CAPACITY: usize = 5;

pub const METHANE_CRITICAL_PCT: f64 = 85.0;
pub const TEMPERATURE_MIN_C: f64 = 26.0;
pub const TEMPERATURE_MAX_C: f64 = 40.0;

pub const METHANE_CRITICAL_MESSAGE: &str = "Dangerously high methane level detected!";
pub const TEMPERATURE_WARNING_MESSAGE: &str = "Digester temperature outside optimal range.";

/// Apply the alert rules to one reading.
pub fn evaluate(reading: &CanonicalReading) -> Option<Alert> {
    // ---
    if reading.methane > METHANE_CRITICAL_PCT {
        Some(Alert::new(Severity::Critical, METHANE_CRITICAL_MESSAGE))
    } else if reading.temperature > TEMPERATURE_MAX_C || reading.temperature < TEMPERATURE_MIN_C {
        Some(Alert::new(Severity::Warning, TEMPERATURE_WARNING_MESSAGE))
    } else {
        None
    }
}

/// Rolling, newest-first notification feed bounded to [`ALERT_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct AlertFeed {
    alerts: VecDeque<Alert>,
}

impl AlertFeed {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(ALERT_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Alerts, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn reading(temperature: f64, methane: f64) -> CanonicalReading {
        // ---
        CanonicalReading {
            timestamp: "12:00".to_string(),
            temperature,
            humidity: 60.0,
            ph: 7.0,
            methane,
        }
    }

    #[test]
    fn test_methane_critical_wins_over_temperature() {
        // ---
        let alert = evaluate(&reading(50.0, 90.0)).expect("critical alert");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.message, METHANE_CRITICAL_MESSAGE);
    }

    #[test]
    fn test_temperature_window() {
        // ---
        // Inside the optimal window - no alert
        assert!(evaluate(&reading(35.0, 60.0)).is_none());

        // Too hot / too cold
        let hot = evaluate(&reading(41.0, 60.0)).expect("hot alert");
        assert_eq!(hot.severity, Severity::Warning);
        let cold = evaluate(&reading(25.9, 60.0)).expect("cold alert");
        assert_eq!(cold.severity, Severity::Warning);
        assert_eq!(cold.message, TEMPERATURE_WARNING_MESSAGE);

        // Edges are inclusive
        assert!(evaluate(&reading(26.0, 60.0)).is_none());
        assert!(evaluate(&reading(40.0, 60.0)).is_none());
    }

    #[test]
    fn test_methane_edge_is_exclusive() {
        // ---
        assert!(evaluate(&reading(35.0, 85.0)).is_none());
        assert!(evaluate(&reading(35.0, 85.01)).is_some());
    }

    #[test]
    fn test_zero_reading_warns_on_temperature() {
        // ---
        let alert = evaluate(&reading(0.0, 0.0)).expect("cold alert");
        assert_eq!(alert.severity, Severity::Warning);
    }

    #[test]
    fn test_feed_is_bounded_newest_first() {
        // ---
        let mut feed = AlertFeed::new();
        for i in 0..7 {
            feed.push(Alert::new(Severity::Info, format!("alert {}", i)));
        }

        assert_eq!(feed.len(), ALERT_CAPACITY);
        let messages: Vec<_> = feed.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(messages, ["alert 6", "alert 5", "alert 4", "alert 3", "alert 2"]);
    }

    #[test]
    fn test_alert_ids_are_unique() {
        // ---
        let a = evaluate(&reading(50.0, 90.0)).unwrap();
        let b = evaluate(&reading(50.0, 90.0)).unwrap();
        assert_ne!(a.id, b.id);
    }
}
