#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::watch;

use digester_monitor::{PullChannel, RawReading, Snapshot, TimeRange};

// ---

/// In-memory pull channel with scripted responses.
#[derive(Clone, Default)]
pub struct ScriptedPull {
    inner: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    latest: Vec<RawReading>,
    history: HashMap<TimeRange, Vec<RawReading>>,
    failures_left: usize,
    latest_calls: usize,
    history_calls: Vec<TimeRange>,
}

impl ScriptedPull {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(self, latest: Vec<RawReading>) -> Self {
        self.inner.lock().unwrap().latest = latest;
        self
    }

    pub fn with_history(self, range: TimeRange, readings: Vec<RawReading>) -> Self {
        self.inner.lock().unwrap().history.insert(range, readings);
        self
    }

    /// Fail the next `n` calls, whichever endpoint they hit.
    pub fn failing(self, n: usize) -> Self {
        self.inner.lock().unwrap().failures_left = n;
        self
    }

    pub fn set_latest(&self, latest: Vec<RawReading>) {
        self.inner.lock().unwrap().latest = latest;
    }

    pub fn latest_calls(&self) -> usize {
        self.inner.lock().unwrap().latest_calls
    }

    pub fn history_calls(&self) -> Vec<TimeRange> {
        self.inner.lock().unwrap().history_calls.clone()
    }
}

#[async_trait]
impl PullChannel for ScriptedPull {
    async fn fetch_latest(&self) -> Result<Vec<RawReading>> {
        // ---
        let mut script = self.inner.lock().unwrap();
        script.latest_calls += 1;
        if script.failures_left > 0 {
            script.failures_left -= 1;
            bail!("Failed to fetch latest data");
        }
        Ok(script.latest.clone())
    }

    async fn fetch_history(&self, range: TimeRange) -> Result<Vec<RawReading>> {
        // ---
        let mut script = self.inner.lock().unwrap();
        script.history_calls.push(range);
        if script.failures_left > 0 {
            script.failures_left -= 1;
            bail!("Failed to fetch history data");
        }
        Ok(script.history.get(&range).cloned().unwrap_or_default())
    }
}

/// Reading stamped at `10:{minute}:{second}` UTC.
pub fn reading_at(minute: u32, second: u32) -> RawReading {
    // ---
    RawReading {
        time: Some(format!("2025-06-01T10:{:02}:{:02}Z", minute, second)),
        temperature: Some(35.0),
        humidity: Some(62.0),
        ph: Some(7.1),
        gas: Some(1200.0),
        device_id: Some("digester-01".to_string()),
        ..Default::default()
    }
}

/// Wait until a published snapshot satisfies `pred`.
pub async fn wait_for<F>(rx: &mut watch::Receiver<Snapshot>, pred: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    // ---
    let wait = async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if pred(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.expect("session ended");
        }
    };

    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for snapshot")
}
