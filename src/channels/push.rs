//! Push adapter: a socket.io connection to the sensor producer.
//!
//! Transport framing and the engine.io handshake belong to `rust_socketio`.
//! This module owns the reconnect policy and turns events into [`Update`]s.

use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::FutureExt;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::aggregator::{Source, Update};
use crate::models::RawReading;

// ---

/// Event names the producer uses for "new reading". All are synonyms.
pub const READING_EVENTS: [&str; 3] = ["sensor-data", "sensor-update", "data"];

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Extract the reading carried by a socket.io event payload.
///
/// Only the first argument of the emit is used. A JSON-encoded string
/// argument is decoded once more before giving up.
pub(crate) fn reading_from_payload(event: &str, payload: Payload) -> Option<RawReading> {
    // ---
    let first = match payload {
        Payload::Text(values) => values.into_iter().next(),
        other => {
            trace!("Ignoring non-text '{}' payload: {:?}", event, other);
            None
        }
    }?;

    let parsed = match first {
        Value::String(text) => serde_json::from_str::<RawReading>(&text),
        value => serde_json::from_value::<RawReading>(value),
    };

    match parsed {
        Ok(reading) => Some(reading),
        Err(e) => {
            debug!("Unparseable '{}' payload: {}", event, e);
            None
        }
    }
}

/// Push adapter: subscribes to the sensor producer and forwards every
/// reading to the session.
///
/// Owns its reconnect policy. Connectivity changes are reported as
/// [`Update::Connectivity`]; readings as [`Update::Reading`] with
/// [`Source::Push`].
#[derive(Debug, Clone)]
pub struct PushChannel {
    url: String,
    max_backoff: Duration,
}

impl PushChannel {
    // ---
    pub fn new(url: &str, max_backoff: Duration) -> Result<Self> {
        // ---
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("Push URL must be http(s): {}", url));
        }

        Ok(PushChannel {
            url: url.to_string(),
            max_backoff: max_backoff.max(INITIAL_BACKOFF),
        })
    }

    /// Run the adapter on its own task until `shutdown` flips.
    pub fn spawn(self, updates: mpsc::Sender<Update>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(updates, shutdown))
    }

    async fn run(self, updates: mpsc::Sender<Update>, mut shutdown: watch::Receiver<bool>) {
        // ---
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let (closed_tx, mut closed_rx) = mpsc::channel::<String>(1);

            let connected = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.connect(&updates, closed_tx) => result,
            };

            match connected {
                Ok(client) => {
                    info!("Push channel connected to {}", self.url);
                    backoff = INITIAL_BACKOFF;

                    if updates.send(Update::Connectivity(true)).await.is_err() {
                        disconnect(&client).await;
                        break;
                    }

                    let stopping = tokio::select! {
                        _ = shutdown.changed() => true,
                        reason = closed_rx.recv() => {
                            warn!(
                                "Push channel {} lost: {}",
                                self.url,
                                reason.as_deref().unwrap_or("handlers dropped")
                            );
                            false
                        }
                    };
                    disconnect(&client).await;

                    if stopping {
                        // The reducer may already be gone.
                        let _ = updates.try_send(Update::Connectivity(false));
                        break;
                    }
                    if updates.send(Update::Connectivity(false)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Push channel {} failed: {:#}", self.url, e),
            }

            debug!("Reconnecting to {} in {:?}", self.url, backoff);
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.max_backoff);
        }

        info!("Push channel closed");
    }

    /// Open one connection with a handler per reading event. `closed`
    /// receives a reason when the server goes away or the transport fails.
    async fn connect(&self, updates: &mpsc::Sender<Update>, closed: mpsc::Sender<String>) -> Result<Client> {
        // ---
        let mut builder = ClientBuilder::new(self.url.as_str()).reconnect(false);

        for name in READING_EVENTS {
            let updates = updates.clone();
            builder = builder.on(name, move |payload: Payload, _: Client| {
                let updates = updates.clone();
                async move {
                    if let Some(raw) = reading_from_payload(name, payload) {
                        let update = Update::Reading {
                            raw,
                            source: Source::Push,
                        };
                        // Closed queue means the session is ending.
                        let _ = updates.send(update).await;
                    }
                }
                .boxed()
            });
        }

        let on_close = closed.clone();
        builder = builder
            .on(Event::Close, move |_: Payload, _: Client| {
                let closed = on_close.clone();
                async move {
                    let _ = closed.try_send("closed by server".to_string());
                }
                .boxed()
            })
            .on(Event::Error, move |payload: Payload, _: Client| {
                let closed = closed.clone();
                async move {
                    let _ = closed.try_send(format!("transport error: {:?}", payload));
                }
                .boxed()
            });

        builder
            .connect()
            .await
            .map_err(|e| anyhow!("Failed to connect to {}: {}", self.url, e))
    }
}

async fn disconnect(client: &Client) {
    if let Err(e) = client.disconnect().await {
        debug!("Push channel disconnect: {}", e);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reading_from_object_payload() {
        // ---
        for name in READING_EVENTS {
            let payload = Payload::Text(vec![json!({"_time": "2025-06-01T10:00:00Z", "gas": 900})]);
            let raw = reading_from_payload(name, payload).expect("reading");
            assert_eq!(raw.gas, Some(900.0));
        }
    }

    #[test]
    fn test_reading_from_json_string_payload() {
        // ---
        let payload = Payload::Text(vec![json!(r#"{"temperature":31.5,"ph":"7.0"}"#)]);
        let raw = reading_from_payload("data", payload).expect("reading");
        assert_eq!(raw.temperature, Some(31.5));
        assert_eq!(raw.ph, Some(7.0));
    }

    #[test]
    fn test_unusable_payloads_are_ignored() {
        // ---
        assert!(reading_from_payload("data", Payload::Text(vec![])).is_none());
        assert!(reading_from_payload("data", Payload::Text(vec![json!("not json")])).is_none());
        assert!(reading_from_payload("data", Payload::Text(vec![json!([1, 2])])).is_none());
        assert!(reading_from_payload("data", Payload::Binary(vec![1, 2, 3].into())).is_none());
    }

    #[test]
    fn test_rejects_non_http_url() {
        // ---
        assert!(PushChannel::new("ws://localhost:3000", Duration::from_secs(5)).is_err());
        let push = PushChannel::new("http://localhost:3000", Duration::from_millis(10)).unwrap();
        assert_eq!(push.max_backoff, INITIAL_BACKOFF);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_nothing_and_stops_on_shutdown() {
        // ---
        let push = PushChannel::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = push.spawn(tx, shutdown_rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send_replace(true);
        task.await.unwrap();

        assert!(rx.try_recv().is_err());
    }
}
