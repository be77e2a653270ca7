//! Pull adapter: the sensor REST API behind the [`PullChannel`] seam.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{RawReading, TimeRange};

// ---

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Request/response source of sensor readings.
///
/// Both calls may fail; callers are expected to log the error and keep
/// whatever state they already have.
#[async_trait]
pub trait PullChannel: Send + Sync + 'static {
    /// Most recent readings, newest first.
    async fn fetch_latest(&self) -> Result<Vec<RawReading>>;

    /// Readings for `range`, oldest first.
    async fn fetch_history(&self, range: TimeRange) -> Result<Vec<RawReading>>;
}

/// [`PullChannel`] backed by the sensor REST API.
///
/// - `GET {base}/latest`
/// - `GET {base}/history?range=-24h` returning `{success, count, data}`
#[derive(Debug, Clone)]
pub struct HttpPullChannel {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPullChannel {
    // ---
    pub fn new(base_url: &str) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(HttpPullChannel {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        // ---
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?
            .error_for_status()
            .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid JSON from {}: {}", url, e))?;

        Ok(body)
    }
}

#[async_trait]
impl PullChannel for HttpPullChannel {
    async fn fetch_latest(&self) -> Result<Vec<RawReading>> {
        // ---
        let url = format!("{}/latest", self.base_url);
        let body = self.get_json(&url).await?;

        // Either a bare array or a `{data: [...]}` envelope.
        let items = match &body {
            Value::Array(items) => items,
            other => unwrap_envelope(other, &url)?,
        };

        Ok(parse_readings(items, &url))
    }

    async fn fetch_history(&self, range: TimeRange) -> Result<Vec<RawReading>> {
        // ---
        let url = format!("{}/history?range={}", self.base_url, range.api_param());
        let body = self.get_json(&url).await?;
        let items = unwrap_envelope(&body, &url)?;

        if let Some(count) = body.get("count").and_then(Value::as_u64) {
            if count as usize != items.len() {
                tracing::debug!(
                    "History envelope count {} differs from {} items received",
                    count,
                    items.len()
                );
            }
        }

        let readings = parse_readings(items, &url);
        tracing::info!("Fetched {} history readings for range {}", readings.len(), range);
        Ok(readings)
    }
}

// ---

fn unwrap_envelope<'a>(body: &'a Value, url: &str) -> Result<&'a Vec<Value>> {
    // ---
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        bail!("{} reported success=false", url);
    }

    body.get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("{} response missing 'data' array", url))
}

/// Parse each item on its own so one bad entry does not sink the batch.
fn parse_readings(items: &[Value], url: &str) -> Vec<RawReading> {
    // ---
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<RawReading>(item.clone()) {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::debug!("Skipping item {} from {}: {} - Raw item: {}", i, url, e, item);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_unwrapping() {
        // ---
        let body = json!({"success": true, "count": 1, "data": [{"temperature": 30.0}]});
        let items = unwrap_envelope(&body, "test").unwrap();
        assert_eq!(items.len(), 1);

        let failed = json!({"success": false, "data": []});
        assert!(unwrap_envelope(&failed, "test").is_err());

        let missing = json!({"success": true});
        assert!(unwrap_envelope(&missing, "test").is_err());
    }

    #[test]
    fn test_bad_items_are_skipped() {
        // ---
        let items = vec![
            json!({"_time": "2025-06-01T10:00:00Z", "gas": 500.0}),
            json!("not a reading"),
            json!({"temperature": "hot", "gas": 800.0}),
            json!(42),
            json!({}),
        ];

        // Non-objects are skipped; a mistyped field only blanks that field.
        let readings = parse_readings(&items, "test");
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].gas, Some(500.0));
        assert_eq!(readings[1].gas, Some(800.0));
        assert!(readings[1].temperature.is_none());
        assert_eq!(readings[2], RawReading::default());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        // ---
        let channel = HttpPullChannel::new("http://localhost:3000/api/").unwrap();
        assert_eq!(channel.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn test_unreachable_api_is_an_error() {
        // ---
        let channel = HttpPullChannel::new("http://127.0.0.1:9/api").unwrap();

        let err = tokio_test::block_on(channel.fetch_latest()).unwrap_err();
        assert!(err.to_string().contains("/latest"), "unexpected error: {}", err);
        assert!(tokio_test::block_on(channel.fetch_history(TimeRange::Day)).is_err());
    }
}
