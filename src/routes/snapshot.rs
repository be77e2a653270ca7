use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;
use tracing::debug;

use crate::aggregator::HISTORY_CAPACITY;
use crate::display::Snapshot;
use crate::models::CanonicalReading;
use crate::session::SessionClient;

// ---

pub fn router() -> Router<SessionClient> {
    // ---
    Router::new()
        .route("/api/snapshot", get(snapshot))
        .route("/api/history", get(history))
}

/// Full consumer snapshot: current reading, history, alerts and status.
async fn snapshot(State(client): State<SessionClient>) -> Json<Snapshot> {
    // ---
    debug!("GET /api/snapshot");
    Json(client.snapshot())
}

/// Query parameters for the history table
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// History rows, newest first, as shown on the history page.
async fn history(
    Query(params): Query<HistoryQuery>,
    State(client): State<SessionClient>,
) -> Json<Vec<CanonicalReading>> {
    // ---
    debug!("GET /api/history {:?}", params);
    let limit = params.limit.unwrap_or(HISTORY_CAPACITY);
    let snapshot = client.snapshot();

    Json(snapshot.recent_readings(limit).into_iter().cloned().collect())
}
