//! Consumer commands: range selection, manual refetch, error dismissal.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::models::TimeRange;
use crate::session::SessionClient;

// ---

pub fn router() -> Router<SessionClient> {
    // ---
    Router::new()
        .route("/api/range", put(select_range))
        .route("/api/refetch", post(refetch))
        .route("/api/error", delete(dismiss_error))
}

#[derive(Debug, Deserialize)]
struct RangeRequest {
    range: String,
}

async fn select_range(
    State(client): State<SessionClient>,
    Json(body): Json<RangeRequest>,
) -> Response {
    // ---
    let range: TimeRange = match body.range.parse() {
        Ok(range) => range,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(e.to_string())).into_response(),
    };

    info!("PUT /api/range - {}", range);
    respond(client.select_range(range).await, StatusCode::NO_CONTENT)
}

async fn refetch(State(client): State<SessionClient>) -> Response {
    // ---
    info!("POST /api/refetch");
    respond(client.refetch().await, StatusCode::ACCEPTED)
}

async fn dismiss_error(State(client): State<SessionClient>) -> Response {
    respond(client.dismiss_error().await, StatusCode::NO_CONTENT)
}

fn respond(result: anyhow::Result<()>, ok: StatusCode) -> Response {
    // ---
    match result {
        Ok(()) => ok.into_response(),
        Err(e) => {
            error!("Session command failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(e.to_string())).into_response()
        }
    }
}
