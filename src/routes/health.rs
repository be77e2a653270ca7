// src/routes/health.rs
//! Liveness endpoint for the digester monitor.
//!
//! This module defines the `/health` route used by container orchestrators
//! and the dashboard front-end to verify that the service is running. It is
//! a sibling module in the `routes` directory and follows the Explicit Module
//! Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::session::SessionClient;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    push_connected: bool,
}

/// Handle `GET /health`.
///
/// Always `ok` while the process is serving. `push_connected` mirrors the
/// session's push-channel liveness so probes can tell "up" from "live".
async fn health(State(client): State<SessionClient>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        push_connected: client.snapshot().is_connected,
    })
}

pub fn router() -> Router<SessionClient> {
    Router::new().route("/health", get(health))
}
