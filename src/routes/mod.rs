use axum::Router;

use crate::session::SessionClient;

mod control;
mod health;
mod snapshot;

// ---

/// Snapshot API gateway. `main.rs` only ever sees this function.
pub fn router(client: SessionClient) -> Router {
    // ---
    Router::new()
        .merge(snapshot::router())
        .merge(control::router())
        .merge(health::router())
        .with_state(client)
}
