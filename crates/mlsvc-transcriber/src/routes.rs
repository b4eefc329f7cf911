//! Transcriber routes.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{health, transcribe};
use crate::state::AppState;

/// Create the transcriber service routes.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/transcribe/", post(transcribe))
        .route("/health", get(health))
        .route("/health/", get(health))
        .with_state(state)
}
