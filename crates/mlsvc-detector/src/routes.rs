//! Detector routes.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{detect, health};
use crate::state::AppState;

/// Create the detector service routes.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/detect", post(detect))
        .route("/detect/", post(detect))
        .route("/health", get(health))
        .route("/health/", get(health))
        .with_state(state)
}
