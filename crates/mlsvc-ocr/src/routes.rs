//! OCR routes.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{health, scan};
use crate::state::AppState;

/// Create the OCR service routes.
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/scan", post(scan))
        .route("/scan/", post(scan))
        .route("/health", get(health))
        .route("/health/", get(health))
        .with_state(state)
}
