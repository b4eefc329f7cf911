//! Health check handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use mlsvc_models::{HealthResponse, LivenessResponse};

/// Liveness probe: the process is up, regardless of model state.
pub async fn liveness(service: &'static str) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
        service: service.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Render a model health report: 200 when healthy, 503 otherwise.
pub fn health_response(health: HealthResponse) -> Response {
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_codes() {
        assert_eq!(health_response(HealthResponse::healthy()).status(), StatusCode::OK);
        assert_eq!(
            health_response(HealthResponse::unhealthy("down")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
