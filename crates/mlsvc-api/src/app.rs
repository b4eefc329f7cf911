//! App factory.

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, Uri};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::health::liveness;
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, hide_internal_errors, request_id, request_logging};

/// Wrap a service's routes with the shared endpoints and middleware.
///
/// Adds `/healthz`, `/metrics` (when a handle is given) and a JSON 404
/// fallback, then applies the body limit, production error hiding, metrics,
/// request ID, tracing, request logging and CORS layers. `routes` must
/// already have its state.
pub fn create_app(
    service: &'static str,
    routes: Router,
    config: &ServerConfig,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(routes)
        .route("/healthz", get(move || liveness(service)))
        .merge(metrics_routes)
        .fallback(not_found)
        // Multipart reads honour this limit and fail with 413
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(middleware::from_fn_with_state(
            config.is_production(),
            hide_internal_errors,
        ))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(
            TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
                info_span!(
                    "http_request",
                    service,
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&config.cors_origins))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
