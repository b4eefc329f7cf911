//! Prometheus metrics for the model services.

use std::future::Future;
use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "mlsvc_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "mlsvc_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "mlsvc_http_requests_in_flight";

    // Inference metrics
    pub const INFERENCE_TOTAL: &str = "mlsvc_inference_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "mlsvc_inference_duration_seconds";

    // Upload metrics
    pub const UPLOAD_REJECTIONS_TOTAL: &str = "mlsvc_upload_rejections_total";
}

/// Label for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one model invocation.
///
/// `kind` is `request` for client traffic and `probe` for health checks.
pub fn record_inference(model: &str, kind: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("model", model.to_string()),
        ("kind", kind.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!(names::INFERENCE_TOTAL, &labels).increment(1);
    histogram!(names::INFERENCE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an upload rejected as the client's fault.
pub fn record_upload_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::UPLOAD_REJECTIONS_TOTAL, &labels).increment(1);
}

/// Time a request-path inference and record its outcome.
pub async fn track_inference<T, E, F>(model: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;
    let outcome = if result.is_ok() { "success" } else { "error" };
    record_inference(model, "request", outcome, start.elapsed().as_secs_f64());
    result
}

/// Metrics middleware for HTTP requests.
///
/// Requests are labelled by their route template, so unmatched paths cannot
/// blow up label cardinality.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
