//! HTTP handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::Json;
use tracing::info;

use mlsvc_api::metrics::track_inference;
use mlsvc_api::{decode_image_upload, health_response, read_upload, ApiResult, ServingModel};
use mlsvc_media::MediaKind;
use mlsvc_models::ScanResult;

use crate::engine::OcrEngine;
use crate::state::AppState;

/// `POST /scan`
pub async fn scan(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ScanResult>> {
    let upload = read_upload(multipart, MediaKind::Image).await?;
    let engine = state.engine.get()?;
    let filename = upload.filename.clone();

    let decoded = decode_image_upload(upload).await?;
    let (width, height) = decoded.dimensions();

    let text = track_inference(engine.name(), engine.recognize(decoded.image)).await?;
    let result = ScanResult::from_raw(&text);

    info!(
        filename = %filename,
        width,
        height,
        chars = result.scanned_text.chars().count(),
        "Scan completed"
    );

    Ok(Json(result))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    health_response(state.engine.check_health().await)
}
