//! HTTP handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::Json;
use tracing::{info, warn};

use mlsvc_api::metrics::track_inference;
use mlsvc_api::{decode_image_upload, health_response, read_upload, ApiResult, ServingModel};
use mlsvc_media::MediaKind;
use mlsvc_models::{normalize_detections, Detection, ImageSize};

use crate::model::DetectionModel;
use crate::state::AppState;

/// `POST /detect`
pub async fn detect(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Vec<Detection>>> {
    let upload = read_upload(multipart, MediaKind::Image).await?;
    let model = state.model.get()?;
    let filename = upload.filename.clone();

    let decoded = decode_image_upload(upload).await?;
    let size = ImageSize::new(decoded.width(), decoded.height());

    let raw = track_inference(model.name(), model.detect(decoded.image)).await?;
    let detections = normalize_detections(&raw, size);

    if detections.len() < raw.len() {
        warn!(
            dropped = raw.len() - detections.len(),
            "Dropped detections without usable geometry"
        );
    }

    info!(
        filename = %filename,
        width = size.width,
        height = size.height,
        count = detections.len(),
        "Detection completed"
    );

    Ok(Json(detections))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    health_response(state.model.check_health().await)
}
