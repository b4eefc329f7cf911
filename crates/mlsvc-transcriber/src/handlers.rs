//! HTTP handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::Json;
use tracing::info;

use mlsvc_api::metrics::track_inference;
use mlsvc_api::{health_response, read_upload, ApiResult, ServingModel};
use mlsvc_media::MediaKind;
use mlsvc_models::Transcript;

use crate::decoder::AudioDecode;
use crate::speech::SpeechModel;
use crate::state::AppState;

/// `POST /transcribe`
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Transcript>> {
    let upload = read_upload(multipart, MediaKind::Audio).await?;
    let model = state.model.get()?;

    let audio = state.decoder.decode(&upload.bytes).await?;
    let duration_secs = audio.duration_secs();

    let raw = track_inference(model.name(), model.transcribe(audio)).await?;
    let transcript = Transcript::from(raw);

    info!(
        filename = %upload.filename,
        duration_secs,
        language = %transcript.language,
        chars = transcript.transcribed_text.chars().count(),
        "Transcription completed"
    );

    Ok(Json(transcript))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    health_response(state.model.check_health().await)
}
