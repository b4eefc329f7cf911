//! API error types.
//!
//! Every error leaves the service as `{"message": "..."}` with a status that
//! says whose fault it was: 4xx for bad uploads, 5xx for server faults.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use mlsvc_media::MediaError;

use crate::metrics;
use crate::model::ModelError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No '{0}' file part in the request")]
    MissingFile(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0} model is not available")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::MissingFile(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Media(e) if e.is_unsupported_type() => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Media(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_)
            | ApiError::Inference(_)
            | ApiError::Internal(_)
            | ApiError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Short machine-friendly reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::MissingFile(_) => "missing_file",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UnsupportedMediaType(_) => "unsupported_media_type",
            ApiError::NotFound(_) => "not_found",
            ApiError::ModelUnavailable(_) => "model_unavailable",
            ApiError::Inference(_) => "inference",
            ApiError::Internal(_) => "internal",
            ApiError::Media(e) => e.reason(),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Unavailable(name) => ApiError::ModelUnavailable(name),
            ModelError::Load(msg) | ModelError::Inference(msg) => ApiError::Inference(msg),
            ModelError::Media(e) => ApiError::Media(e),
        }
    }
}

/// Message sent in place of server-side detail in production.
pub const GENERIC_ERROR_MESSAGE: &str = "An internal error occurred";

/// Response extension marking a message that carries server-side detail.
#[derive(Debug, Clone, Copy)]
pub struct InternalDetail;

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

/// `{"message": ...}` envelope with `status`.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_client_error() {
            warn!(status = status.as_u16(), reason = self.reason(), error = %self, "Request rejected");
            if status != StatusCode::NOT_FOUND {
                metrics::record_upload_rejected(self.reason());
            }
        } else {
            error!(status = status.as_u16(), reason = self.reason(), error = %self, "Request failed");
        }

        let mut response = error_response(status, self.to_string());

        // Model unavailability is an operational fact, not internal detail
        if status.is_server_error() && !matches!(self, ApiError::ModelUnavailable(_)) {
            response.extensions_mut().insert(InternalDetail);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_map_to_status() {
        let err = ApiError::from(MediaError::UnsupportedMediaType("text/plain".into()));
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err = ApiError::from(MediaError::MissingContentType);
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err = ApiError::from(MediaError::CorruptImage("bad".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(MediaError::EmptyFile);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(MediaError::FfmpegNotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_model_errors_are_server_errors() {
        let err = ApiError::from(ModelError::Unavailable("whisper".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "whisper model is not available");

        let err = ApiError::from(ModelError::Inference("boom".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_errors_are_marked_internal() {
        let response = ApiError::inference("CUDA out of memory").into_response();
        assert!(response.extensions().get::<InternalDetail>().is_some());

        let response = ApiError::ModelUnavailable("yolov8".into()).into_response();
        assert!(response.extensions().get::<InternalDetail>().is_none());

        let response = ApiError::bad_request("bad").into_response();
        assert!(response.extensions().get::<InternalDetail>().is_none());
    }

    #[test]
    fn test_missing_file_message_names_field() {
        let err = ApiError::MissingFile("image".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("'image'"));
    }
}
