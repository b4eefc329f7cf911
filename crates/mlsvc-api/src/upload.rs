//! Multipart upload extraction.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::Multipart;
use axum::http::StatusCode;
use tracing::debug;

use mlsvc_media::{decode_image, DecodedImage, MediaKind, Upload};

use crate::error::{ApiError, ApiResult};

/// Pull the file for `kind` out of a multipart request and validate its
/// declared metadata.
///
/// Takes the extractor result rather than `Multipart` itself so a request
/// that is not multipart at all still gets the JSON error envelope.
pub async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    kind: MediaKind,
) -> ApiResult<Upload> {
    let field_name = kind.field_name();

    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Request is not multipart");
            return Err(ApiError::MissingFile(field_name.to_string()));
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let upload = Upload::new(field_name, filename, content_type, bytes.to_vec());
        debug!(
            field = field_name,
            filename = %upload.filename,
            content_type = ?upload.content_type,
            size = upload.len(),
            "Received upload"
        );

        upload.validate_declared(kind)?;
        return Ok(upload);
    }

    Err(ApiError::MissingFile(field_name.to_string()))
}

/// Decode an image upload on the blocking pool.
///
/// Bytes that do not decode are a client error (400) even when the declared
/// type was valid.
pub async fn decode_image_upload(upload: Upload) -> ApiResult<DecodedImage> {
    let decoded = tokio::task::spawn_blocking(move || decode_image(&upload.bytes))
        .await
        .map_err(|e| ApiError::internal(format!("Image decode task failed: {}", e)))??;
    Ok(decoded)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Uploaded file is too large".to_string())
    } else {
        ApiError::bad_request(format!("Malformed multipart body: {}", err.body_text()))
    }
}
