//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while validating or decoding an upload.
///
/// Every variant is either the client's fault (bad upload) or the server's
/// fault (missing tool, I/O failure); see [`MediaError::is_client_error`].
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Uploaded file has no filename")]
    EmptyFilename,

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Uploaded file has no content type")]
    MissingContentType,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Invalid image: {0}")]
    CorruptImage(String),

    #[error("Invalid audio, the format may not be supported: {0}")]
    UndecodableAudio(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("{0} not found in PATH")]
    ProgramNotFound(String),

    #[error("{program} command failed: {message}")]
    ProcessFailed {
        program: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a process failure error.
    pub fn process_failed(
        program: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ProcessFailed {
            program: program.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error was caused by the uploaded content rather than by
    /// the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MediaError::EmptyFilename
                | MediaError::EmptyFile
                | MediaError::MissingContentType
                | MediaError::UnsupportedMediaType(_)
                | MediaError::UnsupportedExtension(_)
                | MediaError::CorruptImage(_)
                | MediaError::UndecodableAudio(_)
        )
    }

    /// Whether the error is a declared-type mismatch (HTTP 415).
    pub fn is_unsupported_type(&self) -> bool {
        matches!(
            self,
            MediaError::MissingContentType
                | MediaError::UnsupportedMediaType(_)
                | MediaError::UnsupportedExtension(_)
        )
    }

    /// Short machine-friendly reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            MediaError::EmptyFilename => "empty_filename",
            MediaError::EmptyFile => "empty_file",
            MediaError::MissingContentType => "missing_content_type",
            MediaError::UnsupportedMediaType(_) => "unsupported_media_type",
            MediaError::UnsupportedExtension(_) => "unsupported_extension",
            MediaError::CorruptImage(_) => "corrupt_image",
            MediaError::UndecodableAudio(_) => "undecodable_audio",
            MediaError::FfmpegNotFound | MediaError::ProgramNotFound(_) => "tool_missing",
            MediaError::ProcessFailed { .. } => "process_failed",
            MediaError::Timeout { .. } => "timeout",
            MediaError::Io(_) => "io",
            MediaError::Internal(_) => "internal",
        }
    }
}
