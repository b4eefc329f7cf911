//! Uploaded files and declared-type validation.

use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Accepted image content types.
const IMAGE_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/pjpeg",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/x-ms-bmp",
    "image/tiff",
];

/// Accepted image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

/// Accepted audio content types.
///
/// `video/webm` is what browsers attach to MediaRecorder audio captures.
const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/vnd.wave",
    "audio/ogg",
    "audio/webm",
    "audio/flac",
    "audio/x-flac",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
    "audio/aac",
    "audio/opus",
    "video/webm",
];

/// Accepted audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "ogg", "oga", "opus", "webm", "flac", "m4a", "mp4", "aac",
];

/// Kind of media a service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    /// Multipart field name the upload is expected under.
    pub fn field_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    pub fn allowed_mime_types(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_MIME_TYPES,
            MediaKind::Audio => AUDIO_MIME_TYPES,
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_EXTENSIONS,
            MediaKind::Audio => AUDIO_EXTENSIONS,
        }
    }

    /// Check a declared content type against the allow-list.
    ///
    /// Matching ignores case and parameters such as `; codecs=opus`.
    pub fn accepts_mime(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_mime_types().contains(&essence.as_str())
    }

    /// Check a file extension (without the dot) against the allow-list.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions().contains(&extension.as_str())
    }
}

/// A file submitted in a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Multipart field the file arrived under
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(
        field: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension of the filename, if it has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Validate the declared metadata of the upload.
    ///
    /// This is the first of two checks: it only looks at the filename,
    /// content type and size. Whether the bytes really decode as `kind` is
    /// checked by the image and audio decoders.
    pub fn validate_declared(&self, kind: MediaKind) -> MediaResult<()> {
        if self.filename.trim().is_empty() {
            return Err(MediaError::EmptyFilename);
        }

        let content_type = match self.content_type.as_deref().map(str::trim) {
            Some(ct) if !ct.is_empty() => ct,
            _ => return Err(MediaError::MissingContentType),
        };

        if !kind.accepts_mime(content_type) {
            return Err(MediaError::UnsupportedMediaType(content_type.to_string()));
        }

        match self.extension() {
            Some(ext) if kind.accepts_extension(&ext) => {}
            Some(ext) => return Err(MediaError::UnsupportedExtension(ext)),
            None => return Err(MediaError::UnsupportedExtension(self.filename.clone())),
        }

        if self.is_empty() {
            return Err(MediaError::EmptyFile);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content_type: Option<&str>, bytes: &[u8]) -> Upload {
        Upload::new("image", filename, content_type.map(String::from), bytes.to_vec())
    }

    #[test]
    fn test_accepts_valid_image() {
        let up = upload("test.png", Some("image/png"), b"data");
        assert!(up.validate_declared(MediaKind::Image).is_ok());
    }

    #[test]
    fn test_mime_parameters_and_case_ignored() {
        assert!(MediaKind::Audio.accepts_mime("audio/webm; codecs=opus"));
        assert!(MediaKind::Image.accepts_mime("IMAGE/JPEG"));
        assert!(!MediaKind::Image.accepts_mime("audio/mpeg"));
    }

    #[test]
    fn test_empty_filename_rejected() {
        let err = upload("", Some("image/png"), b"x")
            .validate_declared(MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, MediaError::EmptyFilename));
    }

    #[test]
    fn test_missing_content_type_rejected() {
        let err = upload("a.png", None, b"x")
            .validate_declared(MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingContentType));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let err = upload("a.mp3", Some("audio/mpeg"), b"x")
            .validate_declared(MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_extension_outside_allow_list_rejected() {
        let err = upload("payload.exe", Some("image/png"), b"x")
            .validate_declared(MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedExtension(ref e) if e == "exe"));

        let err = upload("noext", Some("image/png"), b"x")
            .validate_declared(MediaKind::Image)
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedExtension(_)));
    }

    #[test]
    fn test_empty_file_rejected() {
        let err = upload("a.wav", Some("audio/wav"), b"")
            .validate_declared(MediaKind::Audio)
            .unwrap_err();
        assert!(matches!(err, MediaError::EmptyFile));
    }

    #[test]
    fn test_extension_is_lowercased() {
        let up = upload("PHOTO.JPG", Some("image/jpeg"), b"x");
        assert_eq!(up.extension().as_deref(), Some("jpg"));
        assert!(up.validate_declared(MediaKind::Image).is_ok());
    }

    #[test]
    fn test_field_names() {
        assert_eq!(MediaKind::Image.field_name(), "image");
        assert_eq!(MediaKind::Audio.field_name(), "audio");
    }
}
