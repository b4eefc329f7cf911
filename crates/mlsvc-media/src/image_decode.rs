//! Image decoding.

use std::io::Cursor;

use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// A fully decoded upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Format detected from the magic bytes (not the declared type)
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Decode image bytes, sniffing the real format from the magic bytes.
///
/// Any failure here means the upload is not the image it claims to be, so it
/// is reported as [`MediaError::CorruptImage`] (a client error). The decoder's
/// default allocation limits apply.
pub fn decode_image(bytes: &[u8]) -> MediaResult<DecodedImage> {
    let format = image::guess_format(bytes)
        .map_err(|_| MediaError::CorruptImage("unrecognised image format".to_string()))?;

    let reader = ImageReader::with_format(Cursor::new(bytes), format);
    let image = reader
        .decode()
        .map_err(|e| MediaError::CorruptImage(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(MediaError::CorruptImage("image has zero dimension".to_string()));
    }

    debug!(
        format = ?format,
        width = image.width(),
        height = image.height(),
        "Decoded image"
    );

    Ok(DecodedImage { image, format })
}
