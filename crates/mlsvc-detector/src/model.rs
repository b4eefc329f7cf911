//! Detection model seam.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

use mlsvc_api::{ModelError, ServingModel};
use mlsvc_models::RawDetection;

/// Side length of the black image used by health probes.
const PROBE_IMAGE_SIZE: u32 = 64;

/// Finds objects in a decoded image.
#[async_trait]
pub trait DetectionModel: ServingModel {
    /// Detections with boxes in pixel `xyxy`, relative to `image`.
    async fn detect(&self, image: DynamicImage) -> Result<Vec<RawDetection>, ModelError>;

    /// Detect only if no request is using the model; `Ok(None)` when busy.
    async fn detect_if_idle(
        &self,
        image: DynamicImage,
    ) -> Result<Option<Vec<RawDetection>>, ModelError> {
        self.detect(image).await.map(Some)
    }
}

/// A blank black image for health probes.
pub fn probe_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(
        PROBE_IMAGE_SIZE,
        PROBE_IMAGE_SIZE,
        Rgb([0, 0, 0]),
    ))
}

/// Health probe shared by every [`DetectionModel`].
///
/// A model busy with a request is loaded and working, so it counts as healthy.
pub async fn probe_detection<M: DetectionModel + ?Sized>(model: &M) -> Result<(), ModelError> {
    if model.detect_if_idle(probe_image()).await?.is_none() {
        debug!(model = model.name(), "Model busy, skipping probe inference");
    }
    Ok(())
}
