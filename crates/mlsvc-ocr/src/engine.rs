//! OCR engines.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{debug, info};

use mlsvc_api::{ModelError, ServingModel};
use mlsvc_media::TesseractCommand;

use crate::config::OcrConfig;

/// Side length of the blank image used by health probes.
const PROBE_IMAGE_SIZE: u32 = 32;

/// Extracts text from a decoded image.
#[async_trait]
pub trait OcrEngine: ServingModel {
    /// Raw recognized text, untrimmed.
    async fn recognize(&self, image: DynamicImage) -> Result<String, ModelError>;
}

/// A blank white image for health probes.
pub fn probe_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(
        PROBE_IMAGE_SIZE,
        PROBE_IMAGE_SIZE,
        Rgb([255, 255, 255]),
    ))
}

/// OCR through the `tesseract` CLI.
pub struct TesseractEngine {
    command: TesseractCommand,
}

impl TesseractEngine {
    /// Check the binary and language data are installed.
    pub async fn load(config: &OcrConfig) -> Result<Self, ModelError> {
        let command = TesseractCommand::new(&config.tesseract_cmd, &config.language)
            .with_timeout(config.timeout_secs);

        command
            .verify()
            .await
            .map_err(|e| ModelError::load(e.to_string()))?;

        info!(
            program = command.program(),
            language = command.language(),
            "Tesseract ready"
        );

        Ok(Self { command })
    }
}

#[async_trait]
impl ServingModel for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn probe(&self) -> Result<(), ModelError> {
        self.recognize(probe_image()).await.map(|_| ())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: DynamicImage) -> Result<String, ModelError> {
        let text = self.command.recognize_image(image).await?;
        debug!(chars = text.len(), "Tesseract finished");
        Ok(text)
    }
}
