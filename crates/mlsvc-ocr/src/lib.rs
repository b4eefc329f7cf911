//! OCR service.
//!
//! `POST /scan` takes an `image` upload and returns the text Tesseract reads
//! from it as `{"scannedText": "..."}`.

pub mod config;
pub mod engine;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::OcrConfig;
pub use engine::{OcrEngine, TesseractEngine};
pub use routes::create_routes;
pub use state::AppState;

/// Service name used in logs and the liveness payload.
pub const SERVICE_NAME: &str = "mlsvc-ocr";
