//! OCR service configuration.

use mlsvc_api::{env_or, ServerConfig};

pub const DEFAULT_PORT: u16 = 5001;

/// OCR service configuration.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub server: ServerConfig,
    /// Tesseract language code(s), e.g. `ind` or `ind+eng`
    pub language: String,
    /// Tesseract binary name or path
    pub tesseract_cmd: String,
    /// Per-image Tesseract timeout in seconds
    pub timeout_secs: u64,
}

impl OcrConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(DEFAULT_PORT),
            language: std::env::var("OCR_LANGUAGE").unwrap_or_else(|_| "ind".to_string()),
            tesseract_cmd: std::env::var("TESSERACT_CMD")
                .unwrap_or_else(|_| "tesseract".to_string()),
            timeout_secs: env_or("TESSERACT_TIMEOUT_SECS", 60),
        }
    }
}
