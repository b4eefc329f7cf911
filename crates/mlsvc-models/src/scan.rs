//! OCR scan result.

use serde::{Deserialize, Serialize};

/// Response body of `POST /scan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scanned_text: String,
}

impl ScanResult {
    /// Normalize raw engine output.
    ///
    /// Tesseract terminates every page with a form feed and trailing newlines;
    /// those are stripped together with any other surrounding whitespace.
    pub fn from_raw(raw: &str) -> Self {
        Self {
            scanned_text: raw.trim().to_string(),
        }
    }
}
