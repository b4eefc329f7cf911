//! Speech transcript types.

use serde::{Deserialize, Serialize};

/// Language code reported when the model did not detect one.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Native output of a speech model before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTranscript {
    pub text: String,
    /// ISO-639-1 style code as produced by the model, if any.
    pub language: Option<String>,
}

/// Response body of `POST /transcribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub transcribed_text: String,
    pub language: String,
}

impl From<RawTranscript> for Transcript {
    fn from(raw: RawTranscript) -> Self {
        let language = raw
            .language
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());

        Self {
            transcribed_text: raw.text.trim().to_string(),
            language,
        }
    }
}
