//! Shared data models for the model-serving services.
//!
//! This crate provides Serde-serializable types for:
//! - Object detections and their normalized bounding boxes
//! - Speech transcripts
//! - OCR scan results
//! - Health check payloads
//!
//! It also owns the normalization rules that turn raw model output into these
//! public shapes.

pub mod detection;
pub mod health;
pub mod scan;
pub mod transcript;
pub mod utils;

// Re-export common types
pub use detection::{normalize_detections, Detection, ImageSize, RawDetection};
pub use health::{HealthResponse, LivenessResponse};
pub use scan::ScanResult;
pub use transcript::{RawTranscript, Transcript, UNKNOWN_LANGUAGE};
pub use utils::{clamp_unit, round_to};
