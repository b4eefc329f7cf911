//! Detector configuration.

use mlsvc_api::{env_or, ServerConfig};

pub const DEFAULT_PORT: u16 = 5003;

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub server: ServerConfig,
    /// Path to ONNX model file
    pub model_path: String,
    /// Optional label file, one class name per line
    pub labels_path: Option<String>,
    /// Confidence threshold for detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl DetectorConfig {
    /// Defaults for everything but the server settings.
    pub fn with_server(server: ServerConfig) -> Self {
        Self {
            server,
            model_path: "models/yolov8l.onnx".to_string(),
            labels_path: None,
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::with_server(ServerConfig::from_env(DEFAULT_PORT));
        Self {
            model_path: std::env::var("DETECTOR_MODEL_PATH").unwrap_or(defaults.model_path),
            labels_path: std::env::var("DETECTOR_LABELS_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
            confidence_threshold: env_or("DETECTOR_CONFIDENCE", defaults.confidence_threshold),
            nms_threshold: env_or("DETECTOR_IOU", defaults.nms_threshold),
            input_size: env_or("DETECTOR_INPUT_SIZE", defaults.input_size),
            server: defaults.server,
        }
    }
}
