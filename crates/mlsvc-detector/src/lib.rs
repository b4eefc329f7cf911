//! Object detection service.
//!
//! `POST /detect` takes an `image` upload and returns every detected object
//! with its class, confidence and a normalized `[x, y, w, h]` box.

pub mod config;
pub mod handlers;
pub mod labels;
pub mod model;
pub mod routes;
pub mod state;
pub mod yolo;

pub use config::DetectorConfig;
pub use model::{probe_detection, DetectionModel};
pub use routes::create_routes;
pub use state::AppState;
pub use yolo::YoloDetector;

/// Service name used in logs and the liveness payload.
pub const SERVICE_NAME: &str = "mlsvc-detector";
