//! Shared Axum app factory for the model services.
//!
//! This crate provides:
//! - A uniform `{"message": ...}` error envelope with client/server fault mapping
//! - Multipart upload extraction and declared-type validation
//! - Model readiness tracking and probing health checks
//! - Prometheus metrics, request IDs and request tracing
//! - Server startup with graceful shutdown

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod server;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod upload;

pub use app::create_app;
pub use config::{env_or, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use handlers::health::health_response;
pub use model::{lock_model, try_lock_model, ModelError, ModelSlot, ModelStatus, ServingModel};
pub use server::serve;
pub use telemetry::init_tracing;
pub use upload::{decode_image_upload, read_upload};
