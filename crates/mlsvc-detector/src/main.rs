//! Detector service binary.

use std::sync::Arc;

use tracing::info;

use mlsvc_api::{create_app, init_tracing, metrics, serve, ModelError, ModelSlot};
use mlsvc_detector::{
    create_routes, AppState, DetectionModel, DetectorConfig, YoloDetector, SERVICE_NAME,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing("mlsvc_detector=info");

    info!("Starting {}", SERVICE_NAME);

    let config = DetectorConfig::from_env();
    info!(
        "Detector config: host={}, port={}, model={}",
        config.server.host, config.server.port, config.model_path
    );

    let metrics_handle = if config.server.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let load_config = config.clone();
    let model = tokio::task::spawn_blocking(move || YoloDetector::load(&load_config))
        .await
        .map_err(|e| ModelError::load(format!("model load task failed: {}", e)))
        .and_then(|result| result)
        .map(|model| Arc::new(model) as Arc<dyn DetectionModel>);
    let slot = ModelSlot::from_load_result("yolov8", model)
        .with_probe_timeout(config.server.health_probe_timeout);

    let app = create_app(
        SERVICE_NAME,
        create_routes(AppState::new(slot)),
        &config.server,
        metrics_handle,
    );

    serve(app, &config.server).await?;
    Ok(())
}
