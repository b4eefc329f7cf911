//! OCR service binary.

use std::sync::Arc;

use tracing::info;

use mlsvc_api::{create_app, init_tracing, metrics, serve, ModelSlot};
use mlsvc_ocr::{create_routes, AppState, OcrConfig, OcrEngine, TesseractEngine, SERVICE_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing("mlsvc_ocr=info");

    info!("Starting {}", SERVICE_NAME);

    let config = OcrConfig::from_env();
    info!(
        "OCR config: host={}, port={}, language={}",
        config.server.host, config.server.port, config.language
    );

    let metrics_handle = if config.server.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    // Load before binding; a failed load still serves, reporting unhealthy
    let engine = TesseractEngine::load(&config)
        .await
        .map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>);
    let slot = ModelSlot::from_load_result("tesseract", engine)
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
