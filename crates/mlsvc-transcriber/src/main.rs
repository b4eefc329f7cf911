//! Transcriber service binary.

use std::sync::Arc;

use tracing::{error, info};

use mlsvc_api::{create_app, init_tracing, metrics, serve, ModelError, ModelSlot};
use mlsvc_media::{check_ffmpeg, AudioDecoder};
use mlsvc_transcriber::{
    create_routes, AppState, AudioDecode, SpeechModel, TranscriberConfig, WhisperModel,
    SERVICE_NAME,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing("mlsvc_transcriber=info");

    info!("Starting {}", SERVICE_NAME);

    let config = TranscriberConfig::from_env();
    info!(
        "Transcriber config: host={}, port={}, model={}",
        config.server.host, config.server.port, config.model_id
    );

    let metrics_handle = if config.server.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    // Without FFmpeg no upload can be decoded, so the service reports unhealthy
    let model = match check_ffmpeg() {
        Ok(path) => {
            info!("Using FFmpeg at {}", path.display());
            let model_id = config.model_id.clone();
            tokio::task::spawn_blocking(move || WhisperModel::load(&model_id))
                .await
                .map_err(|e| ModelError::load(format!("model load task failed: {}", e)))
                .and_then(|result| result)
                .map(|model| Arc::new(model) as Arc<dyn SpeechModel>)
        }
        Err(e) => {
            error!("{}", e);
            Err(ModelError::load(e.to_string()))
        }
    };
    let slot = ModelSlot::from_load_result("whisper", model)
        .with_probe_timeout(config.server.health_probe_timeout);

    let decoder = AudioDecoder::new().with_timeout(config.ffmpeg_timeout_secs);
    let state = AppState::new(slot, Arc::new(decoder) as Arc<dyn AudioDecode>);

    let app = create_app(SERVICE_NAME, create_routes(state), &config.server, metrics_handle);

    serve(app, &config.server).await?;
    Ok(())
}
