//! Transcriber configuration.

use mlsvc_api::{env_or, ServerConfig};

pub const DEFAULT_PORT: u16 = 5002;

/// Transcriber configuration.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    pub server: ServerConfig,
    /// Hugging Face repository of the Whisper checkpoint
    pub model_id: String,
    /// FFmpeg decode timeout in seconds
    pub ffmpeg_timeout_secs: u64,
}

impl TranscriberConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let model = std::env::var("WHISPER_MODEL").unwrap_or_else(|_| "base".to_string());
        Self {
            server: ServerConfig::from_env(DEFAULT_PORT),
            model_id: resolve_model_id(&model),
            ffmpeg_timeout_secs: env_or("FFMPEG_TIMEOUT_SECS", 120),
        }
    }
}

/// Map a Whisper size name (`base`, `small.en`, ...) to its Hugging Face
/// repository. Values that already name a repository are kept as is.
pub fn resolve_model_id(model: &str) -> String {
    let model = model.trim();
    if model.contains('/') {
        model.to_string()
    } else {
        format!("openai/whisper-{}", model)
    }
}
