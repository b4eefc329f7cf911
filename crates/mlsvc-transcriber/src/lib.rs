//! Transcription service.
//!
//! `POST /transcribe` takes an `audio` upload, transcodes it to 16 kHz mono
//! PCM with FFmpeg and returns `{"transcribedText": "...", "language": "..."}`.

pub mod config;
pub mod decoder;
pub mod handlers;
pub mod routes;
pub mod speech;
pub mod state;
pub mod whisper;

pub use config::TranscriberConfig;
pub use decoder::AudioDecode;
pub use routes::create_routes;
pub use speech::{probe_speech, SpeechModel};
pub use state::AppState;
pub use whisper::WhisperModel;

/// Service name used in logs and the liveness payload.
pub const SERVICE_NAME: &str = "mlsvc-transcriber";
