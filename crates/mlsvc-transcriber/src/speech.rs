//! Speech model seam.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use mlsvc_api::{ModelError, ServingModel};
use mlsvc_media::{PcmAudio, WHISPER_SAMPLE_RATE};
use mlsvc_models::RawTranscript;

/// Transcribes decoded PCM audio.
#[async_trait]
pub trait SpeechModel: ServingModel {
    async fn transcribe(&self, audio: PcmAudio) -> Result<RawTranscript, ModelError>;

    /// Transcribe only if no request is using the model; `Ok(None)` when busy.
    async fn transcribe_if_idle(
        &self,
        audio: PcmAudio,
    ) -> Result<Option<RawTranscript>, ModelError> {
        self.transcribe(audio).await.map(Some)
    }
}

/// One second of silence at 16 kHz.
pub fn probe_audio() -> PcmAudio {
    PcmAudio::silence(Duration::from_secs(1), WHISPER_SAMPLE_RATE)
}

/// Health probe shared by every [`SpeechModel`].
///
/// A model busy with a request is loaded and working, so it counts as healthy.
pub async fn probe_speech<M: SpeechModel + ?Sized>(model: &M) -> Result<(), ModelError> {
    if model.transcribe_if_idle(probe_audio()).await?.is_none() {
        debug!(model = model.name(), "Model busy, skipping probe inference");
    }
    Ok(())
}
