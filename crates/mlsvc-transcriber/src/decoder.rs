//! Upload bytes to PCM.

use async_trait::async_trait;

use mlsvc_media::{AudioDecoder, MediaResult, PcmAudio};

/// Turns uploaded audio bytes into 16 kHz mono PCM.
#[async_trait]
pub trait AudioDecode: Send + Sync {
    async fn decode(&self, bytes: &[u8]) -> MediaResult<PcmAudio>;
}

#[async_trait]
impl AudioDecode for AudioDecoder {
    async fn decode(&self, bytes: &[u8]) -> MediaResult<PcmAudio> {
        AudioDecoder::decode(self, bytes).await
    }
}
