//! Whisper speech recognition on candle.
//!
//! Audio is cut into 30 s windows and each window is decoded greedily. For
//! multilingual checkpoints the spoken language is detected once, from the
//! first window, and then pinned in the prompt of every window.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use mlsvc_api::{lock_model, try_lock_model, ModelError, ServingModel};
use mlsvc_media::{PcmAudio, WHISPER_SAMPLE_RATE};
use mlsvc_models::RawTranscript;

use crate::speech::{probe_speech, SpeechModel};

/// Repository hosting the precomputed 80-bin mel filterbank.
const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";

/// Cap on generated tokens per 30 s window.
const MAX_DECODE_TOKENS: usize = 224;

/// Multilingual checkpoints have one more token than English-only ones.
const MULTILINGUAL_VOCAB_SIZE: usize = 51865;

/// Language codes in Whisper token order.
const LANGUAGES: &[&str] = &[
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv",
    "it", "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no",
    "th", "ur", "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr",
    "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq", "sw",
    "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd", "gu",
    "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl",
    "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su", "yue",
];

struct SpecialTokens {
    sot: u32,
    transcribe: u32,
    no_timestamps: u32,
    eot: u32,
}

/// Whisper checkpoint loaded from the Hugging Face Hub.
///
/// The decoder keeps a cross-attention KV cache, so inference is serialized
/// through a mutex and runs on the blocking pool. Health probes never wait
/// for that mutex.
pub struct WhisperModel {
    inner: Arc<WhisperInner>,
}

struct WhisperInner {
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
    tokens: SpecialTokens,
    /// Language token ids, empty for English-only checkpoints
    languages: Vec<(u32, &'static str)>,
}

impl WhisperModel {
    /// Download (or reuse from the local cache) and load `model_id`.
    ///
    /// This blocks on network and disk I/O; call it from the blocking pool.
    pub fn load(model_id: &str) -> Result<Self, ModelError> {
        let device = Device::Cpu;

        info!(
            device = ?device,
            model = model_id,
            "Initializing Whisper model"
        );

        let api = Api::new().map_err(|e| ModelError::load(e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| ModelError::load(format!("config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| ModelError::load(format!("tokenizer.json: {}", e)))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| ModelError::load(format!("model.safetensors: {}", e)))?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| ModelError::load(format!("read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| ModelError::load(format!("parse config: {}", e)))?;

        if config.num_mel_bins != 80 {
            return Err(ModelError::load(format!(
                "{} uses {} mel bins, only 80-bin checkpoints are supported",
                model_id, config.num_mel_bins
            )));
        }

        let mel_repo = api.repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model));
        let mel_bytes_path = mel_repo
            .get("melfilters.bytes")
            .map_err(|e| ModelError::load(format!("melfilters.bytes: {}", e)))?;
        let mel_bytes = std::fs::read(&mel_bytes_path)
            .map_err(|e| ModelError::load(format!("mel filters: {}", e)))?;
        let mel_filters = read_mel_filters(&mel_bytes, config.num_mel_bins)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::load(format!("tokenizer: {}", e)))?;

        let tokens = SpecialTokens {
            sot: token_id(&tokenizer, m::SOT_TOKEN)?,
            transcribe: token_id(&tokenizer, m::TRANSCRIBE_TOKEN)?,
            no_timestamps: token_id(&tokenizer, m::NO_TIMESTAMPS_TOKEN)?,
            eot: token_id(&tokenizer, m::EOT_TOKEN)?,
        };

        let languages = if config.vocab_size >= MULTILINGUAL_VOCAB_SIZE {
            language_tokens(&tokenizer)
        } else {
            Vec::new()
        };

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)
                .map_err(|e| ModelError::load(format!("weights: {}", e)))?
        };

        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| ModelError::load(format!("model: {}", e)))?;

        info!(
            model = model_id,
            multilingual = !languages.is_empty(),
            "Whisper model loaded"
        );

        Ok(Self {
            inner: Arc::new(WhisperInner {
                model: Mutex::new(model),
                tokenizer,
                config,
                device,
                mel_filters,
                tokens,
                languages,
            }),
        })
    }
}

#[async_trait]
impl ServingModel for WhisperModel {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn probe(&self) -> Result<(), ModelError> {
        probe_speech(self).await
    }
}

#[async_trait]
impl SpeechModel for WhisperModel {
    async fn transcribe(&self, audio: PcmAudio) -> Result<RawTranscript, ModelError> {
        check_sample_rate(&audio)?;

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut model = lock_model("whisper", &inner.model);
            inner.transcribe(&mut model, &audio.samples)
        })
        .await
        .map_err(|e| ModelError::inference(format!("transcription task failed: {}", e)))?
    }

    async fn transcribe_if_idle(
        &self,
        audio: PcmAudio,
    ) -> Result<Option<RawTranscript>, ModelError> {
        check_sample_rate(&audio)?;

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let Some(mut model) = try_lock_model("whisper", &inner.model) else {
                return Ok(None);
            };
            inner.transcribe(&mut model, &audio.samples).map(Some)
        })
        .await
        .map_err(|e| ModelError::inference(format!("transcription task failed: {}", e)))?
    }
}

fn check_sample_rate(audio: &PcmAudio) -> Result<(), ModelError> {
    if audio.sample_rate != WHISPER_SAMPLE_RATE {
        return Err(ModelError::inference(format!(
            "expected {} Hz audio, got {} Hz",
            WHISPER_SAMPLE_RATE, audio.sample_rate
        )));
    }
    Ok(())
}

impl WhisperInner {
    fn transcribe(
        &self,
        model: &mut m::model::Whisper,
        samples: &[f32],
    ) -> Result<RawTranscript, ModelError> {
        // A panicked call may have left stale cache entries behind.
        model.reset_kv_cache();

        let mut language: Option<(u32, &'static str)> = None;
        let mut segments: Vec<String> = Vec::new();

        for (i, chunk) in samples.chunks(m::N_SAMPLES).enumerate() {
            let mel = self.mel_tensor(chunk)?;
            let features = model
                .encoder
                .forward(&mel, true)
                .map_err(failed("encoder"))?;

            if i == 0 && !self.languages.is_empty() {
                language = Some(self.detect_language(model, &features)?);
            }

            let text = self.decode_segment(model, &features, language.map(|(id, _)| id))?;
            debug!(segment = i, chars = text.len(), "Transcribed audio segment");
            if !text.is_empty() {
                segments.push(text);
            }
        }

        model.reset_kv_cache();

        let text = segments.join(" ");
        info!(
            segments = segments.len(),
            chars = text.len(),
            language = language.map(|(_, code)| code),
            "Audio transcription completed"
        );

        Ok(RawTranscript {
            text,
            language: language.map(|(_, code)| code.to_string()),
        })
    }

    fn mel_tensor(&self, chunk: &[f32]) -> Result<Tensor, ModelError> {
        let mut samples = chunk.to_vec();
        samples.resize(m::N_SAMPLES, 0.0);

        let mel = m::audio::pcm_to_mel(&self.config, &samples, &self.mel_filters);
        let n_mel = self.config.num_mel_bins;
        let n_frames = mel.len() / n_mel;

        Tensor::from_vec(mel, (1, n_mel, n_frames), &self.device)
            .and_then(|t| t.narrow(2, 0, n_frames.min(m::N_FRAMES)))
            .map_err(failed("mel tensor"))
    }

    /// Pick the most likely language token after `<|startoftranscript|>`.
    fn detect_language(
        &self,
        model: &mut m::model::Whisper,
        features: &Tensor,
    ) -> Result<(u32, &'static str), ModelError> {
        let tokens = Tensor::new(&[[self.tokens.sot]], &self.device).map_err(failed("tokens"))?;
        let ys = model
            .decoder
            .forward(&tokens, features, true)
            .map_err(failed("language decoder"))?;
        let logits = ys
            .i(..1)
            .and_then(|ys| model.decoder.final_linear(&ys))
            .and_then(|logits| logits.i(0))
            .and_then(|logits| logits.i(0))
            .map_err(failed("language logits"))?;

        let ids: Vec<u32> = self.languages.iter().map(|(id, _)| *id).collect();
        let best = Tensor::new(ids.as_slice(), &self.device)
            .and_then(|ids| logits.index_select(&ids, 0))
            .and_then(|logits| logits.argmax(0))
            .and_then(|best| best.to_scalar::<u32>())
            .map_err(failed("language argmax"))?;

        let language = self
            .languages
            .get(best as usize)
            .copied()
            .ok_or_else(|| ModelError::inference("language index out of range"))?;

        debug!(language = language.1, "Detected language");
        Ok(language)
    }

    fn decode_segment(
        &self,
        model: &mut m::model::Whisper,
        features: &Tensor,
        language_token: Option<u32>,
    ) -> Result<String, ModelError> {
        let mut tokens = vec![self.tokens.sot];
        if let Some(language_token) = language_token {
            tokens.push(language_token);
        }
        tokens.push(self.tokens.transcribe);
        tokens.push(self.tokens.no_timestamps);
        let prompt_len = tokens.len();

        for step in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(tokens.as_slice(), &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(failed("tokens"))?;

            let ys = model
                .decoder
                .forward(&token_tensor, features, step == 0)
                .map_err(failed("decoder"))?;

            let seq_len = ys.dim(1).map_err(failed("decoder"))?;
            let next_token = ys
                .i((..1, seq_len - 1..))
                .and_then(|last| model.decoder.final_linear(&last))
                .and_then(|logits| logits.i(0))
                .and_then(|logits| logits.i(0))
                .and_then(|logits| logits.argmax(0))
                .and_then(|token| token.to_scalar::<u32>())
                .map_err(failed("logits"))?;

            if next_token == self.tokens.eot {
                break;
            }
            tokens.push(next_token);
        }

        let text = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| ModelError::inference(format!("detokenize: {}", e)))?;

        Ok(text.trim().to_string())
    }
}

fn failed(context: &'static str) -> impl Fn(candle_core::Error) -> ModelError {
    move |e| ModelError::inference(format!("{}: {}", context, e))
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, ModelError> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| ModelError::load(format!("token not found: {}", token)))
}

/// `(token id, code)` for every language the tokenizer knows.
fn language_tokens(tokenizer: &Tokenizer) -> Vec<(u32, &'static str)> {
    LANGUAGES
        .iter()
        .filter_map(|code| {
            tokenizer
                .token_to_id(&format!("<|{}|>", code))
                .map(|id| (id, *code))
        })
        .collect()
}

fn read_mel_filters(bytes: &[u8], num_mel_bins: usize) -> Result<Vec<f32>, ModelError> {
    let expected_len = num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(ModelError::load(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_filters_size_checked() {
        let err = read_mel_filters(&[0u8; 16], 80).unwrap_err();
        assert!(matches!(err, ModelError::Load(_)));

        let expected = 80 * (m::N_FFT / 2 + 1);
        let bytes: Vec<u8> = (0..expected).flat_map(|_| 0.5f32.to_le_bytes()).collect();
        let filters = read_mel_filters(&bytes, 80).unwrap();
        assert_eq!(filters.len(), expected);
        assert_eq!(filters[0], 0.5);
    }

    #[test]
    fn test_language_table() {
        assert_eq!(LANGUAGES[0], "en");
        assert_eq!(LANGUAGES[16], "id");
        assert!(LANGUAGES.contains(&"yue"));
    }

    #[tokio::test]
    #[ignore = "downloads openai/whisper-tiny from the Hugging Face Hub"]
    async fn test_transcribe_silence_with_real_model() {
        let model = tokio::task::spawn_blocking(|| WhisperModel::load("openai/whisper-tiny"))
            .await
            .unwrap()
            .unwrap();
        model.probe().await.unwrap();
    }
}
