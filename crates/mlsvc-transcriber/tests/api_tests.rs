//! Transcriber API tests against mock decoder and model.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::Router;
use tower::ServiceExt;

use mlsvc_api::testing::{get_request, json_body, multipart_request, Part};
use mlsvc_api::{create_app, ModelError, ModelSlot, ServerConfig, ServingModel};
use mlsvc_media::{MediaError, MediaResult, PcmAudio, WHISPER_SAMPLE_RATE};
use mlsvc_models::RawTranscript;
use mlsvc_transcriber::{
    create_routes, probe_speech, AppState, AudioDecode, SpeechModel, SERVICE_NAME,
};

/// Accepts anything starting with `RIFF`, like a WAV sniff.
struct MockDecoder;

#[async_trait]
impl AudioDecode for MockDecoder {
    async fn decode(&self, bytes: &[u8]) -> MediaResult<PcmAudio> {
        if bytes.starts_with(b"RIFF") {
            Ok(PcmAudio::silence(Duration::from_millis(500), WHISPER_SAMPLE_RATE))
        } else {
            Err(MediaError::UndecodableAudio("invalid data found".to_string()))
        }
    }
}

struct MockSpeech {
    result: Result<RawTranscript, String>,
    seen_samples: Mutex<Vec<usize>>,
}

impl MockSpeech {
    fn returning(text: &str, language: Option<&str>) -> Self {
        Self {
            result: Ok(RawTranscript {
                text: text.to_string(),
                language: language.map(String::from),
            }),
            seen_samples: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            seen_samples: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ServingModel for MockSpeech {
    fn name(&self) -> &str {
        "mock-whisper"
    }

    async fn probe(&self) -> Result<(), ModelError> {
        probe_speech(self).await
    }
}

#[async_trait]
impl SpeechModel for MockSpeech {
    async fn transcribe(&self, audio: PcmAudio) -> Result<RawTranscript, ModelError> {
        self.seen_samples.lock().unwrap().push(audio.samples.len());
        self.result.clone().map_err(ModelError::inference)
    }
}

fn app_with(slot: ModelSlot<dyn SpeechModel>) -> Router {
    let state = AppState::new(slot, Arc::new(MockDecoder) as Arc<dyn AudioDecode>);
    create_app(
        SERVICE_NAME,
        create_routes(state),
        &ServerConfig::with_port(0),
        None,
    )
}

fn app_for(model: Arc<MockSpeech>) -> Router {
    app_with(ModelSlot::loaded("whisper", model as Arc<dyn SpeechModel>))
}

fn wav_part(bytes: &[u8]) -> Part<'_> {
    Part::file("audio", "test.wav", "audio/wav", bytes)
}

#[tokio::test]
async fn test_transcribe_returns_text_and_language() {
    let model = Arc::new(MockSpeech::returning(
        " Ini adalah hasil transkripsi. ",
        Some("id"),
    ));
    let response = app_for(Arc::clone(&model))
        .oneshot(multipart_request("/transcribe", &[wav_part(b"RIFF....WAVE")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({
            "transcribedText": "Ini adalah hasil transkripsi.",
            "language": "id"
        })
    );
    assert_eq!(*model.seen_samples.lock().unwrap(), vec![8_000]);
}

#[tokio::test]
async fn test_missing_language_is_unknown() {
    let model = Arc::new(MockSpeech::returning("hello", None));
    let response = app_for(model)
        .oneshot(multipart_request("/transcribe/", &[wav_part(b"RIFF")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["language"], "unknown");
}

#[tokio::test]
async fn test_missing_audio_field() {
    let model = Arc::new(MockSpeech::returning("hello", None));
    let response = app_for(model)
        .oneshot(multipart_request(
            "/transcribe",
            &[Part::file("image", "test.wav", "audio/wav", b"RIFF")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("'audio'"));
}

#[tokio::test]
async fn test_undecodable_audio_is_client_error() {
    let model = Arc::new(MockSpeech::returning("hello", None));
    let response = app_for(Arc::clone(&model))
        .oneshot(multipart_request("/transcribe", &[wav_part(b"fakeaudiodata")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["message"].is_string());
    assert!(model.seen_samples.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_image_upload_is_unsupported() {
    let model = Arc::new(MockSpeech::returning("hello", None));
    let response = app_for(model)
        .oneshot(multipart_request(
            "/transcribe",
            &[Part::file("audio", "photo.png", "image/png", b"RIFF")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_browser_webm_capture_accepted() {
    let model = Arc::new(MockSpeech::returning("hello", Some("en")));
    let response = app_for(model)
        .oneshot(multipart_request(
            "/transcribe",
            &[Part::file(
                "audio",
                "recording.webm",
                "audio/webm;codecs=opus",
                b"RIFF",
            )],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_model_failure_is_500() {
    let model = Arc::new(MockSpeech::failing("decoder exploded"));
    let response = app_for(model)
        .oneshot(multipart_request("/transcribe", &[wav_part(b"RIFF")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unloaded_model() {
    let app = || app_with(ModelSlot::unloaded("whisper", "FFmpeg not found in PATH"));

    let response = app()
        .oneshot(multipart_request("/transcribe", &[wav_part(b"RIFF")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["message"],
        "whisper model is not available"
    );

    let response = app().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["status"], "unhealthy");
    assert!(json["reason"].as_str().unwrap().contains("FFmpeg"));
}

#[tokio::test]
async fn test_health_probes_one_second_of_silence() {
    let model = Arc::new(MockSpeech::returning("", None));
    let response = app_for(Arc::clone(&model))
        .oneshot(get_request("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "status": "healthy" })
    );
    assert_eq!(*model.seen_samples.lock().unwrap(), vec![16_000]);
}

#[tokio::test]
async fn test_failing_probe_is_unhealthy() {
    let model = Arc::new(MockSpeech::failing("kv cache corrupted"));
    let response = app_for(model).oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert!(json["reason"].as_str().unwrap().contains("kv cache corrupted"));
}
