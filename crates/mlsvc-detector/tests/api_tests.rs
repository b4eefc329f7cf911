//! Detector API tests against a mock model.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::Router;
use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage};
use tower::ServiceExt;

use mlsvc_api::testing::{get_request, json_body, multipart_request, Part};
use mlsvc_api::{create_app, ModelError, ModelSlot, ServerConfig, ServingModel};
use mlsvc_detector::{create_routes, probe_detection, AppState, DetectionModel, SERVICE_NAME};
use mlsvc_models::RawDetection;

struct MockDetector {
    result: Result<Vec<RawDetection>, String>,
    seen_sizes: Mutex<Vec<(u32, u32)>>,
}

impl MockDetector {
    fn returning(detections: Vec<RawDetection>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(detections),
            seen_sizes: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            seen_sizes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ServingModel for MockDetector {
    fn name(&self) -> &str {
        "mock-yolo"
    }

    async fn probe(&self) -> Result<(), ModelError> {
        probe_detection(self).await
    }
}

#[async_trait]
impl DetectionModel for MockDetector {
    async fn detect(&self, image: DynamicImage) -> Result<Vec<RawDetection>, ModelError> {
        self.seen_sizes.lock().unwrap().push(image.dimensions());
        self.result.clone().map_err(ModelError::inference)
    }
}

fn app_with(slot: ModelSlot<dyn DetectionModel>) -> Router {
    create_app(
        SERVICE_NAME,
        create_routes(AppState::new(slot)),
        &ServerConfig::with_port(0),
        None,
    )
}

fn app_for(model: Arc<MockDetector>) -> Router {
    app_with(ModelSlot::loaded("yolov8", model as Arc<dyn DetectionModel>))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .unwrap();
    buf
}

#[tokio::test]
async fn test_detect_normalizes_boxes() {
    let model = MockDetector::returning(vec![RawDetection::new(
        0,
        Some("person".to_string()),
        0.91234,
        [20.0, 10.0, 120.0, 60.0],
    )]);
    let png = png_bytes(200, 100);

    let response = app_for(Arc::clone(&model))
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "street.png", "image/png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!([
            { "class": "person", "confidence": 0.9123, "bbox": [0.1, 0.1, 0.5, 0.5] }
        ])
    );
    assert_eq!(*model.seen_sizes.lock().unwrap(), vec![(200, 100)]);
}

#[tokio::test]
async fn test_out_of_bounds_boxes_are_clamped() {
    let model = MockDetector::returning(vec![RawDetection::new(
        2,
        Some("car".to_string()),
        1.2,
        [-50.0, -20.0, 400.0, 300.0],
    )]);
    let png = png_bytes(200, 100);

    let response = app_for(model)
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "street.png", "image/png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let detection = &json[0];
    assert_eq!(detection["confidence"], 1.0);
    for component in detection["bbox"].as_array().unwrap() {
        let value = component.as_f64().unwrap();
        assert!((0.0..=1.0).contains(&value), "{value} out of range");
    }
}

#[tokio::test]
async fn test_missing_label_and_geometry() {
    let model = MockDetector::returning(vec![
        RawDetection::new(7, None, 0.5, [0.0, 0.0, 10.0, 10.0]),
        RawDetection {
            class_id: 3,
            label: Some("motorcycle".to_string()),
            confidence: 0.6,
            xyxy: None,
        },
        RawDetection::new(4, None, 0.7, [f32::NAN, 0.0, 1.0, 1.0]),
    ]);
    let png = png_bytes(10, 10);

    let response = app_for(model)
        .oneshot(multipart_request(
            "/detect/",
            &[Part::file("image", "x.png", "image/png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let detections = json.as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["class"], "class_7");
}

#[tokio::test]
async fn test_no_detections_is_empty_list() {
    let png = png_bytes(32, 32);
    let response = app_for(MockDetector::returning(Vec::new()))
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "empty.png", "image/png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_missing_image_field() {
    let png = png_bytes(8, 8);
    let response = app_for(MockDetector::returning(Vec::new()))
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("photo", "x.png", "image/png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("'image'"));
}

#[tokio::test]
async fn test_corrupt_image_is_client_error() {
    let model = MockDetector::returning(Vec::new());
    let response = app_for(Arc::clone(&model))
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "x.jpg", "image/jpeg", b"fakeimagedata")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(model.seen_sizes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_media_type() {
    let png = png_bytes(8, 8);
    let response = app_for(MockDetector::returning(Vec::new()))
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "doc.pdf", "application/pdf", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_inference_failure_is_500() {
    let png = png_bytes(8, 8);
    let response = app_for(MockDetector::failing("onnx runtime error"))
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "x.png", "image/png", &png)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["message"].is_string());
}

#[tokio::test]
async fn test_unloaded_model() {
    let app = || app_with(ModelSlot::unloaded("yolov8", "model file not found: models/yolov8l.onnx"));
    let png = png_bytes(8, 8);

    let response = app()
        .oneshot(multipart_request(
            "/detect",
            &[Part::file("image", "x.png", "image/png", &png)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["message"],
        "yolov8 model is not available"
    );

    let response = app().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "unhealthy");
}

#[tokio::test]
async fn test_health_probes_blank_image() {
    let model = MockDetector::returning(Vec::new());
    let response = app_for(Arc::clone(&model))
        .oneshot(get_request("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "status": "healthy" })
    );
    assert_eq!(*model.seen_sizes.lock().unwrap(), vec![(64, 64)]);

    let response = app_for(MockDetector::failing("session gone"))
        .oneshot(get_request("/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
