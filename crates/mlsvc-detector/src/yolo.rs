//! Object detection using a YOLOv8 ONNX model.
//!
//! The session uses an accelerated execution provider when one is available:
//! - CUDA on Linux with NVIDIA GPU
//! - CoreML on macOS with Apple Silicon
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use mlsvc_api::{lock_model, try_lock_model, ModelError, ServingModel};
use mlsvc_models::RawDetection;

use crate::config::DetectorConfig;
use crate::labels::{coco_labels, load_labels};
use crate::model::{probe_detection, DetectionModel};

/// Box coordinates before class-wise NMS, in original image pixels.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    xyxy: [f32; 4],
}

/// Thresholds applied to raw model output.
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    confidence: f32,
    nms: f32,
}

/// YOLOv8 detector on ONNX Runtime.
///
/// `Session::run` needs exclusive access, so inference is serialized through
/// a mutex and runs on the blocking pool. Health probes never wait for that
/// mutex.
pub struct YoloDetector {
    inner: Arc<YoloInner>,
}

struct YoloInner {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_size: u32,
    thresholds: Thresholds,
}

impl YoloDetector {
    /// Load the ONNX model and label table named by `config`.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn load(config: &DetectorConfig) -> Result<Self, ModelError> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(ModelError::load(format!(
                "model file not found: {}",
                config.model_path
            )));
        }

        if config.input_size == 0 {
            return Err(ModelError::load("input size must be positive"));
        }

        let labels = match &config.labels_path {
            Some(path) => load_labels(Path::new(path))?,
            None => coco_labels(),
        };

        let session = create_session(model_path)?;
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            classes = labels.len(),
            "Object detector initialized"
        );

        Ok(Self {
            inner: Arc::new(YoloInner {
                session: Mutex::new(session),
                labels,
                input_size: config.input_size,
                thresholds: Thresholds {
                    confidence: config.confidence_threshold,
                    nms: config.nms_threshold,
                },
            }),
        })
    }
}

#[async_trait]
impl ServingModel for YoloDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    async fn probe(&self) -> Result<(), ModelError> {
        probe_detection(self).await
    }
}

#[async_trait]
impl DetectionModel for YoloDetector {
    async fn detect(&self, image: DynamicImage) -> Result<Vec<RawDetection>, ModelError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let input = inner.preprocess(&image)?;
            let mut session = lock_model("yolov8", &inner.session);
            inner.detect(&mut session, image.dimensions(), input)
        })
        .await
        .map_err(|e| ModelError::inference(format!("detection task failed: {}", e)))?
    }

    async fn detect_if_idle(
        &self,
        image: DynamicImage,
    ) -> Result<Option<Vec<RawDetection>>, ModelError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let Some(mut session) = try_lock_model("yolov8", &inner.session) else {
                return Ok(None);
            };
            let input = inner.preprocess(&image)?;
            inner.detect(&mut session, image.dimensions(), input).map(Some)
        })
        .await
        .map_err(|e| ModelError::inference(format!("detection task failed: {}", e)))?
    }
}

impl YoloInner {
    /// Run `input`, preprocessed from an image of `(width, height)` pixels.
    fn detect(
        &self,
        session: &mut Session,
        (width, height): (u32, u32),
        input: Value,
    ) -> Result<Vec<RawDetection>, ModelError> {
        let (shape, outputs) = self.run_inference(session, input)?;

        // Postprocess: parse YOLOv8 output, apply NMS
        let candidates = decode_output(
            &outputs,
            &shape,
            (width, height),
            self.input_size,
            self.thresholds.confidence,
        )?;
        let kept = non_maximum_suppression(candidates, self.thresholds.nms);

        debug!(count = kept.len(), "Object detection completed");

        Ok(kept
            .into_iter()
            .map(|c| {
                RawDetection::new(
                    c.class_id,
                    self.labels.get(c.class_id).cloned(),
                    c.confidence,
                    c.xyxy,
                )
            })
            .collect())
    }

    /// Preprocess image for YOLOv8 inference.
    ///
    /// - Resize to model input size
    /// - Normalize pixel values to [0, 1]
    /// - Convert to NCHW format (batch, channels, height, width)
    fn preprocess(&self, img: &DynamicImage) -> Result<Value, ModelError> {
        let input_size = self.input_size;

        let resized = img.resize_exact(
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        // HWC -> CHW with normalization to [0, 1]
        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| ModelError::inference(format!("Failed to create tensor: {}", e)))
    }

    /// Run ONNX inference, returning the output shape and data.
    fn run_inference(
        &self,
        session: &mut Session,
        input: Value,
    ) -> Result<(Vec<usize>, Vec<f32>), ModelError> {
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| ModelError::inference(format!("ONNX inference failed: {}", e)))?;

        // YOLOv8 output is [1, 4 + classes, candidates]
        let output = outputs
            .get("output0")
            .ok_or_else(|| ModelError::inference("Missing output0 tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::inference(format!("Failed to extract tensor: {}", e)))?;

        let shape = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((shape, data.to_vec()))
    }
}

/// Decode a YOLOv8 output tensor into pixel-space candidates.
///
/// Output layout is `[1, 4 + classes, candidates]` where the first four rows
/// are `cx, cy, w, h` in model input pixels.
fn decode_output(
    outputs: &[f32],
    shape: &[usize],
    (orig_width, orig_height): (u32, u32),
    input_size: u32,
    confidence_threshold: f32,
) -> Result<Vec<Candidate>, ModelError> {
    let (num_features, num_boxes) = match shape {
        [1, features, boxes] if *features > 4 => (*features, *boxes),
        _ => {
            return Err(ModelError::inference(format!(
                "Unexpected output shape {:?}",
                shape
            )))
        }
    };
    let num_classes = num_features - 4;

    // Reshape to [features, boxes], then transpose to [boxes, features]
    let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
        .map_err(|e| ModelError::inference(format!("Failed to reshape output: {}", e)))?;
    let transposed = output_array.t();

    let input_size = input_size as f32;
    let scale_w = orig_width as f32 / input_size;
    let scale_h = orig_height as f32 / input_size;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        // Find best class
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let score = transposed[[i, 4 + c]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < confidence_threshold {
            continue;
        }

        let cx = transposed[[i, 0]];
        let cy = transposed[[i, 1]];
        let w = transposed[[i, 2]];
        let h = transposed[[i, 3]];

        candidates.push(Candidate {
            class_id: best_class,
            confidence: best_score,
            xyxy: [
                (cx - w / 2.0) * scale_w,
                (cy - h / 2.0) * scale_h,
                (cx + w / 2.0) * scale_w,
                (cy + h / 2.0) * scale_h,
            ],
        });
    }

    Ok(candidates)
}

/// Class-wise non-maximum suppression, highest confidence first.
fn non_maximum_suppression(mut detections: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].class_id != detections[j].class_id {
                continue;
            }
            if compute_iou(&detections[i].xyxy, &detections[j].xyxy) > iou_threshold {
                suppressed[j] = true;
            }
        }

        keep.push(detections[i].clone());
    }

    keep
}

/// Intersection over Union of two `xyxy` boxes.
fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = inter_w * inter_h;

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> Result<Session, ModelError> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| ModelError::load(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| ModelError::load(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelError::load(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| ModelError::load(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlsvc_api::ServerConfig;

    /// Build a `[1, 4 + classes, boxes]` output from per-box rows.
    fn output(rows: &[Vec<f32>]) -> (Vec<usize>, Vec<f32>) {
        let features = rows[0].len();
        let mut data = vec![0.0; features * rows.len()];
        for (b, row) in rows.iter().enumerate() {
            for (f, value) in row.iter().enumerate() {
                data[f * rows.len() + b] = *value;
            }
        }
        (vec![1, features, rows.len()], data)
    }

    #[test]
    fn test_decode_scales_to_original_pixels() {
        // One box centred in a 640 input, class 1 wins
        let (shape, data) = output(&[vec![320.0, 320.0, 64.0, 32.0, 0.1, 0.8]]);
        let candidates = decode_output(&data, &shape, (1280, 320), 640, 0.25).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 1);
        assert_eq!(candidates[0].xyxy, [576.0, 152.0, 704.0, 168.0]);
    }

    #[test]
    fn test_decode_applies_confidence_threshold() {
        let (shape, data) = output(&[
            vec![10.0, 10.0, 4.0, 4.0, 0.2, 0.1],
            vec![20.0, 20.0, 4.0, 4.0, 0.9, 0.1],
        ]);
        let candidates = decode_output(&data, &shape, (640, 640), 640, 0.25).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 0);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_output(&[0.0; 8], &[1, 4, 2], (10, 10), 640, 0.25).is_err());
        assert!(decode_output(&[0.0; 8], &[2, 8], (10, 10), 640, 0.25).is_err());
    }

    #[test]
    fn test_nms_is_class_wise() {
        let a = Candidate { class_id: 0, confidence: 0.9, xyxy: [0.0, 0.0, 10.0, 10.0] };
        let b = Candidate { class_id: 0, confidence: 0.8, xyxy: [1.0, 1.0, 10.0, 10.0] };
        let c = Candidate { class_id: 1, confidence: 0.7, xyxy: [1.0, 1.0, 10.0, 10.0] };

        let kept = non_maximum_suppression(vec![b, c.clone(), a.clone()], 0.45);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn test_iou() {
        let a = [0.0, 0.0, 2.0, 2.0];
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);
        assert!((compute_iou(&a, &[1.0, 0.0, 3.0, 2.0]) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(compute_iou(&a, &[5.0, 5.0, 6.0, 6.0]), 0.0);
    }

    #[test]
    fn test_load_missing_model() {
        let mut config = DetectorConfig::with_server(ServerConfig::with_port(0));
        config.model_path = "/nonexistent/yolov8l.onnx".to_string();
        let err = YoloDetector::load(&config).err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    #[ignore = "requires models/yolov8l.onnx"]
    async fn test_probe_with_real_model() {
        let config = DetectorConfig::with_server(ServerConfig::with_port(0));
        let detector = YoloDetector::load(&config).unwrap();
        detector.probe().await.unwrap();
    }
}
