//! Object detection results and bounding box normalization.

use serde::{Deserialize, Serialize};

use crate::utils::{clamp_unit, round_to};

/// Decimal places kept for confidences and bbox components.
pub const OUTPUT_DECIMALS: u32 = 4;

/// Pixel dimensions of the image a detection was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// An image with a zero dimension cannot be used as a normalization base.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Native detector output for one object, in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Class index in the model's label table
    pub class_id: usize,
    /// Human-readable label, when the model provides one
    pub label: Option<String>,
    /// Detection score as reported by the model
    pub confidence: f32,
    /// Corner coordinates `[x1, y1, x2, y2]` in pixels; `None` if the model
    /// produced no usable geometry for this object
    pub xyxy: Option<[f32; 4]>,
}

impl RawDetection {
    pub fn new(class_id: usize, label: Option<String>, confidence: f32, xyxy: [f32; 4]) -> Self {
        Self {
            class_id,
            label,
            confidence,
            xyxy: Some(xyxy),
        }
    }

    fn label_or_fallback(&self) -> String {
        match &self.label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("class_{}", self.class_id),
        }
    }
}

/// Public detection shape returned by `POST /detect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    /// `[x, y, width, height]`, every component within `[0, 1]`
    pub bbox: [f32; 4],
}

impl Detection {
    /// Normalize a single raw detection against the source image size.
    ///
    /// Returns `None` when the geometry is missing or not finite, or when the
    /// image has a zero dimension.
    pub fn from_raw(raw: &RawDetection, size: ImageSize) -> Option<Self> {
        if size.is_empty() {
            return None;
        }

        let [x1, y1, x2, y2] = raw.xyxy?;
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return None;
        }

        let width = size.width as f32;
        let height = size.height as f32;

        let bbox = [x1 / width, y1 / height, (x2 - x1) / width, (y2 - y1) / height]
            .map(|component| round_to(clamp_unit(component), OUTPUT_DECIMALS));

        Some(Self {
            class_name: raw.label_or_fallback(),
            confidence: round_to(clamp_unit(raw.confidence), OUTPUT_DECIMALS),
            bbox,
        })
    }
}

/// Normalize every raw detection, dropping the ones without usable geometry.
pub fn normalize_detections(raw: &[RawDetection], size: ImageSize) -> Vec<Detection> {
    raw.iter()
        .filter_map(|detection| Detection::from_raw(detection, size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(xyxy: [f32; 4]) -> RawDetection {
        RawDetection::new(0, Some("person".to_string()), 0.91, xyxy)
    }

    #[test]
    fn test_normalizes_inside_bounds() {
        let size = ImageSize::new(200, 100);
        let det = Detection::from_raw(&person([20.0, 10.0, 120.0, 60.0]), size).unwrap();

        assert_eq!(det.class_name, "person");
        assert!((det.confidence - 0.91).abs() < 1e-6);
        assert_eq!(det.bbox, [0.1, 0.1, 0.5, 0.5]);
    }

    #[test]
    fn test_clamps_overshoot_at_edges() {
        let size = ImageSize::new(640, 480);
        let det = Detection::from_raw(&person([-3.0, -1.0, 645.0, 481.0]), size).unwrap();

        assert!(det.bbox.iter().all(|c| (0.0..=1.0).contains(c)));
        assert_eq!(det.bbox[0], 0.0);
        assert_eq!(det.bbox[1], 0.0);
        assert_eq!(det.bbox[2], 1.0);
        assert_eq!(det.bbox[3], 1.0);
    }

    #[test]
    fn test_far_out_of_bounds_box_still_in_unit_range() {
        let size = ImageSize::new(100, 100);
        let det = Detection::from_raw(&person([150.0, 150.0, 400.0, 300.0]), size).unwrap();
        assert_eq!(det.bbox, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_confidence_clamped_and_rounded() {
        let size = ImageSize::new(10, 10);
        let raw = RawDetection::new(2, Some("car".to_string()), 1.2, [0.0, 0.0, 5.0, 5.0]);
        assert_eq!(Detection::from_raw(&raw, size).unwrap().confidence, 1.0);

        let raw = RawDetection::new(2, Some("car".to_string()), 0.876543, [0.0, 0.0, 5.0, 5.0]);
        assert!((Detection::from_raw(&raw, size).unwrap().confidence - 0.8765).abs() < 1e-6);
    }

    #[test]
    fn test_skips_incomplete_geometry() {
        let size = ImageSize::new(100, 100);
        let missing = RawDetection {
            class_id: 0,
            label: Some("person".to_string()),
            confidence: 0.5,
            xyxy: None,
        };
        let nan = person([f32::NAN, 0.0, 10.0, 10.0]);
        let good = person([0.0, 0.0, 50.0, 50.0]);

        let out = normalize_detections(&[missing, nan, good], size);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bbox, [0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_zero_sized_image_yields_nothing() {
        let out = normalize_detections(&[person([0.0, 0.0, 1.0, 1.0])], ImageSize::new(0, 10));
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_label_falls_back_to_class_id() {
        let raw = RawDetection::new(17, None, 0.7, [0.0, 0.0, 1.0, 1.0]);
        let det = Detection::from_raw(&raw, ImageSize::new(2, 2)).unwrap();
        assert_eq!(det.class_name, "class_17");
    }

    #[test]
    fn test_serialized_shape() {
        let det = Detection::from_raw(&person([0.0, 0.0, 50.0, 25.0]), ImageSize::new(100, 100))
            .unwrap();
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["class"], "person");
        assert_eq!(json["bbox"].as_array().unwrap().len(), 4);
        assert!(json.get("class_name").is_none());
    }
}
