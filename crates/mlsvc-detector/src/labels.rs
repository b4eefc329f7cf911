//! Class label tables.

use std::path::Path;

use mlsvc_api::ModelError;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// The default COCO label table.
pub fn coco_labels() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Read a label file with one class name per line. Blank lines are skipped.
pub fn load_labels(path: &Path) -> Result<Vec<String>, ModelError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ModelError::load(format!("labels file {}: {}", path.display(), e)))?;

    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if labels.is_empty() {
        return Err(ModelError::load(format!(
            "labels file {} is empty",
            path.display()
        )));
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_coco_classes() {
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
        assert_eq!(COCO_CLASSES.len(), 80);
    }

    #[test]
    fn test_load_labels_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "helmet\n\n  vest  \n").unwrap();
        assert_eq!(load_labels(file.path()).unwrap(), vec!["helmet", "vest"]);
    }

    #[test]
    fn test_empty_or_missing_label_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(load_labels(file.path()), Err(ModelError::Load(_))));
        assert!(load_labels(Path::new("/nonexistent/labels.txt")).is_err());
    }
}
