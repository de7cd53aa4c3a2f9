use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::geometry::{BoundingBox, Point};

/// One labeled box produced by a detector, in capture-region pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// All detections of one inference pass. Replaced whole, never edited.
#[derive(Clone, Debug)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    /// Sequence number of the frame the set was inferred from.
    pub frame_sequence: u64,
    /// Capture instant of that frame.
    pub captured_at: Instant,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>, frame_sequence: u64, captured_at: Instant) -> Self {
        Self {
            detections,
            frame_sequence,
            captured_at,
        }
    }

    /// Indices of detections with confidence strictly above `threshold`, in input order.
    pub fn confident(&self, threshold: f32) -> impl Iterator<Item = usize> + '_ {
        self.detections
            .iter()
            .enumerate()
            .filter(move |(_, d)| d.confidence > threshold)
            .map(|(i, _)| i)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(confidences: &[f32]) -> DetectionSet {
        let detections = confidences
            .iter()
            .map(|&c| Detection::new("enemy", c, BoundingBox::new(0.0, 0.0, 1.0, 1.0)))
            .collect();
        DetectionSet::new(detections, 1, Instant::now())
    }

    #[test]
    fn confident_is_strict_and_ordered() {
        let s = set(&[0.5, 0.9, 0.51, 0.2]);
        assert_eq!(s.confident(0.5).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn raising_threshold_never_adds_detections() {
        let s = set(&[0.05, 0.3, 0.3, 0.55, 0.7, 0.99, 1.0]);
        let mut previous = usize::MAX;
        for step in 0..=20 {
            let threshold = step as f32 / 20.0;
            let kept = s.confident(threshold).count();
            assert!(kept <= previous, "threshold {threshold} kept {kept} > {previous}");
            previous = kept;
        }
    }

    #[test]
    fn detection_deserializes_box_array() {
        let d: Detection =
            serde_json::from_str(r#"{"label":"head","confidence":0.8,"box":[40,40,60,60]}"#)
                .unwrap();
        assert_eq!(d.label, "head");
        assert_eq!(d.center(), Point::new(50.0, 50.0));
    }
}
