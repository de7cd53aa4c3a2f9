#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionSet};
use crate::frame::Frame;
use crate::geometry::BoundingBox;

const DEFAULT_SCORE_FLOOR: f32 = 0.25;
const DEFAULT_NMS_IOU: f32 = 0.45;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single `[1, 3, size, size]` f32 input and a `[1, 4 + classes, anchors]`
/// output of `cx, cy, w, h` followed by per-class scores. Frames of any size are
/// sampled (nearest neighbour) to the model input, and boxes are scaled back to
/// frame pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    labels: Vec<String>,
    score_floor: f32,
    nms_iou: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, labels: Vec<String>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            labels,
            score_floor: DEFAULT_SCORE_FLOOR,
            nms_iou: DEFAULT_NMS_IOU,
        })
    }

    /// Override the minimum class score kept before suppression.
    pub fn with_score_floor(mut self, score_floor: f32) -> Self {
        self.score_floor = score_floor;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let side = self.input_size as usize;
        let sx = frame.width as f32 / self.input_size as f32;
        let sy = frame.height as f32 / self.input_size as f32;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let fx = ((x as f32 * sx) as u32).min(frame.width - 1);
            let fy = ((y as f32 * sy) as u32).min(frame.height - 1);
            frame.rgb_at(fx, fy)[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn label_for(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class))
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;
        let rows = view.shape()[1];
        let anchors = view.shape()[2];
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, expected at least 5", rows));
        }

        let sx = frame.width as f32 / self.input_size as f32;
        let sy = frame.height as f32 / self.input_size as f32;
        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class, score) = (4..rows)
                .map(|r| (r - 4, view[[0, r, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            if !score.is_finite() || score < self.score_floor {
                continue;
            }
            let bbox = BoundingBox::from_center(
                view[[0, 0, a]] * sx,
                view[[0, 1, a]] * sy,
                view[[0, 2, a]] * sx,
                view[[0, 3, a]] * sy,
            );
            candidates.push((class, Detection::new(self.label_for(class), score, bbox)));
        }

        Ok(non_max_suppression(candidates, self.nms_iou))
    }
}

/// Greedy per-class suppression, highest score first.
fn non_max_suppression(mut candidates: Vec<(usize, Detection)>, iou: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));
    let mut kept: Vec<(usize, Detection)> = Vec::new();
    for (class, det) in candidates {
        let suppressed = kept
            .iter()
            .any(|(k_class, k)| *k_class == class && k.bbox.iou(&det.bbox) > iou);
        if !suppressed {
            kept.push((class, det));
        }
    }
    kept.into_iter().map(|(_, d)| d).collect()
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, frame)?;
        Ok(DetectionSet::new(detections, frame.sequence, frame.captured_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_keeps_best_per_class() {
        let a = Detection::new("head", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let b = Detection::new("head", 0.6, BoundingBox::new(1.0, 1.0, 10.0, 10.0));
        let c = Detection::new("body", 0.5, BoundingBox::new(1.0, 1.0, 10.0, 10.0));
        let kept = non_max_suppression(vec![(0, b), (0, a), (1, c)], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].label, "body");
    }
}
