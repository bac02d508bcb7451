// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 置信度融合过滤 + 非极大值抑制 (NMS)

use log::debug;

use super::types::{Candidate, Detection};

/// 模型输入尺寸 → 原图尺寸的独立 x/y 缩放
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageScale {
    pub x: f32,
    pub y: f32,
}

impl ImageScale {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// `original / input` per axis. Dimensions are `(height, width)`.
    pub fn from_dims(original: (u32, u32), input: (u32, u32)) -> Self {
        let ratio = |o: u32, i: u32| if i == 0 { 1.0 } else { o as f32 / i as f32 };
        Self {
            x: ratio(original.1, input.1),
            y: ratio(original.0, input.0),
        }
    }
}

impl Default for ImageScale {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Fuses objectness with the best class score and keeps candidates where
/// both objectness and the fused confidence reach `conf_threshold`.
/// Survivors are mapped to image-space corner coordinates, in decode order.
pub fn filter_candidates(
    candidates: &[Candidate],
    conf_threshold: f32,
    scale: ImageScale,
) -> Vec<Detection> {
    let mut kept = Vec::new();
    for candidate in candidates {
        if !(candidate.objectness >= conf_threshold) {
            continue;
        }
        let Some((class_id, class_score)) = candidate.best_class() else {
            continue;
        };
        let confidence = candidate.objectness * class_score;
        if !(confidence >= conf_threshold) {
            continue;
        }

        let half_w = candidate.width / 2.;
        let half_h = candidate.height / 2.;
        kept.push(Detection::new(
            (candidate.cx - half_w) * scale.x,
            (candidate.cy - half_h) * scale.y,
            (candidate.cx + half_w) * scale.x,
            (candidate.cy + half_h) * scale.y,
            confidence,
            class_id,
        ));
    }
    debug!(
        "Confidence filter kept {}/{} candidates (threshold {})",
        kept.len(),
        candidates.len(),
        conf_threshold
    );
    kept
}

/// Greedy NMS across all classes: highest confidence first, dropping any
/// box whose IoU with an already kept box exceeds `iou_threshold`.
/// Equal confidences keep their input order.
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 过滤 + NMS
#[derive(Debug, Clone, Copy)]
pub struct Suppressor {
    pub conf_threshold: f32,
    pub iou_threshold: f32,
}

impl Suppressor {
    pub fn new(conf_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            conf_threshold,
            iou_threshold,
        }
    }

    pub fn run(&self, candidates: &[Candidate], scale: ImageScale) -> Vec<Detection> {
        let mut detections = filter_candidates(candidates, self.conf_threshold, scale);
        let before = detections.len();
        non_max_suppression(&mut detections, self.iou_threshold);
        debug!(
            "NMS kept {}/{} detections (iou {})",
            detections.len(),
            before,
            self.iou_threshold
        );
        detections
    }
}
