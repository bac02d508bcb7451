// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 毛囊单位分析入口
//!
//! ```text
//! 原始张量 → decode → 过滤 + NMS → 聚类 → 指标
//!                                       ↘ 标注指令
//! ```

pub mod annotator;
pub mod metrics;
pub mod report;

use log::info;
use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};

pub use annotator::{annotate, color_for_label, DrawInstruction};
pub use metrics::{compute_metrics, ImageMetrics};
pub use report::{AnalysisReport, AreaSummary, SessionSummary};

use crate::config::CalibrationContext;
use crate::detection::{cluster_detections, decode, Detection, ImageScale, Suppressor};
use crate::error::Result;

/// 图片尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDims {
    pub height: u32,
    pub width: u32,
}

impl ImageDims {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub fn hw(&self) -> (u32, u32) {
        (self.height, self.width)
    }
}

/// 单张图片的分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutput {
    pub metrics: ImageMetrics,
    pub draw_instructions: Vec<DrawInstruction>,
    /// Detections that survived NMS, in confidence order.
    pub detections: Vec<Detection>,
}

impl AnalysisOutput {
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport::from(&self.metrics)
    }
}

/// Runs the whole post-processing chain for one image.
///
/// `original` is the image the detections are mapped back to and `input`
/// the resolution the model saw. Fails only when `raw` does not follow the
/// documented tensor layout.
pub fn analyze(
    raw: ArrayViewD<'_, f32>,
    original: ImageDims,
    input: ImageDims,
    calibration: &CalibrationContext,
) -> Result<AnalysisOutput> {
    let candidates = decode(raw)?;

    let scale = ImageScale::from_dims(original.hw(), input.hw());
    let suppressor = Suppressor::new(
        calibration.confidence_threshold,
        calibration.nms_iou_threshold,
    );
    let detections = suppressor.run(&candidates, scale);

    let clustering = cluster_detections(&detections, calibration.distance_threshold_px);
    let metrics = compute_metrics(&clustering, calibration);
    let draw_instructions = annotate(&clustering);

    info!(
        "{} candidates → {} detections → {} FUs ({} hairs), {} other",
        candidates.len(),
        detections.len(),
        metrics.total_fus,
        metrics.total_hairs,
        clustering.terminals.len()
    );

    Ok(AnalysisOutput {
        metrics,
        draw_instructions,
        detections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_scales_back_to_original_image() {
        // one box at the center of a 640x640 input, original is 1280x960 (w x h)
        let mut raw = Array3::<f32>::zeros((1, 10, 1));
        for (c, v) in [320., 320., 10., 40., 0.9, 0.9, 0., 0., 0., 0.].iter().enumerate() {
            raw[[0, c, 0]] = *v;
        }
        let out = analyze(
            raw.view().into_dyn(),
            ImageDims::new(960, 1280),
            ImageDims::square(640),
            &CalibrationContext::default(),
        )
        .unwrap();

        let d = &out.detections[0];
        assert_eq!((d.x1, d.x2), (630., 650.));
        assert_eq!((d.y1, d.y2), (450., 510.));
        assert_eq!(out.draw_instructions.len(), 1);
        assert_eq!(out.draw_instructions[0].label, "Single FU");
    }
}
