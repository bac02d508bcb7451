// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 密度指标计算

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::CalibrationContext;
use crate::detection::{Clustering, DetectionClass};

/// 单张图片的统计结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    pub fu_density: f64,
    pub avg_hairs_per_fu: f64,
    pub avg_hair_thickness_microns: f64,
    pub avg_thickness_px: f64,
    pub hair_density: f64,
    pub vellus_density: f64,
    pub abnormal_density: f64,
    pub total_hairs: usize,
    pub total_fus: usize,
    pub counts: BTreeMap<DetectionClass, usize>,
    pub percentages: BTreeMap<DetectionClass, f64>,
}

impl ImageMetrics {
    pub fn count(&self, class: DetectionClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn percentage(&self, class: DetectionClass) -> f64 {
        self.percentages.get(&class).copied().unwrap_or(0.0)
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn compute_metrics(clustering: &Clustering, calibration: &CalibrationContext) -> ImageMetrics {
    let mut counts: BTreeMap<DetectionClass, usize> =
        DetectionClass::ALL.iter().map(|c| (*c, 0)).collect();
    let mut total_hairs = 0usize;
    let mut thickness_px: Vec<f64> = Vec::new();

    for cluster in &clustering.clusters {
        *counts.entry(cluster.fu_type()).or_default() += 1;
        total_hairs += cluster.len();
        thickness_px.extend(cluster.members().iter().map(|d| d.thickness() as f64));
    }

    for class in clustering.terminals.iter().filter_map(|d| d.class()) {
        if !class.is_clusterable() {
            *counts.entry(class).or_default() += 1;
        }
    }

    let count = |class: DetectionClass| counts.get(&class).copied().unwrap_or(0);
    let total_fus: usize = DetectionClass::FU_TYPES.iter().map(|c| count(*c)).sum();
    let area = calibration.image_area_cm2;

    let avg_thickness_px = ratio(thickness_px.iter().sum(), thickness_px.len() as f64);
    let avg_hair_thickness_microns = ratio(avg_thickness_px, calibration.pixels_per_mm) * 1000.0;

    let percentages = DetectionClass::FU_TYPES
        .iter()
        .map(|c| (*c, ratio(count(*c) as f64, total_fus as f64) * 100.0))
        .collect();

    ImageMetrics {
        fu_density: ratio(total_fus as f64, area),
        avg_hairs_per_fu: ratio(total_hairs as f64, total_fus as f64),
        avg_hair_thickness_microns,
        avg_thickness_px,
        hair_density: ratio(total_hairs as f64, area),
        vellus_density: ratio(count(DetectionClass::Undersize) as f64, area),
        abnormal_density: ratio(count(DetectionClass::Abnormal) as f64, area),
        total_hairs,
        total_fus,
        counts,
        percentages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{cluster_detections, Detection};

    fn hair(cx: f32, cy: f32, w: f32, h: f32) -> Detection {
        Detection::new(cx - w / 2., cy - h / 2., cx + w / 2., cy + h / 2., 0.9, 0)
    }

    #[test]
    fn test_counts_and_averages() {
        let dets = vec![
            // one triple at the origin
            hair(0., 0., 6., 40.),
            hair(5., 0., 8., 40.),
            hair(10., 0., 40., 10.),
            // one single far away
            hair(1000., 1000., 12., 30.),
            Detection::new(500., 500., 510., 520., 0.8, DetectionClass::Undersize.id()),
        ];
        let clustering = cluster_detections(&dets, 20.);
        let calibration = CalibrationContext::default();
        let m = compute_metrics(&clustering, &calibration);

        assert_eq!(m.count(DetectionClass::TriplePlus), 1);
        assert_eq!(m.count(DetectionClass::Single), 1);
        assert_eq!(m.count(DetectionClass::Double), 0);
        assert_eq!(m.count(DetectionClass::Undersize), 1);
        assert_eq!(m.total_fus, 2);
        assert_eq!(m.total_hairs, 4);
        assert!((m.avg_hairs_per_fu - 2.0).abs() < 1e-9);
        assert!((m.fu_density - 8.0).abs() < 1e-9);
        assert!((m.hair_density - 16.0).abs() < 1e-9);
        assert!((m.vellus_density - 4.0).abs() < 1e-9);
        // (6 + 8 + 10 + 12) / 4 = 9px -> 9 / 600 mm
        assert!((m.avg_thickness_px - 9.0).abs() < 1e-6);
        assert!((m.avg_hair_thickness_microns - 15.0).abs() < 1e-6);
        assert!((m.percentage(DetectionClass::Single) - 50.0).abs() < 1e-9);
        assert!((m.percentage(DetectionClass::TriplePlus) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_lone_triple_plus_box_is_a_single_fu() {
        let lone = Detection::new(0., 0., 6., 30., 0.9, DetectionClass::TriplePlus.id());
        let m = compute_metrics(&cluster_detections(&[lone], 100.), &CalibrationContext::default());
        assert_eq!(m.count(DetectionClass::Single), 1);
        assert_eq!(m.count(DetectionClass::TriplePlus), 0);
        assert_eq!(m.total_fus, 1);
        assert_eq!(m.total_hairs, 1);
    }

    #[test]
    fn test_no_hairs_produces_zeros() {
        let clustering = cluster_detections(&[], 100.);
        let m = compute_metrics(&clustering, &CalibrationContext::default());
        assert_eq!(m.fu_density, 0.0);
        assert_eq!(m.avg_hairs_per_fu, 0.0);
        assert_eq!(m.avg_hair_thickness_microns, 0.0);
        for class in DetectionClass::FU_TYPES {
            assert_eq!(m.percentage(class), 0.0);
        }
    }

    #[test]
    fn test_zero_area_is_guarded() {
        let clustering = cluster_detections(&[hair(0., 0., 4., 20.)], 100.);
        let calibration = CalibrationContext {
            image_area_cm2: 0.0,
            pixels_per_mm: 0.0,
            ..Default::default()
        };
        let m = compute_metrics(&clustering, &calibration);
        assert_eq!(m.fu_density, 0.0);
        assert_eq!(m.avg_hair_thickness_microns, 0.0);
        assert_eq!(m.total_fus, 1);
    }
}
