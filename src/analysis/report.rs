// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 下游存储的报告格式: 指标保留2位小数, 百分比保留1位

use serde::{Deserialize, Serialize};

use super::metrics::ImageMetrics;
use crate::detection::DetectionClass;

pub const METRIC_DECIMALS: i32 = 2;
pub const PERCENT_DECIMALS: i32 = 1;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityMetrics {
    pub follicular_unit_density: f64,
    pub average_hairs_per_fu: f64,
    pub average_hair_thickness_microns: f64,
    pub total_hair_count: usize,
    pub hair_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollicularBreakdown {
    pub single_fu_count: usize,
    pub double_fu_count: usize,
    pub triple_plus_fu_count: usize,
    pub single_fu_percentage: f64,
    pub double_fu_percentage: f64,
    pub triple_plus_fu_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherDetections {
    pub vellus_count: usize,
    pub abnormal_count: usize,
    pub vellus_density: f64,
    pub abnormal_density: f64,
}

/// 分析报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metrics: DensityMetrics,
    pub follicular_breakdown: FollicularBreakdown,
    pub other_detections: OtherDetections,
}

impl From<&ImageMetrics> for AnalysisReport {
    fn from(m: &ImageMetrics) -> Self {
        let metric = |v: f64| round_to(v, METRIC_DECIMALS);
        let percent = |c: DetectionClass| round_to(m.percentage(c), PERCENT_DECIMALS);

        Self {
            metrics: DensityMetrics {
                follicular_unit_density: metric(m.fu_density),
                average_hairs_per_fu: metric(m.avg_hairs_per_fu),
                average_hair_thickness_microns: metric(m.avg_hair_thickness_microns),
                total_hair_count: m.total_hairs,
                hair_density: metric(m.hair_density),
            },
            follicular_breakdown: FollicularBreakdown {
                single_fu_count: m.count(DetectionClass::Single),
                double_fu_count: m.count(DetectionClass::Double),
                triple_plus_fu_count: m.count(DetectionClass::TriplePlus),
                single_fu_percentage: percent(DetectionClass::Single),
                double_fu_percentage: percent(DetectionClass::Double),
                triple_plus_fu_percentage: percent(DetectionClass::TriplePlus),
            },
            other_detections: OtherDetections {
                vellus_count: m.count(DetectionClass::Undersize),
                abnormal_count: m.count(DetectionClass::Abnormal),
                vellus_density: metric(m.vellus_density),
                abnormal_density: metric(m.abnormal_density),
            },
        }
    }
}

/// 单个区域在会话汇总中的条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSummary {
    pub source: String,
    pub hair_count: usize,
    pub hair_density: f64,
    pub fu_density: f64,
}

/// 会话汇总: 一次运行中所有成功分析的区域
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_analyzed_areas: usize,
    pub total_hair_count: usize,
    pub average_hair_density: f64,
    pub average_fu_density: f64,
    pub areas: Vec<AreaSummary>,
}

impl SessionSummary {
    /// Builds the summary from `(source, metrics)` pairs. Averages are plain
    /// means over the areas and are 0 for an empty session.
    pub fn from_areas<'a, I>(areas: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a ImageMetrics)>,
    {
        let mut summary = Self::default();
        let mut hair_density_sum = 0.0;
        let mut fu_density_sum = 0.0;

        for (source, m) in areas {
            summary.total_hair_count += m.total_hairs;
            hair_density_sum += m.hair_density;
            fu_density_sum += m.fu_density;
            summary.areas.push(AreaSummary {
                source: source.to_string(),
                hair_count: m.total_hairs,
                hair_density: round_to(m.hair_density, METRIC_DECIMALS),
                fu_density: round_to(m.fu_density, METRIC_DECIMALS),
            });
        }

        summary.total_analyzed_areas = summary.areas.len();
        if summary.total_analyzed_areas > 0 {
            let n = summary.total_analyzed_areas as f64;
            summary.average_hair_density = round_to(hair_density_sum / n, METRIC_DECIMALS);
            summary.average_fu_density = round_to(fu_density_sum / n, METRIC_DECIMALS);
        }
        summary
    }
}

impl<'a> FromIterator<(&'a str, &'a ImageMetrics)> for SessionSummary {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a ImageMetrics)>>(iter: I) -> Self {
        Self::from_areas(iter)
    }
}
