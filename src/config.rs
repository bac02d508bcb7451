// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 标定配置 - 通过JSON文件或命令行参数调整

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// 单个任务的标定参数
///
/// 每次调用显式传入, 不读取任何全局状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationContext {
    pub image_area_cm2: f64,        // 视野面积 (cm²)
    pub pixels_per_mm: f64,         // 像素/毫米
    pub distance_threshold_px: f32, // 聚类半径 (像素)
    pub confidence_threshold: f32,  // 置信度阈值
    pub nms_iou_threshold: f32,     // NMS IOU阈值
}

impl Default for CalibrationContext {
    fn default() -> Self {
        Self {
            image_area_cm2: 0.25,
            pixels_per_mm: 600.0,
            distance_threshold_px: 100.0,
            confidence_threshold: 0.15,
            nms_iou_threshold: 0.45,
        }
    }
}

impl CalibrationContext {
    /// Reads a calibration profile. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        info!("Calibration loaded from {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("Calibration saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, v: f64) -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(AnalysisError::InvalidCalibration(format!(
                    "{} must be a positive number, got {}",
                    name, v
                )))
            }
        }
        fn unit(name: &str, v: f32) -> Result<()> {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(AnalysisError::InvalidCalibration(format!(
                    "{} must be in (0, 1], got {}",
                    name, v
                )))
            }
        }

        positive("image_area_cm2", self.image_area_cm2)?;
        positive("pixels_per_mm", self.pixels_per_mm)?;
        positive("distance_threshold_px", self.distance_threshold_px as f64)?;
        unit("confidence_threshold", self.confidence_threshold)?;
        unit("nms_iou_threshold", self.nms_iou_threshold)?;

        if self.nms_iou_threshold >= 0.9 {
            warn!(
                "nms_iou_threshold {} keeps nearly every overlapping box",
                self.nms_iou_threshold
            );
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        info!(
            "Calibration: area {} cm², {} px/mm, radius {} px, conf {:.2}, iou {:.2}",
            self.image_area_cm2,
            self.pixels_per_mm,
            self.distance_threshold_px,
            self.confidence_threshold,
            self.nms_iou_threshold
        );
    }
}

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "毛囊单位分析 - follicular unit density analysis", long_about = None)]
pub struct Args {
    /// Tensor files (`*.json`), or images when `--model` is given
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// ONNX model; inputs are then treated as images
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Calibration profile (JSON)
    #[arg(short, long)]
    pub calibration: Option<PathBuf>,

    /// Confidence threshold
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IoU threshold
    #[arg(long)]
    pub iou: Option<f32>,

    /// Clustering radius in pixels
    #[arg(long)]
    pub distance: Option<f32>,

    /// Pixels per millimetre
    #[arg(long)]
    pub pixels_per_mm: Option<f64>,

    /// Imaged area in cm²
    #[arg(long)]
    pub area: Option<f64>,

    /// Output directory for reports and annotated images
    #[arg(short, long, default_value = "runs")]
    pub output: PathBuf,

    /// TrueType font for annotation labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// More output per occurrence (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Less output per occurrence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Args {
    /// Profile file (or defaults) with command-line overrides applied.
    pub fn calibration(&self) -> Result<CalibrationContext> {
        let mut calibration = match &self.calibration {
            Some(path) => CalibrationContext::load(path)?,
            None => CalibrationContext::default(),
        };
        if let Some(v) = self.conf {
            calibration.confidence_threshold = v;
        }
        if let Some(v) = self.iou {
            calibration.nms_iou_threshold = v;
        }
        if let Some(v) = self.distance {
            calibration.distance_threshold_px = v;
        }
        if let Some(v) = self.pixels_per_mm {
            calibration.pixels_per_mm = v;
        }
        if let Some(v) = self.area {
            calibration.image_area_cm2 = v;
        }
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose as i16 - self.quiet as i16 {
            i16::MIN..=-2 => log::LevelFilter::Off,
            -1 => log::LevelFilter::Error,
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CalibrationContext::default();
        assert_eq!(config.distance_threshold_px, 100.0);
        assert_eq!(config.pixels_per_mm, 600.0);
        assert_eq!(config.image_area_cm2, 0.25);
        assert_eq!(config.confidence_threshold, 0.15);
        assert_eq!(config.nms_iou_threshold, 0.45);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_profile_uses_defaults() {
        let config: CalibrationContext = serde_json::from_str(r#"{"pixels_per_mm": 480}"#).unwrap();
        assert_eq!(config.pixels_per_mm, 480.0);
        assert_eq!(config.image_area_cm2, 0.25);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            CalibrationContext {
                pixels_per_mm: 0.0,
                ..Default::default()
            },
            CalibrationContext {
                image_area_cm2: f64::NAN,
                ..Default::default()
            },
            CalibrationContext {
                confidence_threshold: 1.5,
                ..Default::default()
            },
            CalibrationContext {
                nms_iou_threshold: 0.0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(AnalysisError::InvalidCalibration(_))
            ));
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        let config = CalibrationContext {
            pixels_per_mm: 512.0,
            distance_threshold_px: 40.0,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(CalibrationContext::load(&path).unwrap(), config);
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from(["follicle", "a.json", "--conf", "0.3", "--area", "0.5", "-vv"]);
        let calibration = args.calibration().unwrap();
        assert_eq!(calibration.confidence_threshold, 0.3);
        assert_eq!(calibration.image_area_cm2, 0.5);
        assert_eq!(args.log_level(), log::LevelFilter::Debug);
    }
}
