// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod analysis; // 指标计算 + 标注指令
pub mod config; // 标定参数与命令行
pub mod detection; // 解码 / NMS / 聚类
pub mod error;
pub mod models; // 推理引擎接口
pub mod renderer; // 标注渲染
pub mod tensor_file;
pub mod worker; // 批量并行分析

pub use crate::analysis::{
    analyze, AnalysisOutput, AnalysisReport, DrawInstruction, ImageDims, ImageMetrics,
    SessionSummary,
};
pub use crate::config::{Args, CalibrationContext};
pub use crate::detection::{
    non_max_suppression, Candidate, Cluster, Clustering, Detection, DetectionClass,
};
pub use crate::error::{AnalysisError, Result};
pub use crate::models::{analyze_image, preprocess_image, InferenceEngine};
pub use crate::worker::{analyze_batch, AnalysisJob, JobOutcome};

/// Timestamp used in output file names, e.g. `2025-08-27_15-04-05`.
pub fn gen_time_string() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}
