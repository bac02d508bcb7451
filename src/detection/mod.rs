/// 检测后处理 (Detection Post-Processing)
///
/// 顺序执行, 每一步的输出作为下一步的输入:
/// - decoder:    原始张量 → 候选框
/// - suppressor: 置信度过滤 + NMS
/// - cluster:    头发检测框 → 毛囊单位
pub mod cluster;
pub mod decoder;
pub mod suppressor;
pub mod types;

pub use cluster::{cluster_detections, Clustering};
pub use decoder::decode;
pub use suppressor::{filter_candidates, non_max_suppression, ImageScale, Suppressor};
pub use types::{Candidate, Cluster, Detection, DetectionClass};
