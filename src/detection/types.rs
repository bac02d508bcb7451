// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 毛囊检测数据结构定义
/// Data structures shared by the decode → suppress → cluster stages
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 每个框的几何值数量 (cx, cy, w, h)
pub const CXYWH_OFFSET: usize = 4;

/// 几何值 + objectness
pub const CXYWHO_OFFSET: usize = 5;

// ========== 枚举类型 ==========

/// 检测类别 (模型输出的类别顺序)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Single,
    Double,
    TriplePlus,
    Abnormal,
    Undersize,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 5] = [
        DetectionClass::Single,
        DetectionClass::Double,
        DetectionClass::TriplePlus,
        DetectionClass::Abnormal,
        DetectionClass::Undersize,
    ];

    /// Follicular-unit types, in breakdown order.
    pub const FU_TYPES: [DetectionClass; 3] = [
        DetectionClass::Single,
        DetectionClass::Double,
        DetectionClass::TriplePlus,
    ];

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn id(self) -> usize {
        self as usize
    }

    /// Hair classes join the connectivity graph; everything else is terminal.
    ///
    /// `TriplePlus` is included because the FU type is decided by cluster
    /// size, not by the raw label: a lone triple+ box is a Single FU.
    pub fn is_clusterable(self) -> bool {
        matches!(
            self,
            DetectionClass::Single | DetectionClass::Double | DetectionClass::TriplePlus
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            DetectionClass::Single => "single",
            DetectionClass::Double => "double",
            DetectionClass::TriplePlus => "triple+",
            DetectionClass::Abnormal => "abnormal",
            DetectionClass::Undersize => "undersize",
        }
    }

    /// FU type for a cluster of `size` members.
    pub fn from_cluster_size(size: usize) -> Self {
        match size {
            0 | 1 => DetectionClass::Single,
            2 => DetectionClass::Double,
            _ => DetectionClass::TriplePlus,
        }
    }
}

impl std::fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ========== 数据结构 ==========

/// 解码后的候选框 (模型输入坐标系, 未过滤)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub objectness: f32,
    pub class_scores: Vec<f32>,
}

impl Candidate {
    /// Highest class score; the first index wins on ties. NaN scores never win.
    pub fn best_class(&self) -> Option<(usize, f32)> {
        self.class_scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, score)| !score.is_nan())
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
    }
}

/// 检测框 (原图像素坐标)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    /// Corners are reordered so that `x1 <= x2` and `y1 <= y2`.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            confidence,
            class_id,
        }
    }

    pub fn class(&self) -> Option<DetectionClass> {
        DetectionClass::from_id(self.class_id)
    }

    pub fn is_clusterable(&self) -> bool {
        self.class().is_some_and(DetectionClass::is_clusterable)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2., (self.y1 + self.y2) / 2.)
    }

    /// Minor axis of the box, used as the fiber diameter estimate.
    pub fn thickness(&self) -> f32 {
        self.width().min(self.height())
    }

    pub fn center_distance(&self, another: &Detection) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = another.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    pub fn intersection_area(&self, another: &Detection) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Detection) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Detection) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}

/// 毛囊单位: 一组连通的头发检测框 (非空)
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<Detection>,
}

impl Cluster {
    /// Returns `None` for an empty member list.
    pub fn new(members: Vec<Detection>) -> Option<Self> {
        if members.is_empty() {
            None
        } else {
            Some(Self { members })
        }
    }

    pub fn members(&self) -> &[Detection] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Size, not the members' labels, decides the FU type.
    pub fn fu_type(&self) -> DetectionClass {
        DetectionClass::from_cluster_size(self.len())
    }

    /// Smallest box covering every member, as `(x1, y1, x2, y2)`.
    pub fn enclosing_box(&self) -> (f32, f32, f32, f32) {
        self.members.iter().fold(
            (
                f32::INFINITY,
                f32::INFINITY,
                f32::NEG_INFINITY,
                f32::NEG_INFINITY,
            ),
            |(x1, y1, x2, y2), d| (x1.min(d.x1), y1.min(d.y1), x2.max(d.x2), y2.max(d.y2)),
        )
    }
}
