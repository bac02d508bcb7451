// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 标注指令生成 (不修改像素, 由渲染模块绘制)

use serde::{Deserialize, Serialize};

use crate::detection::{Clustering, Detection, DetectionClass};

/// 标签前缀 → 颜色 (R, G, B)
const PALETTE: [(&str, (u8, u8, u8)); 5] = [
    ("single", (255, 255, 0)),
    ("double", (0, 255, 0)),
    ("triple+", (0, 165, 255)),
    ("abnormal", (255, 0, 0)),
    ("undersize", (0, 0, 255)),
];

pub const DEFAULT_COLOR: (u8, u8, u8) = (128, 128, 128);

/// 绘制指令: 一个框 + 标签 + 颜色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawInstruction {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub label: String,
    pub color: (u8, u8, u8),
}

/// Case-insensitive prefix lookup; gray when nothing matches.
pub fn color_for_label(label: &str) -> (u8, u8, u8) {
    let label = label.to_lowercase();
    PALETTE
        .iter()
        .find(|(prefix, _)| label.starts_with(prefix))
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COLOR)
}

pub fn fu_label(fu_type: DetectionClass) -> &'static str {
    match fu_type {
        DetectionClass::Single => "Single FU",
        DetectionClass::Double => "Double FU",
        _ => "Triple+ FU",
    }
}

fn terminal_label(detection: &Detection) -> String {
    match detection.class() {
        Some(class) => {
            let name = class.name();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        None => format!("Class {}", detection.class_id),
    }
}

/// One instruction per cluster (its enclosing box), then one per terminal detection.
pub fn annotate(clustering: &Clustering) -> Vec<DrawInstruction> {
    let clusters = clustering.clusters.iter().map(|cluster| {
        let (x1, y1, x2, y2) = cluster.enclosing_box();
        let label = fu_label(cluster.fu_type());
        DrawInstruction {
            x1,
            y1,
            x2,
            y2,
            label: label.to_string(),
            color: color_for_label(label),
        }
    });

    let terminals = clustering.terminals.iter().map(|d| {
        let label = terminal_label(d);
        DrawInstruction {
            x1: d.x1,
            y1: d.y1,
            x2: d.x2,
            y2: d.y2,
            color: color_for_label(&label),
            label,
        }
    });

    clusters.chain(terminals).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::cluster_detections;

    #[test]
    fn test_palette() {
        assert_eq!(color_for_label("Single FU"), (255, 255, 0));
        assert_eq!(color_for_label("Double FU"), (0, 255, 0));
        assert_eq!(color_for_label("Triple+ FU"), (0, 165, 255));
        assert_eq!(color_for_label("Abnormal"), (255, 0, 0));
        assert_eq!(color_for_label("Undersize"), (0, 0, 255));
        assert_eq!(color_for_label("Class 7"), DEFAULT_COLOR);
        assert_eq!(color_for_label(""), DEFAULT_COLOR);
    }

    #[test]
    fn test_cluster_uses_enclosing_box() {
        let dets = vec![
            Detection::new(0., 0., 10., 10., 0.9, 0),
            Detection::new(5., 8., 20., 30., 0.9, 1),
            Detection::new(100., 100., 110., 120., 0.7, DetectionClass::Abnormal.id()),
        ];
        let instructions = annotate(&cluster_detections(&dets, 50.));
        assert_eq!(instructions.len(), 2);

        let fu = &instructions[0];
        assert_eq!((fu.x1, fu.y1, fu.x2, fu.y2), (0., 0., 20., 30.));
        assert_eq!(fu.label, "Double FU");
        assert_eq!(fu.color, (0, 255, 0));

        let abnormal = &instructions[1];
        assert_eq!(abnormal.label, "Abnormal");
        assert_eq!(abnormal.color, (255, 0, 0));
        assert_eq!((abnormal.x1, abnormal.y2), (100., 120.));
    }

    #[test]
    fn test_unknown_class_is_gray() {
        let dets = vec![Detection::new(0., 0., 1., 1., 0.5, 12)];
        let instructions = annotate(&cluster_detections(&dets, 50.));
        assert_eq!(instructions[0].label, "Class 12");
        assert_eq!(instructions[0].color, DEFAULT_COLOR);
    }
}
