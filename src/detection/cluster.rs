// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 毛囊单位聚类
// 固定半径的单链接连通: 中心距离 <= 阈值的检测框属于同一个毛囊单位

use log::debug;

use super::types::{Cluster, Detection};

/// 聚类结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    /// Ordered by each cluster's first member in input order.
    pub clusters: Vec<Cluster>,
    /// Non-clusterable detections, one-to-one with the input.
    pub terminals: Vec<Detection>,
}

impl Clustering {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.terminals.is_empty()
    }
}

/// Disjoint-set forest over detection indices.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut current = x;
        while current != self.parent[current] {
            // path halving
            self.parent[current] = self.parent[self.parent[current]];
            current = self.parent[current];
        }
        current
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Splits detections into clusterable hairs and terminal detections, then
/// groups the hairs into connected components of the radius graph.
pub fn cluster_detections(detections: &[Detection], distance_threshold: f32) -> Clustering {
    let (hairs, terminals): (Vec<&Detection>, Vec<&Detection>) =
        detections.iter().partition(|d| d.is_clusterable());

    let mut set = DisjointSet::new(hairs.len());
    for i in 0..hairs.len() {
        for j in (i + 1)..hairs.len() {
            if hairs[i].center_distance(hairs[j]) <= distance_threshold {
                set.union(i, j);
            }
        }
    }

    // root -> slot in `groups`, assigned in first-seen order
    let mut slot_of_root: Vec<Option<usize>> = vec![None; hairs.len()];
    let mut groups: Vec<Vec<Detection>> = Vec::new();
    for (i, hair) in hairs.iter().enumerate() {
        let root = set.find(i);
        let slot = match slot_of_root[root] {
            Some(slot) => slot,
            None => {
                groups.push(Vec::new());
                slot_of_root[root] = Some(groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].push((*hair).clone());
    }

    let clusters: Vec<Cluster> = groups.into_iter().filter_map(Cluster::new).collect();
    debug!(
        "Grouped {} hair detections into {} clusters ({} terminal, radius {}px)",
        hairs.len(),
        clusters.len(),
        terminals.len(),
        distance_threshold
    );

    Clustering {
        clusters,
        terminals: terminals.into_iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::DetectionClass;

    fn at(cx: f32, cy: f32, class: DetectionClass) -> Detection {
        Detection::new(cx - 2., cy - 5., cx + 2., cy + 5., 0.9, class.id())
    }

    #[test]
    fn test_close_singles_merge() {
        let dets = vec![
            at(10., 10., DetectionClass::Single),
            at(20., 20., DetectionClass::Single),
        ];
        let clustering = cluster_detections(&dets, 100.);
        assert_eq!(clustering.clusters.len(), 1);
        assert_eq!(clustering.clusters[0].fu_type(), DetectionClass::Double);
    }

    #[test]
    fn test_far_singles_stay_apart() {
        let dets = vec![
            at(10., 10., DetectionClass::Single),
            at(20., 20., DetectionClass::Single),
        ];
        let clustering = cluster_detections(&dets, 5.);
        assert_eq!(clustering.clusters.len(), 2);
        assert!(clustering.clusters.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_chains_are_transitive() {
        // a-b and b-c are within 10px, a-c is not
        let dets = vec![
            at(0., 0., DetectionClass::Single),
            at(100., 0., DetectionClass::Double),
            at(8., 0., DetectionClass::Double),
            at(16., 0., DetectionClass::Single),
        ];
        let clustering = cluster_detections(&dets, 10.);
        assert_eq!(clustering.clusters.len(), 2);
        assert_eq!(clustering.clusters[0].len(), 3);
        assert_eq!(clustering.clusters[0].members()[0].center(), (0., 0.));
        assert_eq!(clustering.clusters[1].len(), 1);
    }

    #[test]
    fn test_distance_equal_to_threshold_connects() {
        let dets = vec![
            at(0., 0., DetectionClass::Single),
            at(3., 4., DetectionClass::Single),
        ];
        assert_eq!(cluster_detections(&dets, 5.).clusters.len(), 1);
    }

    #[test]
    fn test_terminals_pass_through() {
        let dets = vec![
            at(0., 0., DetectionClass::Abnormal),
            at(1., 1., DetectionClass::Single),
            at(2., 2., DetectionClass::Undersize),
            Detection::new(0., 0., 1., 1., 0.5, 9),
        ];
        let clustering = cluster_detections(&dets, 100.);
        assert_eq!(clustering.clusters.len(), 1);
        assert_eq!(clustering.clusters[0].len(), 1);
        assert_eq!(clustering.terminals.len(), 3);
        assert_eq!(clustering.terminals[0].class(), Some(DetectionClass::Abnormal));
    }

    #[test]
    fn test_empty() {
        assert!(cluster_detections(&[], 100.).is_empty());
    }
}
