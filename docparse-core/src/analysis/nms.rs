use std::cmp::Ordering;

use crate::layout::element::Candidate;

/// Which boxes may suppress each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NmsPolicy {
    /// Any higher-scoring box suppresses an overlapping box.
    #[default]
    ClassAgnostic,
    /// Only boxes of the same class suppress each other.
    PerClass,
}

/// Indices into the candidate slice that survived suppression, ordered by
/// descending score (ties in input order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeptIndices(Vec<usize>);

impl KeptIndices {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Picks the surviving candidates, in survivor order.
    pub fn select(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        self.iter().map(|idx| candidates[idx]).collect()
    }
}

/// Greedy non-maximum suppression.
///
/// Candidates are visited by descending score; a candidate is dropped when
/// its IoU with an already kept candidate exceeds `iou_threshold`.
pub fn nms(candidates: &[Candidate], iou_threshold: f32, policy: NmsPolicy) -> KeptIndices {
    let mut order = (0..candidates.len()).collect::<Vec<_>>();
    // stable: equal scores keep their input order
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .partial_cmp(&candidates[a].score)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for current in order {
        let candidate = &candidates[current];
        let suppressed = kept.iter().any(|&kept_idx| {
            let other = &candidates[kept_idx];
            let comparable = match policy {
                NmsPolicy::ClassAgnostic => true,
                NmsPolicy::PerClass => other.class_id == candidate.class_id,
            };
            comparable && other.bbox.iou(&candidate.bbox) > iou_threshold
        });

        if !suppressed {
            kept.push(current);
        }
    }

    KeptIndices(kept)
}
