use tracing::*;

use crate::{
    analysis::{
        bbox::Bbox,
        labels::{LabelMap, resolve_label},
        nms::{NmsPolicy, nms},
    },
    consts::{INPUT_SIZE, NMS_IOU_THRESHOLD, SCORE_THRESHOLD},
    layout::element::{Candidate, Region},
};

/// Knobs for turning raw candidates into regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
    pub input_size: usize,
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub nms_policy: NmsPolicy,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE,
            score_threshold: SCORE_THRESHOLD,
            iou_threshold: NMS_IOU_THRESHOLD,
            nms_policy: NmsPolicy::ClassAgnostic,
        }
    }
}

/// Keeps candidates scoring strictly above `threshold`, in input order.
pub fn score_filter(candidates: &[Candidate], threshold: f32) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|candidate| candidate.score > threshold)
        .copied()
        .collect()
}

/// Factor mapping tensor pixels back to a `width` x `height` page.
pub fn gain(width: usize, height: usize, input_size: usize) -> f32 {
    width.max(height) as f32 / input_size as f32
}

/// Maps a tensor-space box back to the original page.
///
/// Padding only ever lands on the trailing edges, so undoing the uniform
/// scale is enough.
pub fn invert_bbox(bbox: &Bbox, gain: f32) -> Bbox {
    bbox.scale(gain)
}

/// Filters, suppresses and remaps raw detections of a `width` x `height` page.
///
/// Regions come out in suppression order: descending score, ties in model
/// output order.
pub fn postprocess(
    candidates: &[Candidate],
    (width, height): (usize, usize),
    config: &PostprocessConfig,
    labels: Option<&LabelMap>,
) -> Vec<Region> {
    let candidates = score_filter(candidates, config.score_threshold);
    if candidates.is_empty() {
        return Vec::new();
    }

    let kept = nms(&candidates, config.iou_threshold, config.nms_policy);
    debug!(
        "nms kept {} out of {} candidates",
        kept.len(),
        candidates.len()
    );

    let gain = gain(width, height, config.input_size);
    kept.iter()
        .map(|idx| {
            let candidate = &candidates[idx];
            Region {
                bbox: invert_bbox(&candidate.bbox, gain).to_xywh(),
                score: candidate.score,
                label: resolve_label(candidate.class_id, labels),
                class_id: candidate.class_id,
            }
        })
        .collect()
}
