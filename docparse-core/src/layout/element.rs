use serde::Serialize;

use crate::analysis::{bbox::Bbox, labels::RegionLabel};

/// One raw detection row as decoded from the model output.
///
/// The box is in letterboxed tensor pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: Bbox,
    pub score: f32,
    pub class_id: usize,
}

impl Candidate {
    pub fn new(bbox: Bbox, score: f32, class_id: usize) -> Self {
        Self {
            bbox,
            score,
            class_id,
        }
    }
}

/// A finalized detection in original page pixels.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Region {
    /// `[x, y, width, height]`
    pub bbox: [f32; 4],
    pub score: f32,
    pub label: RegionLabel,
    /// Raw model class, kept for annotation colors.
    #[serde(skip)]
    pub class_id: usize,
}
