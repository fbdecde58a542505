use std::cmp::Ordering;

use glam::Vec2;
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use snafu::ResultExt;

use crate::{
    analysis::bbox::Bbox,
    consts::{CXYWH_OFFSET, DETECTION_ROW_SIZE},
    error::{DocparseError, ShapeSnafu, UnexpectedOutputSnafu},
    layout::element::Candidate,
};

/// Decodes the first model output into candidates.
///
/// Two layouts are understood, each with an optional leading batch of 1:
/// - `[N, 6]` rows of `x1, y1, x2, y2, score, class` (end-to-end export);
/// - `[4 + C, N]` raw head columns of `cx, cy, w, h` followed by C class scores.
///
/// `num_classes` is C. A shape matching both layouts, or neither, is
/// rejected with `UnexpectedOutput`.
pub fn decode_output(
    output: ArrayViewD<'_, f32>,
    num_classes: usize,
) -> Result<Vec<Candidate>, DocparseError> {
    let shape = output.shape().to_vec();
    let output = match shape.as_slice() {
        [1, _, _] => output.index_axis_move(Axis(0), 0),
        [_, _] => output,
        _ => {
            return UnexpectedOutputSnafu {
                shape: shape.clone(),
            }
            .fail();
        }
    };
    let output = output
        .into_dimensionality::<Ix2>()
        .context(ShapeSnafu { stage: "output" })?;

    let head_rows = CXYWH_OFFSET + num_classes;
    let is_rows = output.ncols() == DETECTION_ROW_SIZE;
    let is_head = num_classes > 0 && output.nrows() == head_rows && output.ncols() != head_rows;

    match (is_rows, is_head) {
        (true, false) => Ok(decode_rows(output)),
        (false, true) => Ok(decode_anchors(output)),
        _ => UnexpectedOutputSnafu { shape }.fail(),
    }
}

fn decode_rows(output: ArrayView2<'_, f32>) -> Vec<Candidate> {
    output
        .axis_iter(Axis(0))
        .map(|row| {
            let bbox = Bbox::from_corners(row[0], row[1], row[2], row[3]);
            let class_id = row[5].max(0.0).round() as usize;
            Candidate::new(bbox, row[4], class_id)
        })
        .collect()
}

fn decode_anchors(output: ArrayView2<'_, f32>) -> Vec<Candidate> {
    output
        .axis_iter(Axis(1))
        .map(|prediction| {
            let (cx, cy, w, h) = (prediction[0], prediction[1], prediction[2], prediction[3]);

            // Find the class with the highest probability
            let (class_id, score) = prediction
                .iter()
                .skip(CXYWH_OFFSET)
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (idx, proba)| {
                    match proba.partial_cmp(&best.1) {
                        Some(Ordering::Greater) => (idx, proba),
                        _ => best,
                    }
                });

            let bbox = Bbox::from_center_size(Vec2::new(cx, cy), Vec2::new(w, h));
            Candidate::new(bbox, score, class_id)
        })
        .collect()
}
