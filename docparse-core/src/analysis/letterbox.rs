use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;
use snafu::OptionExt;

use crate::{
    consts::{BATCH_SIZE, INPUT_CHANNELS, PAD_VALUE},
    error::{DocparseError, ImageBufferSnafu},
    render::PageImage,
};

/// Channel order a model expects its input tensor in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Same order as the rendered page.
    #[default]
    Rgb,
    Bgr,
}

/// Transform applied to one page, needed to map detections back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// `input_size / max(height, width)`
    pub scale: f32,
    pub pad_h: usize,
    pub pad_w: usize,
    pub input_size: usize,
}

impl Letterbox {
    /// Computes the transform for a `width` x `height` page.
    ///
    /// Resized sides are rounded and kept within `1..=input_size`.
    pub fn new(width: usize, height: usize, input_size: usize) -> Self {
        let (resized_w, resized_h) = Self::resized_size(width, height, input_size);
        Self {
            scale: input_size as f32 / width.max(height) as f32,
            pad_h: input_size - resized_h,
            pad_w: input_size - resized_w,
            input_size,
        }
    }

    fn resized_size(width: usize, height: usize, input_size: usize) -> (usize, usize) {
        let scale = input_size as f32 / width.max(height) as f32;
        let fit = |side: usize| ((side as f32 * scale).round() as usize).clamp(1, input_size);
        (fit(width), fit(height))
    }

    pub fn resized_width(&self) -> usize {
        self.input_size - self.pad_w
    }

    pub fn resized_height(&self) -> usize {
        self.input_size - self.pad_h
    }
}

/// Letterboxes a page into a `(1, 3, S, S)` tensor normalized to `[0, 1]`.
///
/// The page keeps its aspect ratio; the bottom and right edges are padded
/// with `PAD_VALUE`. Zero-area pages are refused.
pub fn letterbox(
    image: &PageImage,
    input_size: usize,
    channel_order: ChannelOrder,
) -> Result<(Array4<f32>, Letterbox), DocparseError> {
    image.ensure_not_degenerate()?;

    let transform = Letterbox::new(image.width(), image.height(), input_size);

    let source = image.to_rgb_image().context(ImageBufferSnafu {
        width: image.width(),
        height: image.height(),
        len: image.data().len(),
    })?;
    let resized: RgbImage = image::imageops::resize(
        &source,
        transform.resized_width() as u32,
        transform.resized_height() as u32,
        FilterType::Triangle,
    );

    let mut input_tensor = Array4::from_elem(
        [BATCH_SIZE, INPUT_CHANNELS, input_size, input_size],
        PAD_VALUE as f32 / 255.0,
    );

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        let channels = match channel_order {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        };
        for (c, value) in channels.into_iter().enumerate() {
            input_tensor[[0, c, y, x]] = value as f32 / 255.0;
        }
    }

    Ok((input_tensor, transform))
}
