use std::path::Path;

use image::RgbImage;
use snafu::{OptionExt, ensure};

use crate::error::{DegeneratePageSnafu, DocparseError, ImageBufferSnafu};

pub mod annotate;
pub mod pdfium;

pub use pdfium::PdfiumRasterizer;

/// A rasterized page: row-major, interleaved RGB, 8 bits per channel.
#[derive(Debug, Clone)]
pub struct PageImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PageImage {
    /// Wraps a raw renderer buffer, checking `data.len() == width * height * 3`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, DocparseError> {
        let expected = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(3))
            .context(ImageBufferSnafu {
                width,
                height,
                len: data.len(),
            })?;
        ensure!(
            data.len() == expected,
            ImageBufferSnafu {
                width,
                height,
                len: data.len(),
            }
        );

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rejects zero-area pages before they reach the preprocessor.
    pub fn ensure_not_degenerate(&self) -> Result<(), DocparseError> {
        ensure!(
            !self.is_degenerate(),
            DegeneratePageSnafu {
                width: self.width,
                height: self.height,
            }
        );
        Ok(())
    }

    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
    }
}

/// Boundary to whatever turns a document page into pixels.
pub trait Rasterizer {
    fn page_count(&self, path: &Path) -> Result<usize, DocparseError>;

    /// Renders the zero-based `page_index` of `path` at `dpi`.
    fn render_page(
        &self,
        path: &Path,
        page_index: usize,
        dpi: u32,
    ) -> Result<PageImage, DocparseError>;
}
