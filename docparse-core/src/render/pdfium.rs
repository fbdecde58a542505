use std::path::Path;
use std::time::Instant;

use pdfium_render::prelude::{PdfDocument, PdfRenderConfig, Pdfium};
use snafu::{ResultExt, ensure};
use tracing::*;

use crate::{
    consts::POINTS_PER_INCH,
    error::{DocparseError, PageOutOfRangeSnafu, PdfiumSnafu},
};

use super::{PageImage, Rasterizer};

/// Rasterizer backed by a dynamically bound pdfium library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Binds pdfium from `lib_dir` when given, otherwise from the working
    /// directory, then from the system library path.
    pub fn new(lib_dir: Option<&Path>) -> Result<Self, DocparseError> {
        let bindings = match lib_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .context(PdfiumSnafu {
                    stage: "load-dyn-lib",
                })?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .context(PdfiumSnafu {
                    stage: "load-system-lib",
                })?,
        };

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn load_pdf<'a>(&'a self, path: &Path) -> Result<PdfDocument<'a>, DocparseError> {
        self.pdfium
            .load_pdf_from_file(path, None)
            .context(PdfiumSnafu {
                stage: "load-pdf-by-path",
            })
    }
}

/// Pixel size of a page of `points` user units rendered at `dpi`.
pub fn points_to_pixels(points: f32, dpi: u32) -> i32 {
    (points * dpi as f32 / POINTS_PER_INCH).round() as i32
}

impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self, path: &Path) -> Result<usize, DocparseError> {
        let document = self.load_pdf(path)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: usize,
        dpi: u32,
    ) -> Result<PageImage, DocparseError> {
        let document = self.load_pdf(path)?;
        let page_count = document.pages().len() as usize;
        ensure!(
            page_index < page_count,
            PageOutOfRangeSnafu {
                page: page_index,
                page_count,
            }
        );

        let page = document
            .pages()
            .get(page_index as u16)
            .context(PdfiumSnafu { stage: "get-page" })?;

        let width = points_to_pixels(page.width().value, dpi);
        let height = points_to_pixels(page.height().value, dpi);

        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_maximum_height(height);

        let instant = Instant::now();
        let image = page
            .render_with_config(&render_config)
            .context(PdfiumSnafu { stage: "render" })?
            .as_image()
            .into_rgb8();

        debug!(
            "render {} page {} to {}x{} in {}ms",
            path.display(),
            page_index,
            image.width(),
            image.height(),
            instant.elapsed().as_millis()
        );

        Ok(PageImage::from_rgb(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_to_pixels() {
        // US letter at 72 dpi is its point size
        assert_eq!(points_to_pixels(612.0, 72), 612);
        // A4 width (595pt) at the default 224 dpi
        assert_eq!(points_to_pixels(595.0, 224), 1851);
        assert_eq!(points_to_pixels(0.0, 224), 0);
    }
}
