use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use snafu::{OptionExt, ResultExt};

use crate::{
    analysis::labels::color,
    consts::ANNOTATION_THICKNESS,
    error::{DocparseError, ImageBufferSnafu, ImageWriteSnafu, IoWriteSnafu},
    layout::element::Region,
};

use super::PageImage;

/// Draws every region outline on a copy of the page.
pub fn draw_regions(image: &PageImage, regions: &[Region]) -> Result<RgbImage, DocparseError> {
    let mut output_img = image.to_rgb_image().context(ImageBufferSnafu {
        width: image.width(),
        height: image.height(),
        len: image.data().len(),
    })?;

    for region in regions {
        let [x, y, width, height] = region.bbox;
        let (x, y) = (x.round() as i32, y.round() as i32);
        let (width, height) = (width.round() as u32, height.round() as u32);
        if width == 0 || height == 0 {
            continue;
        }

        let color = Rgb(color(region.class_id));
        for offset in 0..ANNOTATION_THICKNESS {
            let rect = Rect::at(x - offset, y - offset)
                .of_size(width + (offset * 2) as u32, height + (offset * 2) as u32);
            draw_hollow_rect_mut(&mut output_img, rect, color);
        }
    }

    Ok(output_img)
}

/// Writes `<dir>/page-<page>.png` with the regions drawn on it.
pub fn save_annotated(
    dir: &Path,
    page: usize,
    image: &PageImage,
    regions: &[Region],
) -> Result<PathBuf, DocparseError> {
    std::fs::create_dir_all(dir).context(IoWriteSnafu {
        path: dir.to_string_lossy(),
    })?;

    let output = dir.join(format!("page-{page}.png"));
    draw_regions(image, regions)?
        .save(&output)
        .context(ImageWriteSnafu {
            path: output.to_string_lossy(),
        })?;

    Ok(output)
}
