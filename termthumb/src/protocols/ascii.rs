// ABOUTME: Text-art fallback renderer backed by the artem conversion library
// ABOUTME: Pre-sizes the source to the cell grid so artem emits exactly that many rows and columns

use super::scaling::{self, PixelBox};
use super::{CellSize, GraphicsProtocol, ImageRenderer};
use crate::constants::ascii::ROW_PIXELS;
use crate::error::{Result, ThumbnailError};
use artem::config::ConfigBuilder;
use image::DynamicImage;
use std::num::NonZeroU32;

#[derive(Debug, Clone)]
pub struct AsciiRenderer {
    size: CellSize,
    colored: bool,
}

impl AsciiRenderer {
    pub fn new(width: u32, height: u32, colored: bool) -> Self {
        Self {
            size: CellSize::new(width, height),
            colored,
        }
    }

    /// Text grid (columns, rows) for a source, aspect-preserving and inside the cell box.
    ///
    /// A text cell is treated as one pixel wide and `ROW_PIXELS` tall, so small
    /// sources grow to fill the box and large ones shrink into it.
    pub fn target_grid(&self, image_width: u32, image_height: u32) -> (u32, u32) {
        let (columns, rows) = (self.size.width, self.size.height);
        if image_width == 0 || image_height == 0 {
            return (columns, rows);
        }

        let cell_width = image_width;
        let cell_height = image_height.div_ceil(ROW_PIXELS).max(1);
        let target = scaling::pixel_box(GraphicsProtocol::Ascii, columns, rows);

        scaling::target_dimensions(cell_width, cell_height, target, true)
            .unwrap_or((cell_width.min(columns), cell_height.min(rows)))
    }
}

impl ImageRenderer for AsciiRenderer {
    fn protocol(&self) -> GraphicsProtocol {
        GraphicsProtocol::Ascii
    }

    fn render_image(&self, img: &DynamicImage) -> Result<String> {
        if img.width() == 0 || img.height() == 0 {
            return Err(ThumbnailError::EncodeFailure(
                "cannot render an empty image as text".to_string(),
            ));
        }

        let (columns, rows) = self.target_grid(img.width(), img.height());
        // artem never upscales and derives rows from the pixel height, so hand it the exact grid
        let sized = scaling::fill_exact(
            img,
            PixelBox {
                width: columns,
                height: rows.saturating_mul(ROW_PIXELS),
            },
        );
        let target_size = NonZeroU32::new(columns).unwrap_or(NonZeroU32::MIN);

        log::debug!(
            "Rendering {}x{} image as {}x{} text",
            img.width(),
            img.height(),
            columns,
            rows
        );

        let config = ConfigBuilder::new()
            .target_size(target_size)
            .color(self.colored)
            .build();

        Ok(artem::convert(sized.into_owned(), &config))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    fn set_dimensions(&mut self, width: u32, height: u32) {
        self.size.update(width, height);
    }

    fn set_colored(&mut self, colored: bool) {
        self.colored = colored;
    }
}
