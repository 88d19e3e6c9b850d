// ABOUTME: Unicode half-block mosaic renderer with 24-bit color and monochrome modes
// ABOUTME: Packs two vertically stacked pixels into every character cell

use super::scaling::{self, pixel_box};
use super::{CellSize, GraphicsProtocol, ImageRenderer};
use crate::constants::mosaic::{
    EMPTY, FULL_BLOCK, LOWER_HALF, LUMINANCE_THRESHOLD, RESET, UPPER_HALF,
};
use crate::error::Result;
use image::{DynamicImage, Rgb};

#[derive(Debug, Clone)]
pub struct HalfBlockRenderer {
    size: CellSize,
    colored: bool,
}

impl HalfBlockRenderer {
    pub fn new(width: u32, height: u32, colored: bool) -> Self {
        Self {
            size: CellSize::new(width, height),
            colored,
        }
    }

    pub fn is_colored(&self) -> bool {
        self.colored
    }
}

impl ImageRenderer for HalfBlockRenderer {
    fn protocol(&self) -> GraphicsProtocol {
        GraphicsProtocol::HalfBlock
    }

    fn render_image(&self, img: &DynamicImage) -> Result<String> {
        let target = pixel_box(GraphicsProtocol::HalfBlock, self.size.width, self.size.height);
        let pixels = scaling::fill_exact(img, target).to_rgb8();

        let mut lines = Vec::with_capacity(self.size.height as usize);
        for row in 0..self.size.height {
            let mut line = String::new();
            for col in 0..self.size.width {
                let top = pixels.get_pixel(col, row * 2);
                let bottom = pixels.get_pixel(col, row * 2 + 1);

                if self.colored {
                    push_colored_cell(&mut line, top, bottom);
                } else {
                    line.push(monochrome_glyph(top, bottom));
                }
            }
            if self.colored {
                line.push_str(RESET);
            }
            lines.push(line);
        }

        Ok(lines.join("\n"))
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

/// Foreground paints the top half, background the bottom half
fn push_colored_cell(line: &mut String, top: &Rgb<u8>, bottom: &Rgb<u8>) {
    line.push_str(&format!(
        "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{}",
        top[0], top[1], top[2], bottom[0], bottom[1], bottom[2], UPPER_HALF
    ));
}

/// Rec. 601 luma on the 0-255 scale
pub fn luminance(pixel: &Rgb<u8>) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}

/// Glyph for a cell whose halves are either bright or dark
pub fn monochrome_glyph(top: &Rgb<u8>, bottom: &Rgb<u8>) -> char {
    let top_bright = luminance(top) >= LUMINANCE_THRESHOLD;
    let bottom_bright = luminance(bottom) >= LUMINANCE_THRESHOLD;

    match (top_bright, bottom_bright) {
        (true, true) => EMPTY,
        (false, false) => FULL_BLOCK,
        (true, false) => UPPER_HALF,
        (false, true) => LOWER_HALF,
    }
}
