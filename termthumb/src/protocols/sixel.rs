// ABOUTME: Sixel palette raster renderer with optional Floyd-Steinberg dithering
// ABOUTME: Quantizes to a fixed 256-color palette and emits run-length encoded six-pixel bands

use super::scaling::{self, pixel_box};
use super::{CellSize, GraphicsProtocol, ImageRenderer};
use crate::error::{Result, ThumbnailError};
use image::imageops::{self, ColorMap};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
const CUBE_SIZE: usize = 216;
const GRAY_STEPS: usize = 40;
pub const PALETTE_SIZE: usize = CUBE_SIZE + GRAY_STEPS;

/// Sixel only ever shrinks images; sources smaller than the box keep native resolution.
#[derive(Debug, Clone)]
pub struct SixelRenderer {
    size: CellSize,
    dithering: bool,
}

impl SixelRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: CellSize::new(width, height),
            dithering: true,
        }
    }

    pub fn with_dithering(mut self, dithering: bool) -> Self {
        self.dithering = dithering;
        self
    }

    pub fn dithering(&self) -> bool {
        self.dithering
    }
}

impl ImageRenderer for SixelRenderer {
    fn protocol(&self) -> GraphicsProtocol {
        GraphicsProtocol::Sixel
    }

    fn render_image(&self, img: &DynamicImage) -> Result<String> {
        let target = pixel_box(GraphicsProtocol::Sixel, self.size.width, self.size.height);
        let scaled = scaling::downscale_only(img, target);
        encode_sixel(&scaled.to_rgb8(), self.dithering)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    fn set_dimensions(&mut self, width: u32, height: u32) {
        self.size.update(width, height);
    }
}

/// xterm-style palette: a 6x6x6 color cube followed by a 40-step gray ramp.
#[derive(Debug, Clone, Copy, Default)]
pub struct SixelPalette;

impl SixelPalette {
    pub fn color(&self, index: usize) -> Option<Rgb<u8>> {
        if index < CUBE_SIZE {
            Some(Rgb([
                CUBE_LEVELS[index / 36],
                CUBE_LEVELS[(index / 6) % 6],
                CUBE_LEVELS[index % 6],
            ]))
        } else if index < PALETTE_SIZE {
            let v = gray_value(index - CUBE_SIZE);
            Some(Rgb([v, v, v]))
        } else {
            None
        }
    }

    pub fn nearest(&self, color: &Rgb<u8>) -> usize {
        let [r, g, b] = color.0;
        let cube = nearest_level(r) * 36 + nearest_level(g) * 6 + nearest_level(b);

        let average = (r as usize + g as usize + b as usize) / 3;
        let gray = CUBE_SIZE + (average * (GRAY_STEPS - 1) + 127) / 255;

        let cube_distance = self.color(cube).map_or(u32::MAX, |c| distance(&c, color));
        let gray_distance = self.color(gray).map_or(u32::MAX, |c| distance(&c, color));

        if gray_distance < cube_distance {
            gray
        } else {
            cube
        }
    }
}

impl ColorMap for SixelPalette {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Rgb<u8>) -> usize {
        self.nearest(color)
    }

    fn lookup(&self, index: usize) -> Option<Rgb<u8>> {
        self.color(index)
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        if let Some(mapped) = self.color(self.nearest(color)) {
            *color = mapped;
        }
    }
}

fn gray_value(step: usize) -> u8 {
    (step * 255 / (GRAY_STEPS - 1)) as u8
}

fn nearest_level(value: u8) -> usize {
    CUBE_LEVELS
        .iter()
        .enumerate()
        .min_by_key(|(_, level)| (**level as i32 - value as i32).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn distance(a: &Rgb<u8>, b: &Rgb<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| {
            let d = *x as i32 - *y as i32;
            (d * d) as u32
        })
        .sum()
}

fn percent(value: u8) -> u32 {
    (value as u32 * 100 + 127) / 255
}

/// Palette index for every pixel
fn quantize(img: &RgbImage, dithering: bool) -> GrayImage {
    let palette = SixelPalette;
    if dithering {
        let mut dithered = img.clone();
        imageops::dither(&mut dithered, &palette);
        imageops::index_colors(&dithered, &palette)
    } else {
        imageops::index_colors(img, &palette)
    }
}

fn push_run_length(out: &mut String, bits: &[u8]) {
    let mut i = 0;
    while i < bits.len() {
        let value = bits[i];
        let mut run = 1;
        while i + run < bits.len() && bits[i + run] == value {
            run += 1;
        }

        let ch = (value + 63) as char;
        if run > 3 {
            out.push_str(&format!("!{}{}", run, ch));
        } else {
            for _ in 0..run {
                out.push(ch);
            }
        }
        i += run;
    }
}

/// Encode an RGB image as a complete DCS sixel sequence
pub fn encode_sixel(img: &RgbImage, dithering: bool) -> Result<String> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ThumbnailError::EncodeFailure(format!(
            "Cannot encode a {}x{} image as sixel",
            width, height
        )));
    }

    let indices = quantize(img, dithering);
    let palette = SixelPalette;

    let mut used = [false; PALETTE_SIZE];
    for pixel in indices.pixels() {
        used[pixel[0] as usize] = true;
    }

    let mut out = String::new();
    out.push_str("\x1bPq");
    out.push_str(&format!("\"1;1;{};{}", width, height));

    for index in (0..PALETTE_SIZE).filter(|i| used[*i]) {
        let color = palette.color(index).ok_or_else(|| {
            ThumbnailError::EncodeFailure(format!("Palette index {} out of range", index))
        })?;
        out.push_str(&format!(
            "#{};2;{};{};{}",
            index,
            percent(color[0]),
            percent(color[1]),
            percent(color[2])
        ));
    }

    let mut bits = vec![0u8; width as usize];
    for band_top in (0..height).step_by(6) {
        let band_height = (height - band_top).min(6);

        let mut band_colors = [false; PALETTE_SIZE];
        for y in band_top..band_top + band_height {
            for x in 0..width {
                band_colors[indices.get_pixel(x, y)[0] as usize] = true;
            }
        }

        let mut first = true;
        for color in (0..PALETTE_SIZE).filter(|c| band_colors[*c]) {
            bits.fill(0);
            for dy in 0..band_height {
                for x in 0..width {
                    if indices.get_pixel(x, band_top + dy)[0] as usize == color {
                        bits[x as usize] |= 1 << dy;
                    }
                }
            }

            // `$` returns to the start of the band for the next color
            if !first {
                out.push('$');
            }
            first = false;

            out.push_str(&format!("#{}", color));
            push_run_length(&mut out, &bits);
        }

        if band_top + band_height < height {
            out.push('-');
        }
    }

    out.push_str("\x1b\\");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    #[test]
    fn test_palette_lookup() {
        let palette = SixelPalette;
        assert_eq!(palette.color(0), Some(Rgb([0, 0, 0])));
        assert_eq!(palette.color(215), Some(Rgb([255, 255, 255])));
        assert_eq!(palette.color(CUBE_SIZE + 1), Some(Rgb([6, 6, 6])));
        assert_eq!(palette.color(PALETTE_SIZE), None);
    }

    #[test]
    fn test_nearest_prefers_exact_entries() {
        let palette = SixelPalette;
        assert_eq!(palette.nearest(&Rgb([255, 0, 0])), 180);
        assert_eq!(palette.nearest(&Rgb([0, 0, 255])), 5);

        let mid_gray = palette.nearest(&Rgb([128, 128, 128]));
        assert!(mid_gray >= CUBE_SIZE);
    }

    #[test]
    fn test_run_length_encoding() {
        let mut out = String::new();
        push_run_length(&mut out, &[15, 15, 15, 15, 15, 0, 0, 63]);
        assert_eq!(out, "!5N??~");
    }

    #[test]
    fn test_encode_solid_block() {
        let output = encode_sixel(&solid(4, 4, [255, 0, 0]), false).unwrap();

        assert!(output.starts_with("\x1bPq\"1;1;4;4"));
        assert!(output.contains("#180;2;100;0;0"));
        // Rows 0-3 set in every column: 0b001111 + 63 = 'N'
        assert!(output.contains("#180!4N"));
        assert!(output.ends_with("\x1b\\"));
        assert!(!output.contains('-'));
    }

    #[test]
    fn test_encode_multiple_bands() {
        let output = encode_sixel(&solid(2, 7, [0, 0, 0]), true).unwrap();
        assert_eq!(output.matches('-').count(), 1);
    }

    #[test]
    fn test_encode_two_colors_share_a_band() {
        let mut img = solid(2, 2, [255, 255, 255]);
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        let output = encode_sixel(&img, false).unwrap();

        assert!(output.contains("#0;2;0;0;0"));
        assert!(output.contains("#215;2;100;100;100"));
        assert!(output.contains('$'));
    }

    #[test]
    fn test_empty_image_is_encode_failure() {
        assert!(matches!(
            encode_sixel(&RgbImage::new(0, 0), true),
            Err(ThumbnailError::EncodeFailure(_))
        ));
    }

    #[test]
    fn test_small_source_is_not_upscaled() {
        let img = DynamicImage::ImageRgb8(solid(4, 4, [0, 255, 0]));
        let output = SixelRenderer::new(40, 20).render_image(&img).unwrap();
        assert!(output.contains("\"1;1;4;4"));
    }

    #[test]
    fn test_large_source_is_downscaled() {
        let img = DynamicImage::ImageRgb8(solid(1000, 1000, [0, 255, 0]));
        let output = SixelRenderer::new(10, 5).render_image(&img).unwrap();
        assert!(output.contains("\"1;1;100;100"));
    }

    #[test]
    fn test_dithering_toggle() {
        let renderer = SixelRenderer::new(4, 4);
        assert!(renderer.dithering());
        assert!(!renderer.with_dithering(false).dithering());
    }
}
