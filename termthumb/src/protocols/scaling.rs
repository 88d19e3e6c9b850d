// ABOUTME: Protocol-aware pixel targets, aspect-preserving resize, and source loading
// ABOUTME: Maps character cells to pixel boxes and decodes files into pixel buffers

use super::GraphicsProtocol;
use crate::constants::{cells, SUPPORTED_EXTENSIONS};
use crate::error::{Result, ThumbnailError};
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// Filter used for every resize
pub const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Target size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub width: u32,
    pub height: u32,
}

/// Pixel box a protocol renders `columns` x `rows` cells into
pub fn pixel_box(protocol: GraphicsProtocol, columns: u32, rows: u32) -> PixelBox {
    let (px_w, px_h) = match protocol {
        GraphicsProtocol::Kitty | GraphicsProtocol::Sixel => {
            (cells::CELL_WIDTH_PX, cells::CELL_HEIGHT_PX)
        }
        // Two stacked pixels per cell
        GraphicsProtocol::HalfBlock => (1, 2),
        GraphicsProtocol::Ascii => (1, 1),
    };

    PixelBox {
        width: columns.saturating_mul(px_w).max(1),
        height: rows.saturating_mul(px_h).max(1),
    }
}

/// Largest aspect-preserving size that fits within `target`.
///
/// Returns `None` when no resize is needed: the image already matches, or it is
/// already inside the box and `allow_upscale` is false. Empty sources and empty
/// boxes are left alone.
pub fn target_dimensions(
    width: u32,
    height: u32,
    target: PixelBox,
    allow_upscale: bool,
) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || target.width == 0 || target.height == 0 {
        return None;
    }

    let fits = width <= target.width && height <= target.height;
    if fits && !allow_upscale {
        return None;
    }

    let width_ratio = target.width as f64 / width as f64;
    let height_ratio = target.height as f64 / height as f64;
    let scale_ratio = width_ratio.min(height_ratio);

    let target_width = ((width as f64 * scale_ratio) as u32).clamp(1, target.width);
    let target_height = ((height as f64 * scale_ratio) as u32).clamp(1, target.height);

    if (target_width, target_height) == (width, height) {
        None
    } else {
        Some((target_width, target_height))
    }
}

/// Scale up or down to the largest size inside the box, preserving aspect ratio
pub fn fit_within(img: &DynamicImage, target: PixelBox) -> Cow<'_, DynamicImage> {
    match target_dimensions(img.width(), img.height(), target, true) {
        Some((width, height)) => {
            log::debug!(
                "Scaling image from {}x{} to {}x{}",
                img.width(),
                img.height(),
                width,
                height
            );
            Cow::Owned(img.resize_exact(width, height, RESIZE_FILTER))
        }
        None => Cow::Borrowed(img),
    }
}

/// Scale down to fit the box; images already inside it keep native resolution
pub fn downscale_only(img: &DynamicImage, target: PixelBox) -> Cow<'_, DynamicImage> {
    match target_dimensions(img.width(), img.height(), target, false) {
        Some((width, height)) => {
            log::debug!(
                "Downscaling image from {}x{} to {}x{}",
                img.width(),
                img.height(),
                width,
                height
            );
            Cow::Owned(img.resize_exact(width, height, RESIZE_FILTER))
        }
        None => {
            log::debug!("Image scaling skipped - already within target box");
            Cow::Borrowed(img)
        }
    }
}

/// Stretch to exactly fill the box
pub fn fill_exact(img: &DynamicImage, target: PixelBox) -> Cow<'_, DynamicImage> {
    if img.width() == target.width && img.height() == target.height {
        Cow::Borrowed(img)
    } else {
        Cow::Owned(img.resize_exact(target.width, target.height, RESIZE_FILTER))
    }
}

/// Lossless PNG encoding for transmission
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    rgba.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ThumbnailError::EncodeFailure(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer)
}

fn open_source(path: &Path) -> Result<BufReader<File>> {
    if !path.is_file() {
        return Err(ThumbnailError::NotFound(path.display().to_string()));
    }
    let file = File::open(path).map_err(|e| {
        log::debug!("Cannot open {}: {}", path.display(), e);
        ThumbnailError::NotFound(path.display().to_string())
    })?;
    Ok(BufReader::new(file))
}

fn reader_for(path: &Path) -> Result<ImageReader<BufReader<File>>> {
    ImageReader::new(open_source(path)?)
        .with_guessed_format()
        .map_err(|e| ThumbnailError::DecodeFailure(format!("{}: {}", path.display(), e)))
}

/// Decode the file at `path` into a pixel buffer
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let reader = reader_for(path)?;
    if reader.format().is_none() {
        return Err(ThumbnailError::DecodeFailure(format!(
            "{}: unrecognized image data",
            path.display()
        )));
    }
    reader.decode().map_err(ThumbnailError::from)
}

/// Read format and dimensions from the header only
pub fn read_metadata(path: &Path) -> Result<ImageMetadata> {
    let size_bytes = std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|_| ThumbnailError::NotFound(path.display().to_string()))?;

    let reader = reader_for(path)?;
    let format = reader.format().ok_or_else(|| {
        ThumbnailError::DecodeFailure(format!("{}: unrecognized image data", path.display()))
    })?;
    let (width, height) = reader.into_dimensions().map_err(ThumbnailError::from)?;

    Ok(ImageMetadata {
        width,
        height,
        format,
        size_bytes,
    })
}

/// Lowercased extension if it is on the allow-list
pub fn supported_extension(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else if extension.is_empty() {
        Err(ThumbnailError::UnsupportedFormat(format!(
            "{} has no file extension",
            path.display()
        )))
    } else {
        Err(ThumbnailError::UnsupportedFormat(extension))
    }
}

/// Existence, extension allow-list, then a header-only decode
pub fn check_source(path: &Path) -> Result<ImageMetadata> {
    if !path.is_file() {
        return Err(ThumbnailError::NotFound(path.display().to_string()));
    }
    supported_extension(path)?;
    read_metadata(path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size_bytes: u64,
}

impl ImageMetadata {
    pub fn format_name(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::WebP => "WebP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Bmp => "BMP",
            _ => "Unknown",
        }
    }

    pub fn dimensions_str(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])))
    }

    #[test]
    fn test_pixel_box_per_protocol() {
        assert_eq!(
            pixel_box(GraphicsProtocol::Kitty, 40, 20),
            PixelBox { width: 400, height: 400 }
        );
        assert_eq!(
            pixel_box(GraphicsProtocol::Sixel, 8, 4),
            PixelBox { width: 80, height: 80 }
        );
        assert_eq!(
            pixel_box(GraphicsProtocol::HalfBlock, 40, 20),
            PixelBox { width: 40, height: 40 }
        );
        assert_eq!(
            pixel_box(GraphicsProtocol::Ascii, 40, 20),
            PixelBox { width: 40, height: 20 }
        );
    }

    #[test]
    fn test_aspect_ratio_calculation() {
        let target = PixelBox { width: 640, height: 384 };
        let (w, h) = target_dimensions(1280, 800, target, false).unwrap();

        let original_ratio = 1280.0 / 800.0;
        let target_ratio = w as f64 / h as f64;
        assert!((original_ratio - target_ratio).abs() < 0.01);
        assert!(w <= 640);
        assert!(h <= 384);
    }

    #[test]
    fn test_no_upscale_when_disallowed() {
        let target = PixelBox { width: 400, height: 400 };
        assert_eq!(target_dimensions(50, 30, target, false), None);
        assert_eq!(target_dimensions(50, 50, target, true), Some((400, 400)));
    }

    #[test]
    fn test_fit_within_scales_up_and_down() {
        let target = PixelBox { width: 100, height: 50 };
        let square = solid(10, 10);
        let small = fit_within(&square, target);
        assert_eq!((small.width(), small.height()), (50, 50));

        let banner = solid(1000, 100);
        let large = fit_within(&banner, target);
        assert_eq!((large.width(), large.height()), (100, 10));
    }

    #[test]
    fn test_empty_target_is_left_alone() {
        let flat = PixelBox { width: 10, height: 0 };
        let thin = PixelBox { width: 0, height: 10 };
        assert_eq!(target_dimensions(50, 50, flat, true), None);
        assert_eq!(target_dimensions(50, 50, thin, false), None);

        let img = solid(8, 8);
        assert!(matches!(fit_within(&img, flat), Cow::Borrowed(_)));
    }

    #[test]
    fn test_downscale_only_keeps_small_images() {
        let target = PixelBox { width: 100, height: 100 };
        let img = solid(16, 8);
        assert!(matches!(downscale_only(&img, target), Cow::Borrowed(_)));

        let big = solid(400, 200);
        let scaled = downscale_only(&big, target);
        assert_eq!((scaled.width(), scaled.height()), (100, 50));
    }

    #[test]
    fn test_fill_exact() {
        let img = solid(3, 7);
        let filled = fill_exact(&img, PixelBox { width: 4, height: 8 });
        assert_eq!((filled.width(), filled.height()), (4, 8));
        assert!(matches!(fill_exact(&img, PixelBox { width: 3, height: 7 }), Cow::Borrowed(_)));
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&solid(4, 4)).unwrap();
        assert!(png.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
    }

    #[test]
    fn test_load_image_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.png");
        assert!(matches!(
            load_image(&missing),
            Err(ThumbnailError::NotFound(_))
        ));

        let garbage = temp_dir.path().join("garbage.png");
        std::fs::write(&garbage, b"this is not a png").unwrap();
        assert!(matches!(
            load_image(&garbage),
            Err(ThumbnailError::DecodeFailure(_))
        ));

        assert!(matches!(
            load_image(temp_dir.path()),
            Err(ThumbnailError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("meta.png");
        solid(12, 5).save(&path).unwrap();

        let metadata = read_metadata(&path).unwrap();
        assert_eq!(metadata.format_name(), "PNG");
        assert_eq!(metadata.dimensions_str(), "12x5");
        assert!(metadata.size_bytes > 0);
    }

    #[test]
    fn test_supported_extension() {
        assert_eq!(supported_extension(Path::new("a/b.PNG")).unwrap(), "png");
        assert_eq!(supported_extension(Path::new("photo.TIF")).unwrap(), "tif");
        assert_eq!(
            supported_extension(Path::new("icon.svg")),
            Err(ThumbnailError::UnsupportedFormat("svg".to_string()))
        );
        assert!(supported_extension(Path::new("README")).is_err());
    }
}
