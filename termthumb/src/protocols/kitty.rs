// ABOUTME: Kitty terminal graphics protocol renderer
// ABOUTME: Handles PNG encoding, base64 chunking, tagged images and deletion sequences

use super::scaling::{self, pixel_box};
use super::{CellSize, GraphicsProtocol, ImageRenderer};
use crate::constants::kitty::{CHUNK_SIZE, FORMAT_PNG};
use crate::error::{Result, ThumbnailError};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::DynamicImage;

#[derive(Debug, Clone)]
pub struct KittyRenderer {
    size: CellSize,
}

impl KittyRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: CellSize::new(width, height),
        }
    }

    /// Render with an image id so the terminal keeps the upload for reuse
    pub fn render_image_with_id(&self, img: &DynamicImage, id: u32) -> Result<String> {
        let png = self.encode(img)?;
        encode_transmission(&png, Some(id))
    }

    fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let target = pixel_box(GraphicsProtocol::Kitty, self.size.width, self.size.height);
        let scaled = scaling::fit_within(img, target);
        scaling::encode_png(&scaled)
    }
}

impl ImageRenderer for KittyRenderer {
    fn protocol(&self) -> GraphicsProtocol {
        GraphicsProtocol::Kitty
    }

    fn render_image(&self, img: &DynamicImage) -> Result<String> {
        let png = self.encode(img)?;
        encode_transmission(&png, None)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    fn set_dimensions(&mut self, width: u32, height: u32) {
        self.size.update(width, height);
    }
}

/// Wrap PNG bytes in direct-transmission APC sequences, one per base64 chunk.
///
/// The first chunk carries the action and format keys; `m=1` marks that more
/// chunks follow and the final chunk carries `m=0`.
pub fn encode_transmission(png: &[u8], id: Option<u32>) -> Result<String> {
    let base64_data = STANDARD.encode(png);

    let chunks: std::result::Result<Vec<&str>, _> = base64_data
        .as_bytes()
        .chunks(CHUNK_SIZE)
        .map(std::str::from_utf8)
        .collect();
    let chunks = chunks.map_err(|e| {
        ThumbnailError::EncodeFailure(format!("Failed to convert base64 chunk to UTF-8: {}", e))
    })?;

    if chunks.is_empty() {
        return Err(ThumbnailError::EncodeFailure(
            "Nothing to transmit".to_string(),
        ));
    }

    let mut output = String::with_capacity(base64_data.len() + chunks.len() * 32);

    for (i, chunk) in chunks.iter().enumerate() {
        let is_last = i == chunks.len() - 1;
        let m_value = if is_last { 0 } else { 1 };

        if i == 0 {
            let id_keys = id.map(|id| format!(",i={},q=2", id)).unwrap_or_default();
            output.push_str(&format!(
                "\x1b_Ga=T,f={},t=d{},m={};{}\x1b\\",
                FORMAT_PNG, id_keys, m_value, chunk
            ));
        } else {
            output.push_str(&format!("\x1b_Gm={};{}\x1b\\", m_value, chunk));
        }
    }

    Ok(output)
}

/// Delete a previously tagged image and free its data
pub fn delete_image(id: u32) -> String {
    format!("\x1b_Ga=d,d=I,i={}\x1b\\", id)
}

/// Delete every image the terminal is displaying
pub fn delete_all() -> String {
    "\x1b_Ga=d,d=A\x1b\\".to_string()
}
