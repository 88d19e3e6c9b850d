// ABOUTME: Terminal graphics protocols and the renderer interface they share
// ABOUTME: Dispatches over the closed set of Kitty, Sixel, half-block and ASCII renderers

use crate::config::RenderConfig;
use crate::error::{Result, ThumbnailError};
use image::DynamicImage;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod ascii;
pub mod detection;
pub mod halfblock;
pub mod kitty;
pub mod query;
pub mod scaling;
pub mod sixel;

pub use ascii::AsciiRenderer;
pub use detection::{CapabilityDetector, TerminalEnv};
pub use halfblock::HalfBlockRenderer;
pub use kitty::KittyRenderer;
pub use scaling::{ImageMetadata, PixelBox};
pub use sixel::SixelRenderer;

/// Graphics protocols, declared in descending rendering fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsProtocol {
    /// Kitty graphics protocol: base64 PNG over APC sequences
    Kitty,
    /// DEC Sixel: palette raster bands
    Sixel,
    /// Unicode upper-half blocks with 24-bit colors
    #[serde(alias = "unicode", alias = "mosaic")]
    HalfBlock,
    /// Plain text art
    #[serde(alias = "text")]
    Ascii,
}

static PROTOCOL_ALIASES: Lazy<HashMap<&'static str, GraphicsProtocol>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("kitty", GraphicsProtocol::Kitty);
    m.insert("sixel", GraphicsProtocol::Sixel);
    m.insert("halfblock", GraphicsProtocol::HalfBlock);
    m.insert("half-block", GraphicsProtocol::HalfBlock);
    m.insert("unicode", GraphicsProtocol::HalfBlock);
    m.insert("mosaic", GraphicsProtocol::HalfBlock);
    m.insert("ascii", GraphicsProtocol::Ascii);
    m.insert("text", GraphicsProtocol::Ascii);
    m
});

impl GraphicsProtocol {
    /// All protocols, highest fidelity first
    pub const ALL: [GraphicsProtocol; 4] = [
        GraphicsProtocol::Kitty,
        GraphicsProtocol::Sixel,
        GraphicsProtocol::HalfBlock,
        GraphicsProtocol::Ascii,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GraphicsProtocol::Kitty => "kitty",
            GraphicsProtocol::Sixel => "sixel",
            GraphicsProtocol::HalfBlock => "halfblock",
            GraphicsProtocol::Ascii => "ascii",
        }
    }

    /// Whether output embeds raw control sequences rather than printable text
    pub fn is_pixel_protocol(&self) -> bool {
        matches!(self, GraphicsProtocol::Kitty | GraphicsProtocol::Sixel)
    }
}

impl fmt::Display for GraphicsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GraphicsProtocol {
    type Err = ThumbnailError;

    fn from_str(s: &str) -> Result<Self> {
        PROTOCOL_ALIASES
            .get(s.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| ThumbnailError::UnsupportedProtocol(s.to_string()))
    }
}

/// Capability set every renderer provides.
pub trait ImageRenderer {
    fn protocol(&self) -> GraphicsProtocol;

    /// Render an already decoded image
    fn render_image(&self, img: &DynamicImage) -> Result<String>;

    /// Decode and render the image at `path`
    fn render_file(&self, path: &Path) -> Result<String> {
        let img = scaling::load_image(path)?;
        self.render_image(&img)
    }

    /// Output size in character cells as (columns, rows)
    fn dimensions(&self) -> (u32, u32);

    /// Zero values are ignored and leave the previous size in place
    fn set_dimensions(&mut self, width: u32, height: u32);

    /// No-op for protocols that are always full color
    fn set_colored(&mut self, _colored: bool) {}
}

/// The closed set of renderers, one per protocol.
#[derive(Debug, Clone)]
pub enum Renderer {
    Kitty(KittyRenderer),
    Sixel(SixelRenderer),
    HalfBlock(HalfBlockRenderer),
    Ascii(AsciiRenderer),
}

impl Renderer {
    /// Build the renderer for the configured protocol
    pub fn for_config(config: &RenderConfig) -> Self {
        let (width, height) = (config.width(), config.height());
        match config.protocol {
            GraphicsProtocol::Kitty => Renderer::Kitty(KittyRenderer::new(width, height)),
            GraphicsProtocol::Sixel => Renderer::Sixel(SixelRenderer::new(width, height)),
            GraphicsProtocol::HalfBlock => Renderer::HalfBlock(HalfBlockRenderer::new(
                width,
                height,
                config.colored,
            )),
            GraphicsProtocol::Ascii => {
                Renderer::Ascii(AsciiRenderer::new(width, height, config.colored))
            }
        }
    }

    /// Toggle Sixel dithering; other renderers are returned unchanged
    pub fn with_sixel_dithering(self, dithering: bool) -> Self {
        match self {
            Renderer::Sixel(sixel) => Renderer::Sixel(sixel.with_dithering(dithering)),
            other => other,
        }
    }

    fn as_dyn(&self) -> &dyn ImageRenderer {
        match self {
            Renderer::Kitty(r) => r,
            Renderer::Sixel(r) => r,
            Renderer::HalfBlock(r) => r,
            Renderer::Ascii(r) => r,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn ImageRenderer {
        match self {
            Renderer::Kitty(r) => r,
            Renderer::Sixel(r) => r,
            Renderer::HalfBlock(r) => r,
            Renderer::Ascii(r) => r,
        }
    }
}

impl ImageRenderer for Renderer {
    fn protocol(&self) -> GraphicsProtocol {
        self.as_dyn().protocol()
    }

    fn render_image(&self, img: &DynamicImage) -> Result<String> {
        self.as_dyn().render_image(img)
    }

    fn render_file(&self, path: &Path) -> Result<String> {
        self.as_dyn().render_file(path)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.as_dyn().dimensions()
    }

    fn set_dimensions(&mut self, width: u32, height: u32) {
        self.as_dyn_mut().set_dimensions(width, height)
    }

    fn set_colored(&mut self, colored: bool) {
        self.as_dyn_mut().set_colored(colored)
    }
}

/// Shared cell-size bookkeeping for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl CellSize {
    pub fn new(width: u32, height: u32) -> Self {
        let mut size = Self {
            width: crate::constants::defaults::WIDTH,
            height: crate::constants::defaults::HEIGHT,
        };
        size.update(width, height);
        size
    }

    pub fn update(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_order_is_fidelity_order() {
        assert!(GraphicsProtocol::Kitty < GraphicsProtocol::Sixel);
        assert!(GraphicsProtocol::Sixel < GraphicsProtocol::HalfBlock);
        assert!(GraphicsProtocol::HalfBlock < GraphicsProtocol::Ascii);
        let mut sorted = GraphicsProtocol::ALL;
        sorted.sort();
        assert_eq!(sorted, GraphicsProtocol::ALL);
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("kitty".parse::<GraphicsProtocol>().unwrap(), GraphicsProtocol::Kitty);
        assert_eq!(" Sixel ".parse::<GraphicsProtocol>().unwrap(), GraphicsProtocol::Sixel);
        assert_eq!("unicode".parse::<GraphicsProtocol>().unwrap(), GraphicsProtocol::HalfBlock);
        assert_eq!("TEXT".parse::<GraphicsProtocol>().unwrap(), GraphicsProtocol::Ascii);
        assert_eq!(
            "vt340".parse::<GraphicsProtocol>(),
            Err(ThumbnailError::UnsupportedProtocol("vt340".to_string()))
        );
    }

    #[test]
    fn test_protocol_display_round_trips() {
        for protocol in GraphicsProtocol::ALL {
            assert_eq!(protocol.to_string().parse::<GraphicsProtocol>().unwrap(), protocol);
        }
    }

    #[test]
    fn test_protocol_serializes_as_lowercase_name() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Entry {
            protocol: GraphicsProtocol,
        }

        let entry = Entry {
            protocol: GraphicsProtocol::HalfBlock,
        };
        let text = toml::to_string(&entry).unwrap();
        assert_eq!(text.trim(), r#"protocol = "halfblock""#);
        assert_eq!(toml::from_str::<Entry>(&text).unwrap(), entry);

        let alias: Entry = toml::from_str(r#"protocol = "mosaic""#).unwrap();
        assert_eq!(alias.protocol, GraphicsProtocol::HalfBlock);
    }

    #[test]
    fn test_pixel_protocols() {
        let pixel: Vec<_> = GraphicsProtocol::ALL
            .into_iter()
            .filter(GraphicsProtocol::is_pixel_protocol)
            .collect();
        assert_eq!(pixel, vec![GraphicsProtocol::Kitty, GraphicsProtocol::Sixel]);
    }

    #[test]
    fn test_renderer_for_config_matches_protocol() {
        for protocol in GraphicsProtocol::ALL {
            let config = RenderConfig::new(12, 6, protocol, true);
            let renderer = Renderer::for_config(&config);
            assert_eq!(renderer.protocol(), protocol);
            assert_eq!(renderer.dimensions(), (12, 6));
        }
    }

    #[test]
    fn test_renderer_ignores_zero_dimensions() {
        let config = RenderConfig::new(12, 6, GraphicsProtocol::HalfBlock, true);
        let mut renderer = Renderer::for_config(&config);
        renderer.set_dimensions(0, 10);
        assert_eq!(renderer.dimensions(), (12, 6));
        renderer.set_dimensions(30, 15);
        assert_eq!(renderer.dimensions(), (30, 15));
    }

    #[test]
    fn test_cell_size_defaults_on_zero() {
        let size = CellSize::new(0, 0);
        assert_eq!(size.width, crate::constants::defaults::WIDTH);
        assert_eq!(size.height, crate::constants::defaults::HEIGHT);
    }
}
