// ABOUTME: Library exports for terminal thumbnail rendering
// ABOUTME: Capability detection, four protocol renderers, and a caching thumbnail generator

pub mod config;
pub mod constants;
pub mod error;
pub mod protocols;
pub mod thumbnail;

pub use config::{EvictionKind, RenderConfig, ThumbnailSettings};
pub use error::{Result, ThumbnailError};
pub use protocols::{
    AsciiRenderer, CapabilityDetector, GraphicsProtocol, HalfBlockRenderer, ImageRenderer,
    KittyRenderer, Renderer, SixelRenderer, TerminalEnv,
};
pub use thumbnail::{
    CacheStats, ClearOnOverflow, EvictionPolicy, LeastRecentlyUsed, ThumbnailCache,
    ThumbnailGenerator,
};
