// ABOUTME: Centralized constants for terminal thumbnail rendering
// ABOUTME: Contains chunk sizes, cell pixel estimates, thresholds, timeouts, and env names

/// Kitty graphics protocol framing
pub mod kitty {
    /// Maximum base64 payload bytes per escape sequence (a multiple of 4)
    pub const CHUNK_SIZE: usize = 4096;

    /// Format code for PNG payloads
    pub const FORMAT_PNG: u32 = 100;
}

/// Approximate pixel size of a single terminal cell
pub mod cells {
    pub const CELL_WIDTH_PX: u32 = 10;
    pub const CELL_HEIGHT_PX: u32 = 20;
}

/// Half-block mosaic glyphs and thresholds
pub mod mosaic {
    /// Luminance at or above this value counts as "bright"
    pub const LUMINANCE_THRESHOLD: f32 = 128.0;

    pub const UPPER_HALF: char = '▀';
    pub const LOWER_HALF: char = '▄';
    pub const FULL_BLOCK: char = '█';
    pub const EMPTY: char = ' ';

    pub const RESET: &str = "\x1b[0m";
}

/// Text-art sizing
pub mod ascii {
    /// Source pixel rows artem folds into one text row when each column is one pixel wide
    pub const ROW_PIXELS: u32 = 2;
}

/// Render defaults
pub mod defaults {
    pub const WIDTH: u32 = 40;
    pub const HEIGHT: u32 = 20;
    pub const CACHE_CAPACITY: usize = 100;
}

/// Timeout configurations
pub mod timeouts {
    use std::time::Duration;

    /// How long the terminal query probe waits for a reply
    pub const QUERY_TIMEOUT: Duration = Duration::from_millis(200);
}

/// Environment variable names
pub mod env {
    /// Forces a protocol, bypassing detection
    pub const FORCE_PROTOCOL: &str = "TERMTHUMB_PROTOCOL";

    /// Overrides the thumbnail cache capacity
    pub const CACHE_CAPACITY: &str = "TERMTHUMB_CACHE_CAPACITY";
}

/// File extensions accepted by validation (lowercase, without the dot)
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff", "tif"];
