// ABOUTME: Error types for thumbnail rendering with user-facing hints
// ABOUTME: Maps image decoding and encoding failures onto a small closed taxonomy

use image::ImageError;
use thiserror::Error;

/// Errors are `Clone` so concurrent waiters on the same render can all receive the result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThumbnailError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("No renderer for protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailure(String),
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;

impl ThumbnailError {
    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            ThumbnailError::NotFound(_) => Some("The media file may not have finished downloading"),
            ThumbnailError::UnsupportedFormat(_) => {
                Some("Supported formats: png, jpg, jpeg, gif, webp, bmp, tiff")
            }
            ThumbnailError::UnsupportedProtocol(_) => {
                Some("Valid protocols: kitty, sixel, halfblock, ascii")
            }
            _ => None,
        }
    }

    /// Short text a UI can show in place of the thumbnail
    pub fn placeholder(&self) -> &'static str {
        match self {
            ThumbnailError::NotFound(_) => "[missing]",
            ThumbnailError::UnsupportedFormat(_) | ThumbnailError::UnsupportedProtocol(_) => {
                "[unsupported]"
            }
            ThumbnailError::DecodeFailure(_) | ThumbnailError::EncodeFailure(_) => "[broken image]",
        }
    }
}

impl From<ImageError> for ThumbnailError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Encoding(_) | ImageError::Parameter(_) => {
                ThumbnailError::EncodeFailure(err.to_string())
            }
            _ => ThumbnailError::DecodeFailure(err.to_string()),
        }
    }
}
