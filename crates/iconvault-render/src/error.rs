//! Error types for the render crate.

use thiserror::Error;

/// Errors that can occur while decoding, transforming or encoding icons.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The bytes are an image format we do not decode (or not an image at all).
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The bytes claim a supported format but could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The decoded image has no pixels.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A theme color name that is neither in the palette nor a hex color.
    #[error("unknown theme color '{0}'")]
    UnknownColor(String),

    /// PNG encoding failed.
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
