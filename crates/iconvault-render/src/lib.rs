//! Icon decoding and color transforms for iconvault.
//!
//! This crate turns fetched icon bytes into pixels and back. It handles the
//! raster formats sites commonly serve (PNG, JPEG, GIF, WebP, BMP, ICO) and
//! rasterizes SVG, then applies the theme, grayscale and invert transforms.
//! All output is PNG.
//!
//! # Decoding and transforming
//!
//! ```no_run
//! use iconvault_render::{IconImage, Transform, TransformOutput};
//!
//! # fn example(bytes: &[u8]) -> iconvault_render::RenderResult<()> {
//! let icon = IconImage::decode(bytes)?;
//!
//! if let TransformOutput::Single(image) = Transform::theme("Slate")?.apply(&icon) {
//!     std::fs::write("slate.png", image.to_png()?).ok();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Grayscale
//!
//! [`Transform::Grayscale`] always yields a pair: a black foreground for
//! light themes and a white one for dark themes. See [`grayscale_pair`].

mod error;
mod image_buffer;
mod palette;
pub mod svg;
mod transform;

pub use error::{RenderError, RenderResult};
pub use image_buffer::{DEFAULT_SVG_RASTER_SIZE, IconImage};
pub use palette::{THEME_COLORS, ThemeColor};
pub use svg::SvgImage;
pub use transform::{
    GrayscalePair, Transform, TransformOutput, grayscale_pair, invert, recolor,
};

// Re-export image so callers can name the pixel types we hand out.
pub use image;
