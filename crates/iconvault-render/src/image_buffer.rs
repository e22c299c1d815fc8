//! CPU-side icon buffer.
//!
//! [`IconImage`] wraps a straight-alpha RGBA bitmap decoded from whatever a
//! site served: PNG, JPEG, GIF, WebP, BMP, ICO or SVG. Every derived variant
//! is encoded back out as PNG.

use std::io::Cursor;

use image::{DynamicImage, ImageError, ImageFormat, RgbaImage};

use crate::error::{RenderError, RenderResult};
use crate::svg;

/// Edge length vector icons are rasterized at when no size is given.
pub const DEFAULT_SVG_RASTER_SIZE: u32 = 256;

/// A decoded icon, always held as 8-bit RGBA.
#[derive(Clone, Debug)]
pub struct IconImage {
    inner: RgbaImage,
}

impl IconImage {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// Decode icon bytes, rasterizing SVG at [`DEFAULT_SVG_RASTER_SIZE`].
    pub fn decode(bytes: &[u8]) -> RenderResult<Self> {
        Self::decode_with_svg_size(bytes, DEFAULT_SVG_RASTER_SIZE)
    }

    /// Decode icon bytes, rasterizing SVG so its longer edge is `svg_size`.
    pub fn decode_with_svg_size(bytes: &[u8], svg_size: u32) -> RenderResult<Self> {
        if bytes.is_empty() {
            return Err(RenderError::UnsupportedFormat("empty input".to_string()));
        }

        let rgba = if svg::looks_like_markup(bytes) {
            let rgba = svg::rasterize(bytes, svg_size.max(1))?;
            tracing::debug!(
                target: "iconvault_render::decode",
                width = rgba.width(),
                height = rgba.height(),
                "rasterized SVG"
            );
            rgba
        } else {
            image::load_from_memory(bytes)
                .map_err(|e| match e {
                    ImageError::Unsupported(inner) => {
                        RenderError::UnsupportedFormat(inner.to_string())
                    }
                    other => RenderError::Decode(other.to_string()),
                })?
                .to_rgba8()
        };

        Self::from_rgba_image(rgba)
    }

    /// Wrap an existing bitmap. Empty bitmaps are rejected.
    pub fn from_rgba_image(inner: RgbaImage) -> RenderResult<Self> {
        let (width, height) = inner.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self { inner })
    }

    /// Build from raw RGBA bytes in row-major order.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> RenderResult<Self> {
        let rgba = RgbaImage::from_raw(width, height, data)
            .ok_or(RenderError::InvalidDimensions { width, height })?;
        Self::from_rgba_image(rgba)
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// The pixel at `(x, y)` as `[r, g, b, a]`, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.inner.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.inner
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.inner
    }

    // ========================================================================
    // PIXEL OPERATIONS
    // ========================================================================

    /// Produce a new image by mapping every `[r, g, b, a]` pixel.
    #[must_use]
    pub fn map_pixels<F>(&self, mut f: F) -> Self
    where
        F: FnMut([u8; 4]) -> [u8; 4],
    {
        let mut rgba = self.inner.clone();
        for pixel in rgba.pixels_mut() {
            pixel.0 = f(pixel.0);
        }
        Self { inner: rgba }
    }

    // ========================================================================
    // ENCODING
    // ========================================================================

    /// Encode as PNG. The same pixels always produce the same bytes.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.inner.clone())
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| RenderError::Encode(format!("Failed to encode PNG: {e}")))?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> IconImage {
        IconImage::from_rgba_image(RgbaImage::from_pixel(width, height, image::Rgba(px))).unwrap()
    }

    #[test]
    fn test_png_roundtrip_preserves_pixels() {
        let img = solid(4, 3, [10, 20, 30, 200]);
        let png = img.to_png().unwrap();
        assert!(png.starts_with(b"\x89PNG"));

        let decoded = IconImage::decode(&png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.pixel(2, 1), Some([10, 20, 30, 200]));
    }

    #[test]
    fn test_png_encoding_is_deterministic() {
        let img = solid(8, 8, [1, 2, 3, 4]);
        assert_eq!(img.to_png().unwrap(), img.to_png().unwrap());
    }

    #[test]
    fn test_decode_svg() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16">
            <rect width="16" height="16" fill="black"/></svg>"#;
        let img = IconImage::decode_with_svg_size(svg, 64).unwrap();
        assert_eq!(img.dimensions(), (64, 64));
        assert_eq!(img.pixel(32, 32), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_decode_garbage_is_unsupported() {
        let err = IconImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_decode_empty_is_unsupported() {
        assert!(matches!(
            IconImage::decode(b""),
            Err(RenderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let png = solid(16, 16, [255, 0, 0, 255]).to_png().unwrap();
        let err = IconImage::decode(&png[..png.len() / 2]).unwrap_err();
        assert!(matches!(err, RenderError::Decode(_)));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            IconImage::from_rgba(Vec::new(), 0, 0),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_map_pixels() {
        let img = solid(2, 2, [100, 100, 100, 255]);
        let mapped = img.map_pixels(|[r, g, b, a]| [r / 2, g, b, a]);
        assert_eq!(mapped.pixel(0, 0), Some([50, 100, 100, 255]));
        assert_eq!(img.pixel(0, 0), Some([100, 100, 100, 255]));
    }
}
