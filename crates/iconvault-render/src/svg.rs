//! SVG rasterization.
//!
//! Transforms operate on pixels, so vector icons are rendered to a bitmap
//! first. [`SvgImage`] parses an SVG document once and renders it at any
//! size; [`rasterize`] is the one-shot form the decoder uses.

use std::sync::Arc;

use image::RgbaImage;
use resvg::tiny_skia;
use resvg::usvg;

use crate::error::{RenderError, RenderResult};

/// A parsed SVG document that can be rendered at any resolution.
#[derive(Clone)]
pub struct SvgImage {
    tree: Arc<usvg::Tree>,
    natural_width: f32,
    natural_height: f32,
}

impl SvgImage {
    /// Parse an SVG (or gzip-compressed SVGZ) document.
    pub fn from_bytes(data: &[u8]) -> RenderResult<Self> {
        let options = usvg::Options::default();
        let tree = usvg::Tree::from_data(data, &options)
            .map_err(|e| RenderError::Decode(format!("Failed to parse SVG: {e}")))?;

        let size = tree.size();
        Ok(Self {
            natural_width: size.width(),
            natural_height: size.height(),
            tree: Arc::new(tree),
        })
    }

    /// The size declared by the document's `width`/`height` or `viewBox`.
    pub fn natural_size(&self) -> (f32, f32) {
        (self.natural_width, self.natural_height)
    }

    /// Render into a straight-alpha RGBA bitmap of exactly `width` x `height`.
    pub fn render(&self, width: u32, height: u32) -> RenderResult<RgbaImage> {
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or(RenderError::InvalidDimensions { width, height })?;

        let sx = width as f32 / self.natural_width;
        let sy = height as f32 / self.natural_height;
        resvg::render(
            &self.tree,
            tiny_skia::Transform::from_scale(sx, sy),
            &mut pixmap.as_mut(),
        );

        // tiny-skia stores premultiplied RGBA
        let mut data = pixmap.take();
        for px in data.chunks_exact_mut(4) {
            let a = px[3];
            if a == 0 {
                px.copy_from_slice(&[0, 0, 0, 0]);
            } else if a < 255 {
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
                }
            }
        }

        RgbaImage::from_raw(width, height, data)
            .ok_or(RenderError::InvalidDimensions { width, height })
    }

    /// Render so that the longer edge is `max_edge` pixels, keeping the
    /// aspect ratio.
    pub fn render_fit(&self, max_edge: u32) -> RenderResult<RgbaImage> {
        let (w, h) = self.natural_size();
        if !(w > 0.0 && h > 0.0) {
            return Err(RenderError::InvalidDimensions {
                width: w as u32,
                height: h as u32,
            });
        }
        let scale = max_edge as f32 / w.max(h);
        let width = ((w * scale).round() as u32).max(1);
        let height = ((h * scale).round() as u32).max(1);
        self.render(width, height)
    }
}

impl std::fmt::Debug for SvgImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgImage")
            .field("natural_width", &self.natural_width)
            .field("natural_height", &self.natural_height)
            .finish()
    }
}

/// Parse and render an SVG document with its longer edge at `max_edge`.
pub fn rasterize(data: &[u8], max_edge: u32) -> RenderResult<RgbaImage> {
    SvgImage::from_bytes(data)?.render_fit(max_edge)
}

/// Cheap check for documents worth handing to the SVG parser.
pub(crate) fn looks_like_markup(data: &[u8]) -> bool {
    // SVGZ
    if data.starts_with(&[0x1f, 0x8b]) {
        return true;
    }
    let head = &data[..data.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with('<') && text.to_ascii_lowercase().contains("<svg")
}
