//! Color transforms applied to stored icons.
//!
//! Every transform is a pure function of the input pixels: the same icon and
//! the same [`Transform`] always produce byte-identical PNG output. Alpha is
//! preserved except by the grayscale pair, which rebuilds it from the
//! foreground mask.

use std::fmt;

use crate::error::{RenderError, RenderResult};
use crate::image_buffer::IconImage;
use crate::palette::ThemeColor;

/// Fraction of pixels that must be translucent before an icon is treated as
/// a shape on a transparent background.
const TRANSPARENT_SHARE: f64 = 0.10;

/// Alpha below which a pixel counts as translucent.
const TRANSPARENT_ALPHA: u8 = 128;

/// A requested transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    /// Paint every visible pixel with a theme color.
    Theme(ThemeColor),
    /// Produce the dark and light monochrome pair.
    Grayscale,
    /// Invert RGB.
    Invert,
}

impl Transform {
    /// Resolve a theme color name into a [`Transform::Theme`].
    pub fn theme(name: &str) -> RenderResult<Self> {
        ThemeColor::lookup(name)
            .map(Self::Theme)
            .ok_or_else(|| RenderError::UnknownColor(name.to_string()))
    }

    /// Apply to a decoded icon.
    pub fn apply(&self, image: &IconImage) -> TransformOutput {
        match self {
            Self::Theme(color) => TransformOutput::Single(recolor(image, color)),
            Self::Grayscale => {
                let pair = grayscale_pair(image);
                TransformOutput::Pair {
                    dark: pair.dark,
                    light: pair.light,
                }
            }
            Self::Invert => TransformOutput::Single(invert(image)),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Theme(color) => write!(f, "theme({})", color.name()),
            Self::Grayscale => f.write_str("grayscale"),
            Self::Invert => f.write_str("invert"),
        }
    }
}

/// Result of [`Transform::apply`].
#[derive(Clone, Debug)]
pub enum TransformOutput {
    Single(IconImage),
    Pair { dark: IconImage, light: IconImage },
}

/// Monochrome variants of one icon.
///
/// `dark` draws the foreground in black (for light backgrounds), `light`
/// draws it in white (for dark backgrounds).
#[derive(Clone, Debug)]
pub struct GrayscalePair {
    pub dark: IconImage,
    pub light: IconImage,
}

/// Replace RGB of every pixel with `color`, keeping alpha exactly.
pub fn recolor(image: &IconImage, color: &ThemeColor) -> IconImage {
    let [r, g, b] = color.rgb();
    image.map_pixels(|[_, _, _, a]| if a == 0 { [0, 0, 0, 0] } else { [r, g, b, a] })
}

/// Invert RGB, keeping alpha.
pub fn invert(image: &IconImage) -> IconImage {
    image.map_pixels(|[r, g, b, a]| [255 - r, 255 - g, 255 - b, a])
}

/// Build the black-on-transparent and white-on-transparent variants.
///
/// Icons that already carry transparency keep their silhouette. Opaque
/// icons are split at their mean luma; the smaller side is the foreground
/// and everything else becomes transparent.
pub fn grayscale_pair(image: &IconImage) -> GrayscalePair {
    let mask = foreground_mask(image);
    let paint = |ink: u8| {
        let mut i = 0;
        image.map_pixels(|_| {
            let alpha = mask[i];
            i += 1;
            if alpha == 0 { [0, 0, 0, 0] } else { [ink, ink, ink, alpha] }
        })
    };
    GrayscalePair {
        dark: paint(0),
        light: paint(255),
    }
}

#[inline]
fn luma([r, g, b, _]: [u8; 4]) -> u32 {
    (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000
}

/// Alpha of the foreground for every pixel, in row-major order.
fn foreground_mask(image: &IconImage) -> Vec<u8> {
    let pixels: Vec<[u8; 4]> = image.as_rgba().pixels().map(|p| p.0).collect();
    let silhouette = || pixels.iter().map(|p| p[3]).collect::<Vec<_>>();

    let translucent = pixels.iter().filter(|p| p[3] < TRANSPARENT_ALPHA).count();
    if translucent as f64 >= pixels.len() as f64 * TRANSPARENT_SHARE {
        return silhouette();
    }

    let total: u64 = pixels.iter().map(|&p| u64::from(luma(p))).sum();
    let mean = (total / pixels.len() as u64) as u32;

    let dark = pixels.iter().filter(|&&p| luma(p) <= mean).count();
    let light = pixels.len() - dark;
    // Ties go to the dark side.
    let foreground_is_dark = dark <= light;
    let foreground_count = if foreground_is_dark { dark } else { light };
    if foreground_count == 0 {
        return silhouette();
    }

    pixels
        .iter()
        .map(|&p| {
            let is_dark = luma(p) <= mean;
            if is_dark == foreground_is_dark { 255 } else { 0 }
        })
        .collect()
}
