//! Image content sniffing.
//!
//! Servers routinely mislabel favicons (`application/octet-stream` for
//! `.ico`, `text/plain` for SVG), so the magic bytes are the authority on
//! what a body actually is.

/// Image container formats recognised by their leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Portable Network Graphics.
    Png,
    /// JPEG / JFIF.
    Jpeg,
    /// GIF87a / GIF89a.
    Gif,
    /// RIFF WebP.
    WebP,
    /// Windows icon.
    Ico,
    /// Windows bitmap.
    Bmp,
    /// SVG document.
    Svg,
}

impl ImageKind {
    /// Identify the format of `bytes`, if it is one we know.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::WebP),
            [0x00, 0x00, 0x01, 0x00, ..] => Some(Self::Ico),
            [b'B', b'M', ..] => Some(Self::Bmp),
            _ if looks_like_svg(bytes) => Some(Self::Svg),
            _ => None,
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::WebP => "webp",
            Self::Ico => "ico",
            Self::Bmp => "bmp",
            Self::Svg => "svg",
        }
    }

    /// Map a file extension back to a kind (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            "ico" => Some(Self::Ico),
            "bmp" => Some(Self::Bmp),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// The MIME type served for this kind.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Ico => "image/x-icon",
            Self::Bmp => "image/bmp",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// An SVG document may open with a BOM, whitespace, an XML declaration,
/// comments or a doctype before the root element.
fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with('<') && text.to_ascii_lowercase().contains("<svg")
}

/// Decide whether a response body is an image, given the reported media
/// type. A non-image media type is only overridden when the bytes sniff as
/// a known format; HTML error pages never pass.
pub fn accept_image(media_type: Option<&str>, bytes: &[u8]) -> Option<ImageKind> {
    if bytes.is_empty() {
        return None;
    }
    let sniffed = ImageKind::sniff(bytes);
    match media_type {
        Some("text/html") => None,
        Some(mt) if mt.starts_with("image/") => {
            sniffed.or_else(|| mt.strip_prefix("image/").and_then(kind_from_subtype))
        }
        _ => sniffed,
    }
}

fn kind_from_subtype(subtype: &str) -> Option<ImageKind> {
    match subtype {
        "x-icon" | "vnd.microsoft.icon" | "ico" => Some(ImageKind::Ico),
        "svg+xml" => Some(ImageKind::Svg),
        other => ImageKind::from_extension(other),
    }
}
