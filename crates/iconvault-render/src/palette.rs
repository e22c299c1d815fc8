//! Theme color table.
//!
//! These are the accent colors the dashboard theme exposes. A theme recolor
//! is requested by name, and the canonical name becomes part of the derived
//! file name (`_themed_Slate`), so lookups normalize case.

/// A named theme color.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThemeColor {
    name: String,
    rgb: [u8; 3],
}

/// Built-in theme colors, in display order.
pub const THEME_COLORS: &[(&str, [u8; 3])] = &[
    ("Slate", [0x64, 0x74, 0x8b]),
    ("Gray", [0x6b, 0x72, 0x80]),
    ("Zinc", [0x71, 0x71, 0x7a]),
    ("Neutral", [0x73, 0x73, 0x73]),
    ("Stone", [0x78, 0x71, 0x6c]),
    ("Red", [0xef, 0x44, 0x44]),
    ("Orange", [0xf9, 0x73, 0x16]),
    ("Amber", [0xf5, 0x9e, 0x0b]),
    ("Yellow", [0xea, 0xb3, 0x08]),
    ("Lime", [0x84, 0xcc, 0x16]),
    ("Green", [0x22, 0xc5, 0x5e]),
    ("Emerald", [0x10, 0xb9, 0x81]),
    ("Teal", [0x14, 0xb8, 0xa6]),
    ("Cyan", [0x06, 0xb6, 0xd4]),
    ("Sky", [0x0e, 0xa5, 0xe9]),
    ("Blue", [0x3b, 0x82, 0xf6]),
    ("Indigo", [0x63, 0x66, 0xf1]),
    ("Violet", [0x8b, 0x5c, 0xf6]),
    ("Purple", [0xa8, 0x55, 0xf7]),
    ("Fuchsia", [0xd9, 0x46, 0xef]),
    ("Pink", [0xec, 0x48, 0x99]),
    ("Rose", [0xf4, 0x3f, 0x5e]),
    ("White", [0xff, 0xff, 0xff]),
    ("Black", [0x00, 0x00, 0x00]),
];

impl ThemeColor {
    /// Look up a color by palette name (case-insensitive) or as a
    /// `#rrggbb` hex string. Hex colors are named by their lowercase digits.
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some((canonical, rgb)) = THEME_COLORS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        {
            return Some(Self {
                name: (*canonical).to_string(),
                rgb: *rgb,
            });
        }
        Self::from_hex(name)
    }

    /// Parse `#rrggbb` (the `#` is required so names stay unambiguous).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
        let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
        let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
        Some(Self {
            name: digits.to_ascii_lowercase(),
            rgb: [r, g, b],
        })
    }

    /// The canonical name, safe for use in a file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The RGB value.
    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }
}
