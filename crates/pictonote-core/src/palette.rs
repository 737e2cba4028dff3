//! The fixed 16-swatch user colour palette.
//!
//! Each swatch serializes as its hex string (the value carried in
//! `UserContent::color` on the wire) and carries a foreground/background
//! contrast pair used when rendering the author tag.

use serde::{Deserialize, Serialize};

/// Serializable colour representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Parse `#rrggbb`. Anything else yields `None`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b, 255))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One of the 16 user colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Swatch {
    #[default]
    #[serde(rename = "#868f9e")]
    Slate,
    #[serde(rename = "#965454")]
    Brown,
    #[serde(rename = "#ff0000")]
    Red,
    #[serde(rename = "#ff8aeb")]
    Pink,
    #[serde(rename = "#ffa200")]
    Orange,
    #[serde(rename = "#f0ec00")]
    Yellow,
    #[serde(rename = "#bdff59")]
    Lime,
    #[serde(rename = "#00ff00")]
    Green,
    #[serde(rename = "#05a100")]
    Forest,
    #[serde(rename = "#00e6a1")]
    Teal,
    #[serde(rename = "#00d0ff")]
    Sky,
    #[serde(rename = "#0000ff")]
    Blue,
    #[serde(rename = "#00009e")]
    Navy,
    #[serde(rename = "#6900d1")]
    Violet,
    #[serde(rename = "#a502e0")]
    Purple,
    #[serde(rename = "#de0081")]
    Magenta,
}

impl Swatch {
    /// All swatches in picker order (4 columns, 4 rows).
    pub const ALL: [Swatch; 16] = [
        Swatch::Slate,
        Swatch::Brown,
        Swatch::Red,
        Swatch::Pink,
        Swatch::Orange,
        Swatch::Yellow,
        Swatch::Lime,
        Swatch::Green,
        Swatch::Forest,
        Swatch::Teal,
        Swatch::Sky,
        Swatch::Blue,
        Swatch::Navy,
        Swatch::Violet,
        Swatch::Purple,
        Swatch::Magenta,
    ];

    /// The wire value.
    pub fn hex(&self) -> &'static str {
        match self {
            Swatch::Slate => "#868f9e",
            Swatch::Brown => "#965454",
            Swatch::Red => "#ff0000",
            Swatch::Pink => "#ff8aeb",
            Swatch::Orange => "#ffa200",
            Swatch::Yellow => "#f0ec00",
            Swatch::Lime => "#bdff59",
            Swatch::Green => "#00ff00",
            Swatch::Forest => "#05a100",
            Swatch::Teal => "#00e6a1",
            Swatch::Sky => "#00d0ff",
            Swatch::Blue => "#0000ff",
            Swatch::Navy => "#00009e",
            Swatch::Violet => "#6900d1",
            Swatch::Purple => "#a502e0",
            Swatch::Magenta => "#de0081",
        }
    }

    /// Look up a swatch by its wire value (case-insensitive).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        Self::ALL
            .into_iter()
            .find(|swatch| swatch.hex().eq_ignore_ascii_case(hex))
    }

    /// `(foreground, background)` contrast pair for text drawn on this swatch.
    pub fn contrast(&self) -> (&'static str, &'static str) {
        match self {
            Swatch::Slate => ("#3d4147", "#b2bdd1"),
            Swatch::Brown => ("#5e3232", "#d68b8b"),
            Swatch::Red => ("#bd0000", "#ff8c8c"),
            Swatch::Pink => ("#d420b6", "#ff8aeb"),
            Swatch::Orange => ("#d18500", "#ffcd75"),
            Swatch::Yellow => ("#949200", "#fffd82"),
            Swatch::Lime => ("#84b33d", "#bdff59"),
            Swatch::Green => ("#009e00", "#9cff9c"),
            Swatch::Forest => ("#05a100", "#71fc6d"),
            Swatch::Teal => ("#00b57f", "#80ffd9"),
            Swatch::Sky => ("#00afd6", "#9eedff"),
            Swatch::Blue => ("#0000ff", "#9999ff"),
            Swatch::Navy => ("#00009e", "#7878ad"),
            Swatch::Violet => ("#6900d1", "#c49ded"),
            Swatch::Purple => ("#a502e0", "#cc99de"),
            Swatch::Magenta => ("#a3005f", "#eb7cbd"),
        }
    }

    pub fn rgba(&self) -> Rgba8 {
        Rgba8::from_hex(self.hex()).unwrap_or(Rgba8::black())
    }
}

impl std::fmt::Display for Swatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hex())
    }
}

impl std::str::FromStr for Swatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Swatch::from_hex(s).ok_or_else(|| format!("not a palette colour: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip_for_every_swatch() {
        for swatch in Swatch::ALL {
            assert_eq!(Swatch::from_hex(swatch.hex()), Some(swatch));
            assert_eq!(swatch.rgba().to_hex(), swatch.hex());
        }
    }

    #[test]
    fn test_serde_uses_hex_strings() {
        let json = serde_json::to_string(&Swatch::Sky).unwrap();
        assert_eq!(json, "\"#00d0ff\"");
        let parsed: Swatch = serde_json::from_str("\"#de0081\"").unwrap();
        assert_eq!(parsed, Swatch::Magenta);
        assert!(serde_json::from_str::<Swatch>("\"#123456\"").is_err());
    }

    #[test]
    fn test_contrast_pairs() {
        assert_eq!(Swatch::Forest.contrast(), ("#05a100", "#71fc6d"));
        assert_eq!(Swatch::Slate.contrast(), ("#3d4147", "#b2bdd1"));
        assert_eq!(Swatch::Magenta.contrast(), ("#a3005f", "#eb7cbd"));
        for swatch in Swatch::ALL {
            let (fg, bg) = swatch.contrast();
            assert!(Rgba8::from_hex(fg).is_some(), "{:?} foreground", swatch);
            assert!(Rgba8::from_hex(bg).is_some(), "{:?} background", swatch);
        }
    }

    #[test]
    fn test_parse_rejects_short_hex() {
        assert_eq!(Rgba8::from_hex("#fff"), None);
        assert_eq!(Rgba8::from_hex("ff0000"), None);
        assert_eq!(Rgba8::from_hex("#ff0000"), Some(Rgba8::new(255, 0, 0, 255)));
    }
}
