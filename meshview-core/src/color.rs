//! RGB colors and hex parsing

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Linear RGB color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// From a packed `0xRRGGBB` value
    pub const fn from_hex_u32(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Parse `#RRGGBB`, `#RGB` or `0xRRGGBB` (case insensitive)
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let digits = s
            .strip_prefix('#')
            .or_else(|| s.strip_prefix("0x"))
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidColor(input.to_string()))?;

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidColor(input.to_string()));
        }

        let packed = match digits.len() {
            6 => u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidColor(input.to_string()))?,
            3 => {
                // #abc == #aabbcc
                let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16).map_err(|_| Error::InvalidColor(input.to_string()))?
            }
            _ => return Err(Error::InvalidColor(input.to_string())),
        };
        Ok(Self::from_hex_u32(packed))
    }

    /// Packed `0xRRGGBB`
    pub fn to_hex_u32(&self) -> u32 {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (c(self.r) << 16) | (c(self.g) << 8) | c(self.b)
    }

    /// `#RRGGBB`, upper case
    pub fn to_hex(&self) -> String {
        format!("#{:06X}", self.to_hex_u32())
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Color::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[f32; 3]> for Color {
    fn from(rgb: [f32; 3]) -> Self {
        Color::new(rgb[0], rgb[1], rgb[2])
    }
}
