//! 8-bit RGBA colors and the 256x256x256 color cube addressing scheme.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of cells in the full RGB color cube (256^3).
pub const CUBE_CELLS: usize = 256 * 256 * 256;

/// A straight-alpha 8-bit RGBA color.
///
/// Memory layout is `[r, g, b, a]`, so a slice of colors can be uploaded to
/// the GPU as little-endian packed `u32` words without conversion.
#[repr(C)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable,
    Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Fully transparent black, used as the transparency sentinel's table entry.
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    /// Opaque color from RGB channels.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Flat index of this color's RGB triple in the color cube: `r * 65536 + g * 256 + b`.
    ///
    /// Alpha is ignored, so colors that differ only in alpha share a cell.
    #[inline]
    pub fn cube_index(self) -> usize {
        ((self.r as usize) << 16) | ((self.g as usize) << 8) | self.b as usize
    }

    /// Inverse of [`Color::cube_index`]. The result is opaque.
    #[inline]
    pub fn from_cube_index(index: usize) -> Self {
        debug_assert!(index < CUBE_CELLS);
        Self::rgb((index >> 16) as u8, (index >> 8) as u8, index as u8)
    }

    /// True when both colors have identical RGB channels.
    #[inline]
    pub fn same_rgb(self, other: Color) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }

    /// Packed little-endian word as seen by the compute shaders.
    #[inline]
    pub fn to_packed(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    #[inline]
    pub fn from_packed(word: u32) -> Self {
        let [r, g, b, a] = word.to_le_bytes();
        Self { r, g, b, a }
    }

    /// Squared Euclidean distance between the RGB channels of two colors.
    #[inline]
    pub fn rgb_distance_sq(self, other: Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// Error parsing a hex color string.
#[derive(Debug, thiserror::Error)]
pub enum ParseColorError {
    #[error("Expected 6 or 8 hex digits, got {0:?}")]
    InvalidLength(String),
    #[error("Invalid hex digits in {0:?}")]
    InvalidDigits(String),
}

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parses `RRGGBB` or `RRGGBBAA`, with an optional leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        let raw = u32::from_str_radix(digits, 16)
            .map_err(|_| ParseColorError::InvalidDigits(s.to_string()))?;
        match digits.len() {
            6 => Ok(Color::rgb((raw >> 16) as u8, (raw >> 8) as u8, raw as u8)),
            8 => Ok(Color::rgba(
                (raw >> 24) as u8,
                (raw >> 16) as u8,
                (raw >> 8) as u8,
                raw as u8,
            )),
            _ => Err(ParseColorError::InvalidLength(s.to_string())),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}
