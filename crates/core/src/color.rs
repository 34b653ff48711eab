//! Hex colour decoding for client-supplied background colours.
//!
//! Decoding is lenient: anything that is not six hex digits (after removing
//! every `#`) decodes to black instead of failing the request.

use serde::Serialize;

use crate::types::Vec3;

/// An 8-bit-per-channel colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to a linear colour with channels in `[0, 1]`.
    pub fn to_unit(self) -> Vec3 {
        Vec3::new(
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }
}

/// Decode `#RRGGBB` (or `RRGGBB`) into its three channels.
pub fn hex_to_rgb(hex: &str) -> Rgb {
    let digits: String = hex.chars().filter(|c| *c != '#').collect();
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Rgb::BLACK;
    }

    match u32::from_str_radix(&digits, 16) {
        Ok(value) => Rgb {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        },
        Err(_) => Rgb::BLACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_with_hash() {
        assert_eq!(hex_to_rgb("#FF0000"), Rgb::new(255, 0, 0));
    }

    #[test]
    fn decodes_without_hash() {
        assert_eq!(hex_to_rgb("FF0000"), Rgb::new(255, 0, 0));
        assert_eq!(hex_to_rgb("00ff7f"), Rgb::new(0, 255, 127));
    }

    #[test]
    fn wrong_length_is_black() {
        assert_eq!(hex_to_rgb("abc"), Rgb::BLACK);
        assert_eq!(hex_to_rgb(""), Rgb::BLACK);
        assert_eq!(hex_to_rgb("#FF00000"), Rgb::BLACK);
    }

    #[test]
    fn non_hex_digits_are_black() {
        assert_eq!(hex_to_rgb("#GG0000"), Rgb::BLACK);
        assert_eq!(hex_to_rgb("+12345"), Rgb::BLACK);
    }

    #[test]
    fn to_unit_scales_channels() {
        let unit = Rgb::new(255, 0, 51).to_unit();
        assert_eq!(unit, Vec3::new(1.0, 0.0, 0.2));
    }
}
