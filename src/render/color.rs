use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::VisualizerError;

/// One RGBA8 pixel, laid out exactly as the encoder expects on its pipe.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Rgba8 = Rgba8::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Blend `self` over `dst` with the given coverage (0.0-1.0).
    pub fn blend_over(self, dst: Rgba8, coverage: f32) -> Rgba8 {
        let a = (self.a as f32 / 255.0) * coverage.clamp(0.0, 1.0);
        if a <= 0.0 {
            return dst;
        }
        let inv_a = 1.0 - a;
        let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * inv_a).round() as u8;
        let out_a = a + (dst.a as f32 / 255.0) * inv_a;
        Rgba8 {
            r: mix(self.r, dst.r),
            g: mix(self.g, dst.g),
            b: mix(self.b, dst.b),
            a: (out_a * 255.0).round().min(255.0) as u8,
        }
    }
}

impl FromStr for Rgba8 {
    type Err = VisualizerError;

    /// Parses `#RGB` or `#RRGGBB` (the leading `#` is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VisualizerError::InvalidColor(s.to_string());
        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Rgba8::opaque(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Rgba8::opaque(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgba8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#E040FB".parse::<Rgba8>().unwrap(), Rgba8::opaque(0xE0, 0x40, 0xFB));
        assert_eq!("0d0d1a".parse::<Rgba8>().unwrap(), Rgba8::opaque(0x0D, 0x0D, 0x1A));
        assert_eq!("#fff".parse::<Rgba8>().unwrap(), Rgba8::opaque(255, 255, 255));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!("#12345".parse::<Rgba8>().is_err());
        assert!("#GGGGGG".parse::<Rgba8>().is_err());
        assert!("".parse::<Rgba8>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let c = Rgba8::opaque(1, 2, 255);
        assert_eq!(c.to_string(), "#0102FF");
        assert_eq!(c.to_string().parse::<Rgba8>().unwrap(), c);
    }

    #[test]
    fn blend_respects_coverage() {
        let dst = Rgba8::BLACK;
        let src = Rgba8::opaque(200, 100, 0);
        assert_eq!(src.blend_over(dst, 1.0), src);
        assert_eq!(src.blend_over(dst, 0.0), dst);
        let half = src.blend_over(dst, 0.5);
        assert_eq!(half.r, 100);
        assert_eq!(half.g, 50);
        assert_eq!(half.a, 255);
    }
}
