//! Draw colors for glyph batches.
//!
//! Colors are 8-bit sRGB with straight alpha. GPU hosts whose framebuffers
//! use an sRGB format expect linear input, so `to_linear_rgba` converts.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpack a `0xAARRGGBB` color.
    pub const fn from_argb(color: u32) -> Self {
        Self {
            a: (color >> 24) as u8,
            r: (color >> 16) as u8,
            g: (color >> 8) as u8,
            b: color as u8,
        }
    }

    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub const fn opaque(self) -> Self {
        Self { a: 255, ..self }
    }

    /// Linear RGBA for sRGB render targets.
    pub fn to_linear_rgba(self) -> [f32; 4] {
        [
            srgb_to_linear(self.r as f32 / 255.0),
            srgb_to_linear(self.g as f32 / 255.0),
            srgb_to_linear(self.b as f32 / 255.0),
            self.a as f32 / 255.0,
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Convert sRGB color component to linear space.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Scale an 8-bit channel by an 8-bit factor, rounding to nearest.
#[inline]
pub fn mul_u8(a: u8, b: u8) -> u8 {
    let t = a as u32 * b as u32 + 128;
    ((t + (t >> 8)) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_to_linear_black() {
        assert!((srgb_to_linear(0.0) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_srgb_to_linear_mid_gray() {
        let linear = srgb_to_linear(0.5);
        assert!((linear - 0.214).abs() < 0.01);
    }

    #[test]
    fn test_argb_round_trip() {
        let color = Color::from_argb(0x80FF4020);
        assert_eq!(color, Color::rgba(0xFF, 0x40, 0x20, 0x80));
        assert_eq!(color.to_argb(), 0x80FF4020);
    }

    #[test]
    fn test_opaque_keeps_rgb() {
        let color = Color::rgba(10, 20, 30, 0).opaque();
        assert_eq!(color, Color::rgba(10, 20, 30, 255));
    }

    #[test]
    fn test_to_linear_rgba_white() {
        let rgba = Color::WHITE.to_linear_rgba();
        for c in rgba {
            assert!((c - 1.0).abs() < 0.0001);
        }
    }

    #[test]
    fn test_mul_u8() {
        assert_eq!(mul_u8(255, 255), 255);
        assert_eq!(mul_u8(255, 0), 0);
        assert_eq!(mul_u8(128, 255), 128);
        assert_eq!(mul_u8(255, 128), 128);
    }
}
