use bitflags::bitflags;
use image::{Rgba, RgbaImage};

use crate::renderer::geometry::Point;

/// How a rasterized bitmap stores coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PixelMode {
    /// One bit of coverage: every pixel is either 0 or 255.
    Mono,
    /// 8-bit antialiased coverage.
    #[default]
    Gray,
}

bitflags! {
    /// Flags passed to the rasterizer when loading a glyph.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u32 {
        const NO_HINTING = 1 << 0;
        const NO_AUTOHINT = 1 << 1;
        const MONOCHROME = 1 << 2;
        const TARGET_MONO = 1 << 3;
    }
}

/// Rendering-mode switches of a font instance.
///
/// Any change to these invalidates every cached bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderMode {
    pub monochrome: bool,
    pub hinting: bool,
    pub auto_hinting: bool,
}

impl RenderMode {
    pub fn load_flags(&self) -> LoadFlags {
        let mut flags = LoadFlags::empty();
        if !self.hinting {
            flags |= LoadFlags::NO_HINTING;
        }
        if !self.auto_hinting {
            flags |= LoadFlags::NO_AUTOHINT;
        }
        if self.monochrome {
            flags |= LoadFlags::MONOCHROME | LoadFlags::TARGET_MONO;
        }
        flags
    }

    pub fn pixel_mode(&self) -> PixelMode {
        if self.monochrome {
            PixelMode::Mono
        } else {
            PixelMode::Gray
        }
    }
}

impl Default for RenderMode {
    fn default() -> Self {
        Self {
            monochrome: false,
            hinting: true,
            auto_hinting: true,
        }
    }
}

/// Rasterized glyph with positioning data.
///
/// `advance` is in 26.6 fixed point; everything else is in whole pixels.
#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    pub width: u32,
    pub height: u32,
    /// Horizontal distance from the pen to the bitmap's left edge.
    pub bearing_x: i32,
    /// Vertical distance from the baseline up to the bitmap's top edge.
    pub bearing_top: i32,
    pub advance: Point,
    pub pixel_mode: PixelMode,
    /// Row-major coverage, one byte per pixel.
    pub buffer: Vec<u8>,
}

impl RasterizedGlyph {
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.buffer
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Convert to a white RGBA image carrying coverage in alpha, cropped to
    /// at most `max_width` x `max_height`.
    pub fn to_rgba_image(&self, max_width: u32, max_height: u32) -> RgbaImage {
        let width = self.width.min(max_width);
        let height = self.height.min(max_height);
        RgbaImage::from_fn(width, height, |x, y| {
            let alpha = match self.pixel_mode {
                PixelMode::Mono if self.coverage(x, y) != 0 => 255,
                PixelMode::Mono => 0,
                PixelMode::Gray => self.coverage(x, y),
            };
            Rgba([255, 255, 255, alpha])
        })
    }
}

/// Face metrics at the current pixel size, in 26.6 fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeMetrics {
    pub ascender: i32,
    pub descender: i32,
    pub height: i32,
}

impl SizeMetrics {
    pub fn ascender_px(&self) -> i32 {
        self.ascender / 64
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("Failed to parse font data: {0}")]
    Parse(String),
    #[error("Failed to load glyph {glyph_id}: {reason}")]
    GlyphLoad { glyph_id: u32, reason: String },
    #[error("Invalid pixel size: {0}")]
    InvalidPixelSize(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_render_mode_flags() {
        let mode = RenderMode::default();
        assert_eq!(mode.load_flags(), LoadFlags::empty());
        assert_eq!(mode.pixel_mode(), PixelMode::Gray);
    }

    #[test]
    fn test_render_mode_flags_translation() {
        let mode = RenderMode {
            monochrome: true,
            hinting: false,
            auto_hinting: false,
        };
        let flags = mode.load_flags();
        assert!(flags.contains(LoadFlags::NO_HINTING));
        assert!(flags.contains(LoadFlags::NO_AUTOHINT));
        assert!(flags.contains(LoadFlags::MONOCHROME | LoadFlags::TARGET_MONO));
        assert_eq!(mode.pixel_mode(), PixelMode::Mono);
    }

    #[test]
    fn test_to_rgba_image_gray() {
        let glyph = RasterizedGlyph {
            width: 2,
            height: 1,
            bearing_x: 0,
            bearing_top: 1,
            advance: Point::new(3 * 64, 0),
            pixel_mode: PixelMode::Gray,
            buffer: vec![10, 200],
        };
        let image = glyph.to_rgba_image(16, 16);
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(*image.get_pixel(0, 0), Rgba([255, 255, 255, 10]));
        assert_eq!(*image.get_pixel(1, 0), Rgba([255, 255, 255, 200]));
    }

    #[test]
    fn test_to_rgba_image_mono_is_binary_and_cropped() {
        let glyph = RasterizedGlyph {
            width: 3,
            height: 3,
            bearing_x: 0,
            bearing_top: 3,
            advance: Point::new(4 * 64, 0),
            pixel_mode: PixelMode::Mono,
            buffer: vec![1, 0, 255, 0, 0, 0, 0, 0, 0],
        };
        let image = glyph.to_rgba_image(2, 2);
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0)[3], 255);
        assert_eq!(image.get_pixel(1, 0)[3], 0);
    }

    #[test]
    fn test_coverage_out_of_bounds() {
        let glyph = RasterizedGlyph {
            width: 1,
            height: 1,
            bearing_x: 0,
            bearing_top: 0,
            advance: Point::default(),
            pixel_mode: PixelMode::Gray,
            buffer: vec![7],
        };
        assert_eq!(glyph.coverage(0, 0), 7);
        assert_eq!(glyph.coverage(1, 0), 0);
        assert_eq!(glyph.coverage(0, 1), 0);
    }

    #[test]
    fn test_ascender_px_truncates() {
        let metrics = SizeMetrics {
            ascender: 15 * 64 + 40,
            descender: -4 * 64,
            height: 20 * 64,
        };
        assert_eq!(metrics.ascender_px(), 15);
    }
}
