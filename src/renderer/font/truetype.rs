//! TrueType/OpenType rasterizer backend built on `fontdue`.
//!
//! fontdue renders unhinted outlines, so the face reports no hinting support
//! and toggling hinting on a font never discards its cache. Monochrome output is produced by thresholding coverage.

use fontdue::{Font, FontSettings};

use super::traits::{RasterEngine, RasterFace};
use super::{FaceError, LoadFlags, PixelMode, RasterizedGlyph, SizeMetrics};
use crate::renderer::geometry::Point;

const MONO_THRESHOLD: u8 = 128;

#[derive(Debug, Default)]
pub struct TrueTypeEngine {
    faces_opened: usize,
}

impl TrueTypeEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RasterEngine for TrueTypeEngine {
    fn name(&self) -> &str {
        "fontdue"
    }

    fn open_face(&mut self, bytes: &[u8]) -> Result<Box<dyn RasterFace>, FaceError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| FaceError::Parse(e.to_string()))?;
        self.faces_opened += 1;
        log::debug!(
            "Opened face #{} with {} glyphs",
            self.faces_opened,
            font.glyph_count()
        );
        Ok(Box::new(TrueTypeFace::new(font)))
    }
}

pub struct TrueTypeFace {
    font: Font,
    pixel_size: u32,
}

impl TrueTypeFace {
    fn new(font: Font) -> Self {
        Self {
            font,
            pixel_size: 0,
        }
    }

    fn px(&self) -> f32 {
        self.pixel_size as f32
    }
}

impl RasterFace for TrueTypeFace {
    fn glyph_count(&self) -> u32 {
        self.font.glyph_count() as u32
    }

    fn set_pixel_size(&mut self, size: u32) -> Result<(), FaceError> {
        if size == 0 {
            return Err(FaceError::InvalidPixelSize(size));
        }
        self.pixel_size = size;
        Ok(())
    }

    fn char_to_glyph_index(&self, codepoint: u32) -> u32 {
        char::from_u32(codepoint)
            .map(|c| self.font.lookup_glyph_index(c) as u32)
            .unwrap_or(0)
    }

    fn load_glyph(
        &mut self,
        glyph_id: u32,
        flags: LoadFlags,
    ) -> Result<RasterizedGlyph, FaceError> {
        if self.pixel_size == 0 {
            return Err(FaceError::InvalidPixelSize(0));
        }
        let index = u16::try_from(glyph_id)
            .ok()
            .filter(|&i| i < self.font.glyph_count())
            .ok_or_else(|| FaceError::GlyphLoad {
                glyph_id,
                reason: "glyph id out of range".to_string(),
            })?;

        let (metrics, mut buffer) = self.font.rasterize_indexed(index, self.px());
        let pixel_mode = if flags.contains(LoadFlags::MONOCHROME) {
            for value in buffer.iter_mut() {
                *value = if *value >= MONO_THRESHOLD { 255 } else { 0 };
            }
            PixelMode::Mono
        } else {
            PixelMode::Gray
        };

        Ok(RasterizedGlyph {
            width: metrics.width as u32,
            height: metrics.height as u32,
            bearing_x: metrics.xmin,
            bearing_top: metrics.ymin + metrics.height as i32,
            advance: Point::new(to_26_6(metrics.advance_width), to_26_6(metrics.advance_height)),
            pixel_mode,
            buffer,
        })
    }

    fn has_kerning(&self) -> bool {
        // Pairs missing from the kern table come back as zero.
        true
    }

    fn is_scalable(&self) -> bool {
        true
    }

    fn supports_hinting(&self) -> bool {
        false
    }

    fn kerning(&self, left: u32, right: u32) -> Point {
        let (Ok(left), Ok(right)) = (u16::try_from(left), u16::try_from(right)) else {
            return Point::default();
        };
        self.font
            .horizontal_kern_indexed(left, right, self.px())
            .map(|k| Point::new(to_26_6(k), 0))
            .unwrap_or_default()
    }

    fn size_metrics(&self) -> SizeMetrics {
        match self.font.horizontal_line_metrics(self.px()) {
            Some(lm) => SizeMetrics {
                ascender: to_26_6(lm.ascent),
                descender: to_26_6(lm.descent),
                height: to_26_6(lm.new_line_size),
            },
            None => SizeMetrics {
                ascender: to_26_6(self.px()),
                descender: 0,
                height: to_26_6(self.px()),
            },
        }
    }
}

fn to_26_6(value: f32) -> i32 {
    (value * 64.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_face_rejects_garbage() {
        let mut engine = TrueTypeEngine::new();
        let result = engine.open_face(b"definitely not a font");
        assert!(matches!(result, Err(FaceError::Parse(_))));
    }

    #[test]
    fn test_to_26_6() {
        assert_eq!(to_26_6(1.0), 64);
        assert_eq!(to_26_6(-0.5), -32);
        assert_eq!(to_26_6(10.25), 656);
    }

    #[test]
    fn test_engine_name() {
        assert_eq!(TrueTypeEngine::new().name(), "fontdue");
    }
}
