use std::ops::Range;

use crate::renderer::atlas::PageAllocator;
use crate::renderer::geometry::{Point, Size};

use super::cache::{GlyphCache, GlyphRecord};
use super::traits::RasterFace;
use super::RenderMode;

/// Everything a rasterization needs besides the cache itself.
pub struct LoadContext<'a> {
    pub face: &'a mut dyn RasterFace,
    pub pages: &'a mut PageAllocator,
    pub pixel_size: u32,
    pub mode: RenderMode,
}

/// Turns one cache miss into a rasterization window of neighboring code
/// points. Large windows over sparse text fill pages with unused glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLoader {
    batch_size: u32,
}

impl BatchLoader {
    /// A size of 0 behaves like 1.
    pub fn new(batch_size: u32) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// `[c - B/2, c - B/2 + B)`, with the low end clamped at 0.
    pub fn window(&self, codepoint: u32) -> Range<u32> {
        let start = codepoint.saturating_sub(self.batch_size / 2);
        start..start.saturating_add(self.batch_size)
    }

    /// Rasterize every mapped, unloaded code point in the window around
    /// `codepoint`. Returns how many glyphs were loaded.
    pub fn load_window(
        &self,
        cache: &mut GlyphCache,
        codepoint: u32,
        ctx: &mut LoadContext<'_>,
    ) -> usize {
        let window = self.window(codepoint);
        log::debug!(
            "Batch loading U+{:04X}..U+{:04X}",
            window.start,
            window.end
        );
        self.load_range(cache, window, ctx)
    }

    pub fn load_range(
        &self,
        cache: &mut GlyphCache,
        codepoints: Range<u32>,
        ctx: &mut LoadContext<'_>,
    ) -> usize {
        let mut loaded = 0;
        for codepoint in codepoints {
            let glyph_id = ctx.face.char_to_glyph_index(codepoint);
            if glyph_id == 0 || cache.is_loaded(glyph_id) || cache.has_failed(glyph_id) {
                continue;
            }
            if self.load_glyph(cache, glyph_id, ctx) {
                loaded += 1;
            }
        }
        loaded
    }

    /// Rasterize one glyph into the atlas. Failures leave it unloaded and
    /// marked failed in `cache`.
    pub fn load_glyph(
        &self,
        cache: &mut GlyphCache,
        glyph_id: u32,
        ctx: &mut LoadContext<'_>,
    ) -> bool {
        if cache.has_failed(glyph_id) {
            return false;
        }
        if let Err(e) = ctx.face.set_pixel_size(ctx.pixel_size) {
            log::warn!("Cannot rasterize glyph {}: {}", glyph_id, e);
            cache.mark_failed(glyph_id);
            return false;
        }
        let glyph = match ctx.face.load_glyph(glyph_id, ctx.mode.load_flags()) {
            Ok(glyph) => glyph,
            Err(e) => {
                log::warn!("{}", e);
                cache.mark_failed(glyph_id);
                return false;
            }
        };

        let placed = ctx
            .pages
            .ensure_capacity(glyph.pixel_mode)
            .and_then(|page| Ok((page, ctx.pages.assign_slot(page, &glyph)?)));
        let (page, source_rect) = match placed {
            Ok(placed) => placed,
            Err(e) => {
                log::warn!("No atlas slot for glyph {}: {}", glyph_id, e);
                cache.mark_failed(glyph_id);
                return false;
            }
        };

        cache.store(
            glyph_id,
            GlyphRecord {
                page,
                source_rect,
                offset: Point::new(glyph.bearing_x, glyph.bearing_top),
                advance: Point::new(glyph.advance.x / 64, glyph.advance.y / 64),
                bitmap_size: Size::new(glyph.width, glyph.height),
                pixel_mode: glyph.pixel_mode,
            },
        );
        true
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_BATCH_LOAD_SIZE)
    }
}
