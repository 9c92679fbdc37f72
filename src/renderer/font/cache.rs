use crate::constants::REPLACEMENT_CHARACTER;
use crate::renderer::atlas::PageAllocator;
use crate::renderer::geometry::{Point, Rect, Size};

use super::loader::{BatchLoader, LoadContext};
use super::traits::RasterFace;
use super::PixelMode;

/// Atlas location and metrics of one rasterized glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphRecord {
    pub page: usize,
    /// Cell area holding the bitmap, clipped to the cell size.
    pub source_rect: Rect,
    /// `(bearing_x, bearing_top)` in pixels.
    pub offset: Point,
    /// Pen advance in whole pixels.
    pub advance: Point,
    /// Unclipped bitmap size.
    pub bitmap_size: Size,
    pub pixel_mode: PixelMode,
}

/// Per-font table of glyph records indexed by glyph id.
///
/// A slot is either `None` (unloaded) or a complete record; there is no
/// partially loaded state. Glyphs that failed to load are remembered and not
/// attempted again until the cache is invalidated.
#[derive(Debug, Default)]
pub struct GlyphCache {
    records: Vec<Option<GlyphRecord>>,
    failed: Vec<bool>,
    loaded: usize,
}

impl GlyphCache {
    pub fn new(glyph_count: u32) -> Self {
        Self {
            records: vec![None; glyph_count as usize],
            failed: vec![false; glyph_count as usize],
            loaded: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, glyph_id: u32) -> Option<&GlyphRecord> {
        self.records.get(glyph_id as usize).and_then(Option::as_ref)
    }

    pub fn is_loaded(&self, glyph_id: u32) -> bool {
        self.get(glyph_id).is_some()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    pub fn has_failed(&self, glyph_id: u32) -> bool {
        self.failed.get(glyph_id as usize).copied().unwrap_or(false)
    }

    pub fn mark_failed(&mut self, glyph_id: u32) {
        if let Some(flag) = self.failed.get_mut(glyph_id as usize) {
            *flag = true;
        }
    }

    /// Allow previously failed glyphs to be attempted again.
    pub fn clear_failures(&mut self) {
        self.failed.iter_mut().for_each(|f| *f = false);
    }

    pub fn store(&mut self, glyph_id: u32, record: GlyphRecord) {
        if let Some(slot) = self.records.get_mut(glyph_id as usize) {
            if slot.replace(record).is_none() {
                self.loaded += 1;
            }
        }
    }

    /// Forget every record and discard the pages holding their bitmaps.
    pub fn invalidate_all(&mut self, pages: &mut PageAllocator) {
        log::debug!("Invalidating {} cached glyphs", self.loaded);
        self.records.iter_mut().for_each(|r| *r = None);
        self.clear_failures();
        self.loaded = 0;
        pages.clear();
    }

    /// Glyph id for `codepoint`, falling back to U+FFFD. 0 means nothing to draw.
    pub fn resolve(&self, face: &dyn RasterFace, codepoint: u32) -> u32 {
        match face.char_to_glyph_index(codepoint) {
            0 => face.char_to_glyph_index(REPLACEMENT_CHARACTER),
            id => id,
        }
    }

    /// Cached record for `glyph_id`, rasterizing it and the batch window
    /// around `codepoint` on a miss. A glyph that failed before yields `None`
    /// without touching the rasterizer.
    pub fn lookup_or_load(
        &mut self,
        glyph_id: u32,
        codepoint: u32,
        loader: &BatchLoader,
        ctx: &mut LoadContext<'_>,
    ) -> Option<GlyphRecord> {
        if glyph_id == 0 || self.has_failed(glyph_id) {
            return None;
        }
        if let Some(record) = self.get(glyph_id) {
            return Some(*record);
        }

        log::debug!("Glyph cache miss: U+{:04X} (glyph {})", codepoint, glyph_id);
        loader.load_window(self, codepoint, ctx);
        if !self.is_loaded(glyph_id) && !self.has_failed(glyph_id) {
            // Replacement glyphs sit outside the window of the code point.
            loader.load_glyph(self, glyph_id, ctx);
        }
        self.get(glyph_id).copied()
    }
}
