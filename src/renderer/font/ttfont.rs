use std::cell::RefMut;
use std::collections::HashSet;
use std::path::Path;

use ahash::RandomState;
use image::RgbaImage;

#[cfg(feature = "perf-stats")]
use std::time::Instant;

use crate::config::FontSettings;
use crate::constants::{
    ASCII_PRELOAD_END, DEFAULT_BATCH_LOAD_SIZE, DEFAULT_FONT_SIZE, DEFAULT_INVISIBLE_CHARACTERS,
    FULL_WIDTH_FALLBACK_START, LINE_HEIGHT_PROBES,
};
use crate::renderer::atlas::PageAllocator;
use crate::renderer::color::Color;
use crate::renderer::context::{SharedHost, TextureId};
use crate::renderer::geometry::{Point, Rect, Size};

use super::cache::{GlyphCache, GlyphRecord};
use super::layout::{is_line_break, DrawStats, GlyphMetrics, LayoutEngine};
use super::loader::{BatchLoader, LoadContext};
use super::registry::{Face, FaceRegistry, FontError};
use super::text::CodePoints;
use super::traits::RasterFace;
use super::{FaceError, RenderMode};

/// Construction options of a [`TrueTypeFont`].
#[derive(Debug, Clone, PartialEq)]
pub struct FontOptions {
    pub size: u32,
    pub antialias: bool,
    pub transparency: bool,
    pub hinting: bool,
    pub auto_hinting: bool,
    pub batch_load_size: u32,
    pub max_page_texture_size: Option<Size>,
    pub kerning_width: i32,
    pub kerning_height: i32,
    pub invisible: String,
    pub preload_ascii: bool,
}

impl Default for FontOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_FONT_SIZE,
            antialias: true,
            transparency: true,
            hinting: true,
            auto_hinting: true,
            batch_load_size: DEFAULT_BATCH_LOAD_SIZE,
            max_page_texture_size: None,
            kerning_width: 0,
            kerning_height: 0,
            invisible: DEFAULT_INVISIBLE_CHARACTERS.to_string(),
            preload_ascii: false,
        }
    }
}

impl FontOptions {
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

impl From<&FontSettings> for FontOptions {
    fn from(settings: &FontSettings) -> Self {
        Self {
            size: settings.size,
            antialias: settings.antialias,
            transparency: settings.transparency,
            hinting: settings.hinting,
            auto_hinting: settings.auto_hinting,
            batch_load_size: settings.batch_load_size,
            max_page_texture_size: settings
                .max_page_texture_size
                .map(|[width, height]| Size::new(width, height)),
            kerning_width: settings.kerning_width,
            kerning_height: settings.kerning_height,
            invisible: settings.invisible.clone(),
            preload_ascii: settings.preload_ascii,
        }
    }
}

/// A TrueType font at one pixel size, with its own glyph cache and pages.
///
/// Instances opened on the same file through one [`FaceRegistry`] share the
/// parsed face. Everything here is single-threaded.
pub struct TrueTypeFont {
    // Pages go before the face so textures are released first.
    pages: PageAllocator,
    cache: GlyphCache,
    loader: BatchLoader,
    layout: LayoutEngine,
    face: Face,
    size: u32,
    ascender: i32,
    mode: RenderMode,
    transparency: bool,
    kerning_override: Point,
    invisible: HashSet<u32, RandomState>,
}

impl TrueTypeFont {
    pub fn new(
        registry: &FaceRegistry,
        host: SharedHost,
        path: impl AsRef<Path>,
        options: &FontOptions,
    ) -> Result<Self, FontError> {
        let path = path.as_ref();
        if options.size == 0 {
            return Err(FontError::InvalidSize(options.size));
        }
        let face = registry.acquire(path)?;

        let (glyph_count, family, ascender) = {
            let mut raster = face.raster().ok_or_else(|| {
                FontError::EngineInit(FaceError::Parse("face already released".to_string()))
            })?;
            raster
                .set_pixel_size(options.size)
                .map_err(|source| FontError::Face {
                    path: path.to_path_buf(),
                    source,
                })?;
            (
                raster.glyph_count(),
                raster.family_name(),
                raster.size_metrics().ascender_px(),
            )
        };

        let prefix = family
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "font".to_string());
        let mut pages = PageAllocator::new(host, prefix, options.size);
        if let Some(max) = options.max_page_texture_size {
            pages.set_max_page_size(max);
        }

        let mut font = Self {
            pages,
            cache: GlyphCache::new(glyph_count),
            loader: BatchLoader::new(options.batch_load_size),
            layout: LayoutEngine::new(),
            face,
            size: options.size,
            ascender,
            mode: RenderMode {
                monochrome: !options.antialias,
                hinting: options.hinting,
                auto_hinting: options.auto_hinting,
            },
            transparency: options.transparency,
            kerning_override: Point::new(options.kerning_width, options.kerning_height),
            invisible: options.invisible.chars().map(u32::from).collect(),
        };
        log::info!(
            "Opened {} at {}px ({} glyphs)",
            path.display(),
            options.size,
            glyph_count
        );

        if options.preload_ascii {
            font.preload_ascii();
        }
        Ok(font)
    }

    /// Raster context with this instance's pixel size applied.
    fn raster(&self) -> Option<RefMut<'_, dyn RasterFace + 'static>> {
        let mut raster = self.face.raster()?;
        match raster.set_pixel_size(self.size) {
            Ok(()) => Some(raster),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    fn lookup(&mut self, glyph_id: u32, codepoint: u32) -> Option<GlyphRecord> {
        if let Some(record) = self.cache.get(glyph_id) {
            return Some(*record);
        }
        let mut raster = self.face.raster()?;
        let mut ctx = LoadContext {
            face: &mut *raster,
            pages: &mut self.pages,
            pixel_size: self.size,
            mode: self.mode,
        };
        self.cache
            .lookup_or_load(glyph_id, codepoint, &self.loader, &mut ctx)
    }

    fn fallback_extent(&self, codepoint: u32) -> i32 {
        if codepoint >= FULL_WIDTH_FALLBACK_START {
            self.ascender
        } else {
            self.ascender / 2
        }
    }

    fn invalidate(&mut self) {
        self.cache.invalidate_all(&mut self.pages);
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    /// Width of the widest line and the height of all lines of `text`.
    pub fn get_dimension<'a>(&mut self, text: impl Into<CodePoints<'a>>) -> Size {
        let text = text.into();
        let mut layout = std::mem::take(&mut self.layout);
        let size = layout.measure(self, &text).size();
        self.layout = layout;
        size
    }

    /// Advance width and visible height of one character.
    pub fn get_char_dimension(&mut self, codepoint: u32) -> Size {
        let width = self.advance_of(codepoint).max(0);
        let height = self.char_height(codepoint).max(0);
        Size::new(width as u32, height as u32)
    }

    /// Height from the top of the line to the bottom of the bitmap.
    pub fn char_height(&mut self, codepoint: u32) -> i32 {
        let glyph_id = self.glyph_index(codepoint);
        if glyph_id == 0 {
            return self.fallback_extent(codepoint);
        }
        match self.lookup(glyph_id, codepoint) {
            Some(record) => {
                self.ascender - record.offset.y + record.bitmap_size.height as i32
            }
            None => 0,
        }
    }

    /// Draw `text` into `rect` with one batch per touched page.
    pub fn draw<'a>(
        &mut self,
        text: impl Into<CodePoints<'a>>,
        rect: Rect,
        color: Color,
        center_h: bool,
        center_v: bool,
        clip: Option<Rect>,
    ) -> DrawStats {
        #[cfg(feature = "perf-stats")]
        let start = Instant::now();
        let text = text.into();
        let color = if self.transparency {
            color
        } else {
            color.opaque()
        };

        let mut layout = std::mem::take(&mut self.layout);
        let lists = layout.layout(self, &text, rect, center_h, center_v);
        let stats = layout.flush(&lists, &mut self.pages, color, clip);
        self.layout = layout;

        #[cfg(feature = "perf-stats")]
        log::info!(
            "[PERF] draw of {} chars: {:.2}ms",
            text.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        stats
    }

    /// Index of the first character whose right edge reaches `x`.
    ///
    /// Single line only: line breaks add no width.
    pub fn get_character_index_at<'a>(
        &mut self,
        text: impl Into<CodePoints<'a>>,
        x: i32,
    ) -> Option<usize> {
        let text = text.into();
        let mut right = 0;
        let mut previous = 0;
        for (index, &codepoint) in text.iter().enumerate() {
            if is_line_break(codepoint) {
                previous = 0;
                if right >= x {
                    return Some(index);
                }
                continue;
            }
            right += self.advance_of(codepoint);
            if !self.invisible.contains(&codepoint) {
                right += self.get_kerning(codepoint, previous).x;
                previous = codepoint;
            }
            if right >= x {
                return Some(index);
            }
        }
        None
    }

    /// Kerning to apply before `this` when it follows `previous`.
    pub fn get_kerning(&self, this: u32, previous: u32) -> Point {
        if this == 0 || previous == 0 {
            return Point::default();
        }
        let Some(raster) = self.raster() else {
            return Point::default();
        };

        let mut kerning = self.kerning_override;
        if raster.has_kerning() {
            let left = self.cache.resolve(&*raster, previous);
            let right = self.cache.resolve(&*raster, this);
            let delta = raster.kerning(left, right);
            kerning.x += if raster.is_scalable() {
                delta.x / 64
            } else {
                delta.x
            };
        }
        kerning
    }

    pub fn kerning_width_between(&self, this: u32, previous: u32) -> i32 {
        self.get_kerning(this, previous).x
    }

    pub fn set_kerning_width(&mut self, width: i32) {
        self.kerning_override.x = width;
    }

    pub fn set_kerning_height(&mut self, height: i32) {
        self.kerning_override.y = height;
    }

    pub fn kerning_width(&self) -> i32 {
        self.kerning_override.x
    }

    pub fn kerning_height(&self) -> i32 {
        self.kerning_override.y
    }

    /// Replace the set of characters that advance the pen but are never drawn.
    pub fn set_invisible_characters<'a>(&mut self, codepoints: impl Into<CodePoints<'a>>) {
        self.invisible = codepoints.into().iter().copied().collect();
    }

    pub fn invisible_characters(&self) -> Vec<u32> {
        let mut invisible: Vec<u32> = self.invisible.iter().copied().collect();
        invisible.sort_unstable();
        invisible
    }

    pub fn set_batch_load_size(&mut self, batch_size: u32) {
        self.loader = BatchLoader::new(batch_size);
    }

    pub fn batch_load_size(&self) -> u32 {
        self.loader.batch_size()
    }

    /// Applies to pages created after the call.
    /// Glyphs that found no page under the old limit may be attempted again.
    pub fn set_max_page_texture_size(&mut self, size: Size) {
        self.pages.set_max_page_size(size);
        self.cache.clear_failures();
    }

    pub fn max_page_texture_size(&self) -> Size {
        self.pages.max_page_size()
    }

    pub fn set_monochrome(&mut self, monochrome: bool) {
        if self.mode.monochrome != monochrome {
            self.mode.monochrome = monochrome;
            self.invalidate();
        }
    }

    /// Records the flags either way; the cache is only discarded when the
    /// rasterizer actually hints.
    pub fn set_font_hinting(&mut self, enable: bool, enable_auto: bool) {
        if self.mode.hinting == enable && self.mode.auto_hinting == enable_auto {
            return;
        }
        self.mode.hinting = enable;
        self.mode.auto_hinting = enable_auto;
        let hints = self.face.raster().map_or(true, |raster| raster.supports_hinting());
        if hints {
            self.invalidate();
        } else {
            log::debug!("Rasterizer ignores hinting, keeping cached glyphs");
        }
    }

    /// When off, draw colors are made opaque. Cached glyphs are unaffected.
    pub fn set_transparency(&mut self, transparency: bool) {
        self.transparency = transparency;
    }

    pub fn is_transparent(&self) -> bool {
        self.transparency
    }

    pub fn font_size(&self) -> u32 {
        self.size
    }

    pub fn use_monochrome(&self) -> bool {
        self.mode.monochrome
    }

    pub fn use_hinting(&self) -> bool {
        self.mode.hinting
    }

    pub fn use_auto_hinting(&self) -> bool {
        self.mode.auto_hinting
    }

    pub fn ascender(&self) -> i32 {
        self.ascender
    }

    /// Standalone RGBA copy of the glyph drawn for `codepoint`.
    pub fn create_image_from_char(&mut self, codepoint: u32) -> Option<RgbaImage> {
        let glyph_id = self.glyph_index(codepoint);
        let record = self.lookup(glyph_id, codepoint)?;
        if record.source_rect.is_empty() {
            return None;
        }
        match self.pages.extract(record.page, record.source_rect) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Cannot extract glyph U+{:04X}: {}", codepoint, e);
                None
            }
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_texture(&self, index: usize) -> Option<TextureId> {
        self.pages.page(index).map(|p| p.texture())
    }

    /// Pixels of a page, flushed first.
    pub fn page_image(&mut self, index: usize) -> Option<&RgbaImage> {
        if let Err(e) = self.pages.flush(index) {
            log::warn!("Cannot flush page {}: {}", index, e);
        }
        self.pages.page(index).map(|p| p.image())
    }

    pub fn pages(&self) -> &PageAllocator {
        &self.pages
    }

    /// Upload every page with pending glyphs. Returns the number uploaded.
    pub fn force_glyph_update(&mut self) -> usize {
        self.pages.flush_all()
    }

    /// Rasterize code points 0..127 in one batch.
    pub fn preload_ascii(&mut self) -> usize {
        let Some(mut raster) = self.face.raster() else {
            return 0;
        };
        let mut ctx = LoadContext {
            face: &mut *raster,
            pages: &mut self.pages,
            pixel_size: self.size,
            mode: self.mode,
        };
        let loaded = self
            .loader
            .load_range(&mut self.cache, 0..ASCII_PRELOAD_END, &mut ctx);
        log::debug!("Preloaded {} ASCII glyphs", loaded);
        loaded
    }

    pub fn loaded_glyph_count(&self) -> usize {
        self.cache.loaded_count()
    }

    pub fn is_char_loaded(&self, codepoint: u32) -> bool {
        let glyph_id = self.glyph_index(codepoint);
        glyph_id != 0 && self.cache.is_loaded(glyph_id)
    }

    /// Cached record for `codepoint`, without loading.
    pub fn glyph_record(&self, codepoint: u32) -> Option<GlyphRecord> {
        self.cache.get(self.glyph_index(codepoint)).copied()
    }
}

impl GlyphMetrics for TrueTypeFont {
    fn glyph_index(&self, codepoint: u32) -> u32 {
        match self.face.raster() {
            Some(raster) => self.cache.resolve(&*raster, codepoint),
            None => 0,
        }
    }

    fn glyph(&mut self, glyph_id: u32, codepoint: u32) -> Option<GlyphRecord> {
        self.lookup(glyph_id, codepoint)
    }

    fn advance_of(&mut self, codepoint: u32) -> i32 {
        let glyph_id = self.glyph_index(codepoint);
        if glyph_id == 0 {
            return self.fallback_extent(codepoint);
        }
        self.lookup(glyph_id, codepoint)
            .map_or(0, |record| record.advance.x)
    }

    fn kerning(&self, codepoint: u32, previous: u32) -> Point {
        self.get_kerning(codepoint, previous)
    }

    fn ascender(&self) -> i32 {
        self.ascender
    }

    fn line_height(&mut self) -> i32 {
        LINE_HEIGHT_PROBES
            .iter()
            .map(|&c| self.char_height(u32::from(c)))
            .max()
            .unwrap_or(self.ascender)
            + 1
    }

    fn is_invisible(&self, codepoint: u32) -> bool {
        self.invisible.contains(&codepoint)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::renderer::font::testing::{fake_registry_with_log, FakeFaceSpec, FakeLog};
    use crate::renderer::software::SoftwareHost;

    struct Fixture {
        registry: FaceRegistry,
        host: Rc<RefCell<SoftwareHost>>,
        log: FakeLog,
    }

    impl Fixture {
        fn new(spec: FakeFaceSpec) -> Self {
            let log = FakeLog::default();
            Self {
                registry: fake_registry_with_log(&[("fake.ttf", spec)], log.clone()),
                host: Rc::new(RefCell::new(SoftwareHost::new(Size::new(200, 100)))),
                log,
            }
        }

        fn font(&self, options: &FontOptions) -> TrueTypeFont {
            let host: SharedHost = self.host.clone();
            TrueTypeFont::new(&self.registry, host, "fake.ttf", options).unwrap()
        }
    }

    fn id(c: char) -> u32 {
        c as u32 + 1
    }

    #[test]
    fn test_defaults() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let font = fx.font(&FontOptions::with_size(20));
        assert_eq!(font.font_size(), 20);
        assert!(!font.use_monochrome());
        assert!(font.use_hinting() && font.use_auto_hinting());
        assert!(font.is_transparent());
        assert_eq!(font.batch_load_size(), 1);
        assert_eq!(font.invisible_characters(), vec![' ' as u32]);
        assert_eq!(font.max_page_texture_size(), Size::square(2048));
        assert_eq!(font.page_count(), 0);
        assert_eq!(font.ascender(), 15);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let host: SharedHost = fx.host.clone();
        let result = TrueTypeFont::new(&fx.registry, host, "fake.ttf", &FontOptions::with_size(0));
        assert!(matches!(result, Err(FontError::InvalidSize(0))));
    }

    #[test]
    fn test_char_dimension_and_fallbacks() {
        let fx = Fixture::new(FakeFaceSpec {
            replacement: false,
            ..FakeFaceSpec::default()
        });
        let mut font = fx.font(&FontOptions::with_size(20));
        // 20 / 2 + 2 wide, ascender - bearing_top + height tall.
        assert_eq!(font.get_char_dimension('A' as u32), Size::new(12, 15));
        assert_eq!(font.get_char_dimension('g' as u32), Size::new(12, 20));
        // Unmapped: half the ascender, or the full ascender from U+2000.
        assert_eq!(font.get_char_dimension(0x1000), Size::new(7, 7));
        assert_eq!(font.get_char_dimension(0x3042), Size::new(15, 15));
    }

    #[test]
    fn test_failed_glyph_has_zero_width() {
        let fx = Fixture::new(FakeFaceSpec {
            failing: vec![id('x')],
            ..FakeFaceSpec::default()
        });
        let mut font = fx.font(&FontOptions::with_size(20));
        assert_eq!(font.get_char_dimension('x' as u32).width, 0);
        assert!(!font.is_char_loaded('x' as u32));
        assert_eq!(font.get_dimension("axa").width, 24);
    }

    #[test]
    fn test_kerning_rules() {
        let fx = Fixture::new(FakeFaceSpec {
            kerning: vec![('A', 'V', -3)],
            ..FakeFaceSpec::default()
        });
        let mut font = fx.font(&FontOptions::with_size(20));
        assert_eq!(font.get_kerning('V' as u32, 'A' as u32), Point::new(-3, 0));
        assert_eq!(font.get_kerning('A' as u32, 'V' as u32), Point::new(0, 0));

        font.set_kerning_width(2);
        font.set_kerning_height(5);
        assert_eq!(font.get_kerning('V' as u32, 'A' as u32), Point::new(-1, 5));
        assert_eq!(font.kerning_width_between('V' as u32, 'A' as u32), -1);
        assert_eq!(font.get_kerning('V' as u32, 0), Point::default());
        assert_eq!(font.get_kerning(0, 'A' as u32), Point::default());
        assert_eq!((font.kerning_width(), font.kerning_height()), (2, 5));
    }

    #[test]
    fn test_unscalable_kerning_is_in_pixels() {
        let fx = Fixture::new(FakeFaceSpec {
            kerning: vec![('A', 'V', -3)],
            scalable: false,
            ..FakeFaceSpec::default()
        });
        let font = fx.font(&FontOptions::with_size(20));
        assert_eq!(font.get_kerning('V' as u32, 'A' as u32), Point::new(-3, 0));
    }

    #[test]
    fn test_kerning_reaches_across_invisible_characters() {
        let fx = Fixture::new(FakeFaceSpec {
            kerning: vec![('A', 'V', -3)],
            ..FakeFaceSpec::default()
        });
        let mut font = fx.font(&FontOptions::with_size(20));
        // Advance is 12px for every character.
        assert_eq!(font.get_dimension("AV").width, 21);
        assert_eq!(font.get_dimension("A V").width, 33);
        assert_eq!(font.get_character_index_at("A V", 33), Some(2));
        assert_eq!(font.get_character_index_at("A V", 34), None);
    }

    #[test]
    fn test_hinting_toggle_keeps_cache_when_unsupported() {
        let fx = Fixture::new(FakeFaceSpec {
            hinting: false,
            ..FakeFaceSpec::default()
        });
        let mut font = fx.font(&FontOptions::with_size(20));
        font.get_char_dimension('A' as u32);
        font.set_font_hinting(false, false);
        assert!(!font.use_hinting() && !font.use_auto_hinting());
        assert!(font.is_char_loaded('A' as u32));
        font.get_char_dimension('A' as u32);
        assert_eq!(fx.log.loads_of(id('A')), 1);

        // Monochrome still changes the bitmaps.
        font.set_monochrome(true);
        assert_eq!(font.loaded_glyph_count(), 0);
    }

    #[test]
    fn test_kerning_ignored_without_table() {
        let fx = Fixture::new(FakeFaceSpec {
            kerning: vec![('A', 'V', -3)],
            has_kerning: false,
            ..FakeFaceSpec::default()
        });
        let font = fx.font(&FontOptions::with_size(20));
        assert_eq!(font.get_kerning('V' as u32, 'A' as u32), Point::new(0, 0));
    }

    #[test]
    fn test_dimension_uses_descender_line_height() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        // 'g' is 20 tall: line height 21.
        assert_eq!(font.get_dimension("ab"), Size::new(24, 21));
        assert_eq!(font.get_dimension("ab\r\nabc\nx"), Size::new(36, 63));
    }

    #[test]
    fn test_mode_change_invalidates_only_on_change() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        font.get_char_dimension('A' as u32);
        assert_eq!(fx.log.loads_of(id('A')), 1);

        font.set_monochrome(false);
        font.set_font_hinting(true, true);
        font.set_transparency(false);
        font.get_char_dimension('A' as u32);
        assert_eq!(fx.log.loads_of(id('A')), 1);

        font.set_monochrome(true);
        assert_eq!(font.loaded_glyph_count(), 0);
        assert_eq!(font.page_count(), 0);
        font.get_char_dimension('A' as u32);
        assert_eq!(fx.log.loads_of(id('A')), 2);

        font.set_font_hinting(true, false);
        font.get_char_dimension('A' as u32);
        assert_eq!(fx.log.loads_of(id('A')), 3);
    }

    #[test]
    fn test_draw_flushes_and_batches_per_page() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        let stats = font.draw(
            "Hi there",
            Rect::new(0, 0, 200, 100),
            Color::WHITE,
            false,
            false,
            None,
        );
        // The space is invisible.
        assert_eq!(stats.glyphs, 7);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.pages_flushed, 1);
        let host = fx.host.borrow().stats();
        assert_eq!(host.uploads, 1);
        assert_eq!(host.draw_calls, 1);
        assert_eq!(host.glyphs_drawn, 7);
    }

    #[test]
    fn test_second_draw_reuses_uploaded_pages() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        let rect = Rect::new(0, 0, 200, 100);
        font.draw("abc", rect, Color::WHITE, false, false, None);
        let stats = font.draw("cab", rect, Color::WHITE, false, false, None);
        assert_eq!(stats.pages_flushed, 0);
        assert_eq!(fx.host.borrow().stats().uploads, 1);
    }

    #[test]
    fn test_draw_writes_pixels() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        font.draw(
            "A",
            Rect::new(10, 10, 200, 100),
            Color::rgba(255, 0, 0, 255),
            false,
            false,
            None,
        );
        let host = fx.host.borrow();
        // Bitmap starts at pen + bearing_x, top at pen.y + ascender - bearing_top.
        let pixel = host.canvas().get_pixel(11, 10);
        assert_eq!(pixel[0], 200);
        assert_eq!(pixel[1], 0);
        assert_eq!(host.canvas().get_pixel(10, 10)[3], 0);
    }

    #[test]
    fn test_transparency_off_forces_opaque_color() {
        let fx = Fixture::new(FakeFaceSpec {
            ..FakeFaceSpec::default()
        });
        let mut font = fx.font(&FontOptions {
            antialias: false,
            transparency: false,
            ..FontOptions::with_size(20)
        });
        font.draw(
            "A",
            Rect::new(0, 0, 200, 100),
            Color::rgba(0, 0, 255, 0),
            false,
            false,
            None,
        );
        assert_eq!(fx.host.borrow().canvas().get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn test_clip_limits_drawing() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        font.draw(
            "AA",
            Rect::new(0, 0, 200, 100),
            Color::WHITE,
            false,
            false,
            Some(Rect::new(0, 0, 12, 100)),
        );
        let host = fx.host.borrow();
        assert!(host.canvas().get_pixel(5, 5)[3] > 0);
        assert_eq!(host.canvas().get_pixel(14, 5)[3], 0);
    }

    #[test]
    fn test_character_index_at() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        assert_eq!(font.get_character_index_at("abc", 0), Some(0));
        assert_eq!(font.get_character_index_at("abc", 12), Some(0));
        assert_eq!(font.get_character_index_at("abc", 13), Some(1));
        assert_eq!(font.get_character_index_at("abc", 36), Some(2));
        assert_eq!(font.get_character_index_at("abc", 37), None);
    }

    #[test]
    fn test_invisible_characters_advance_but_are_not_drawn() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        font.set_invisible_characters("b");
        let stats = font.draw(
            "abc",
            Rect::new(0, 0, 200, 100),
            Color::WHITE,
            false,
            false,
            None,
        );
        assert_eq!(stats.glyphs, 2);
        assert_eq!(font.get_dimension("abc").width, 36);
    }

    #[test]
    fn test_create_image_from_char() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        let image = font.create_image_from_char('A' as u32).unwrap();
        assert_eq!(image.dimensions(), (10, 15));
        assert_eq!(image.get_pixel(0, 0)[3], 200);
        assert!(font.create_image_from_char(' ' as u32).is_none());
    }

    #[test]
    fn test_preload_ascii() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let font = fx.font(&FontOptions {
            preload_ascii: true,
            ..FontOptions::with_size(12)
        });
        assert_eq!(font.loaded_glyph_count(), 128);
        assert_eq!(font.page_count(), 1);
    }

    #[test]
    fn test_page_texture_name_uses_family() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        font.get_char_dimension('A' as u32);
        let texture = font.page_texture(0).unwrap();
        assert_eq!(
            fx.host.borrow().texture_name(texture),
            Some("Fake_20_page0")
        );
        assert!(font.page_image(0).is_some());
        assert_eq!(font.force_glyph_update(), 0);
    }

    #[test]
    fn test_small_max_page_spreads_glyphs() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions {
            max_page_texture_size: Some(Size::square(40)),
            ..FontOptions::with_size(20)
        });
        for c in "abcdef".chars() {
            font.get_char_dimension(c as u32);
        }
        // Four 20px cells per 40px page.
        assert_eq!(font.page_count(), 2);
        for page in font.pages().pages() {
            assert_eq!(page.used_slots() + page.available_slots(), page.total_slots());
        }
    }

    #[test]
    fn test_dropping_font_removes_textures_and_face() {
        let fx = Fixture::new(FakeFaceSpec::default());
        let mut font = fx.font(&FontOptions::with_size(20));
        font.get_char_dimension('A' as u32);
        assert_eq!(fx.host.borrow().texture_count(), 1);
        drop(font);
        assert_eq!(fx.host.borrow().texture_count(), 0);
        assert_eq!(fx.registry.refcount("fake.ttf"), 0);
        assert_eq!(fx.log.engines_alive(), 0);
    }
}
