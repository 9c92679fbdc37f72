//! Fixed-grid glyph pages.
//!
//! Every page is a texture cut into square cells the size of the font's
//! pixel size. Glyphs are placed in row-major order and their pixels are
//! staged on a CPU copy of the page; the texture is only touched when the
//! page is flushed, once per draw for all glyphs added since the last flush.

use image::RgbaImage;

#[cfg(feature = "perf-stats")]
use std::time::Instant;

use super::context::{HostError, SharedHost, TextureFormat, TextureId};
use super::font::{PixelMode, RasterizedGlyph};
use super::geometry::{Point, Rect, Size};
use crate::constants::{DEFAULT_MAX_PAGE_SIZE, LARGEST_PAGE_EDGE, PAGE_EDGE_TABLE};

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Glyph cell of {cell}px does not fit a {}x{} page", page.width, page.height)]
    GlyphTooLarge { cell: u32, page: Size },
    #[error("Page {0} has no free slot")]
    Full(usize),
    #[error("Unknown page {0}")]
    UnknownPage(usize),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Edge length of a new page for glyphs rasterized at `font_size` pixels.
pub fn page_edge_for(font_size: u32) -> u32 {
    PAGE_EDGE_TABLE
        .iter()
        .find(|(bound, _)| font_size <= *bound)
        .map_or(LARGEST_PAGE_EDGE, |(_, edge)| *edge)
}

pub fn texture_format_for(pixel_mode: PixelMode) -> TextureFormat {
    match pixel_mode {
        PixelMode::Mono => TextureFormat::Rgb5A1,
        PixelMode::Gray => TextureFormat::Rgba8,
    }
}

struct PendingBlit {
    origin: Point,
    bitmap: RgbaImage,
}

/// One atlas texture with its slot bookkeeping.
pub struct GlyphPage {
    texture: TextureId,
    name: String,
    size: Size,
    cell: u32,
    columns: u32,
    total_slots: u32,
    used_slots: u32,
    available_slots: u32,
    pixel_mode: PixelMode,
    dirty: bool,
    pending: Vec<PendingBlit>,
    image: RgbaImage,
    host: SharedHost,
}

impl GlyphPage {
    fn new(
        host: SharedHost,
        name: String,
        size: Size,
        cell: u32,
        pixel_mode: PixelMode,
    ) -> Result<Self, PageError> {
        let columns = size.width / cell.max(1);
        let rows = size.height / cell.max(1);
        let total_slots = columns * rows;
        if cell == 0 || total_slots == 0 {
            return Err(PageError::GlyphTooLarge { cell, page: size });
        }

        let format = texture_format_for(pixel_mode);
        let (texture, image) = {
            let mut host = host.borrow_mut();
            let texture = host.create_texture(size, &name, format)?;
            (texture, host.create_image(format, size))
        };

        Ok(Self {
            texture,
            name,
            size,
            cell,
            columns,
            total_slots,
            used_slots: 0,
            available_slots: total_slots,
            pixel_mode,
            dirty: false,
            pending: Vec::new(),
            image,
            host,
        })
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn cell_size(&self) -> u32 {
        self.cell
    }

    pub fn total_slots(&self) -> u32 {
        self.total_slots
    }

    pub fn used_slots(&self) -> u32 {
        self.used_slots
    }

    pub fn available_slots(&self) -> u32 {
        self.available_slots
    }

    pub fn pixel_mode(&self) -> PixelMode {
        self.pixel_mode
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pending_blits(&self) -> usize {
        self.pending.len()
    }

    /// CPU copy of the page. Only reflects glyphs added before the last flush.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn slot_origin(&self, slot: u32) -> Point {
        let column = slot % self.columns;
        let row = slot / self.columns;
        Point::new((column * self.cell) as i32, (row * self.cell) as i32)
    }

    /// Place `glyph` in the next free cell and queue its pixels for upload.
    fn assign_slot(&mut self, index: usize, glyph: &RasterizedGlyph) -> Result<Rect, PageError> {
        if self.available_slots == 0 {
            return Err(PageError::Full(index));
        }
        let origin = self.slot_origin(self.used_slots);
        let bitmap = glyph.to_rgba_image(self.cell, self.cell);
        let source = Rect::from_origin_size(origin, Size::new(bitmap.width(), bitmap.height()));

        if !bitmap.is_empty() {
            self.pending.push(PendingBlit { origin, bitmap });
        }
        self.used_slots += 1;
        self.available_slots -= 1;
        self.dirty = true;
        Ok(source)
    }

    /// Blit every pending glyph into the page image and upload it once.
    ///
    /// Returns whether anything was uploaded.
    fn flush(&mut self) -> Result<bool, HostError> {
        if !self.dirty {
            return Ok(false);
        }
        #[cfg(feature = "perf-stats")]
        let start = Instant::now();
        let blits = self.pending.len();

        {
            let host = self.host.borrow();
            for blit in &self.pending {
                host.blit(&blit.bitmap, &mut self.image, blit.origin);
            }
        }
        self.host.borrow_mut().upload(self.texture, &self.image)?;
        self.pending.clear();
        self.dirty = false;

        #[cfg(feature = "perf-stats")]
        log::info!(
            "[PERF] Flushed {} ({} blits) in {:.2}ms",
            self.name,
            blits,
            start.elapsed().as_secs_f64() * 1000.0
        );
        log::debug!("Flushed page {} with {} new glyphs", self.name, blits);
        Ok(true)
    }
}

impl Drop for GlyphPage {
    fn drop(&mut self) {
        match self.host.try_borrow_mut() {
            Ok(mut host) => host.remove_texture(self.texture),
            Err(_) => log::warn!("Texture host busy, leaking page texture {}", self.name),
        }
    }
}

/// Ordered list of pages owned by one font instance.
pub struct PageAllocator {
    host: SharedHost,
    pages: Vec<GlyphPage>,
    font_size: u32,
    name_prefix: String,
    max_page_size: Size,
}

impl PageAllocator {
    /// The host's maximum texture size is queried here, once.
    pub fn new(host: SharedHost, name_prefix: impl Into<String>, font_size: u32) -> Self {
        let max_page_size = host
            .borrow()
            .max_texture_size()
            .unwrap_or(DEFAULT_MAX_PAGE_SIZE);
        Self {
            host,
            pages: Vec::new(),
            font_size,
            name_prefix: name_prefix.into(),
            max_page_size,
        }
    }

    pub fn host(&self) -> &SharedHost {
        &self.host
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn max_page_size(&self) -> Size {
        self.max_page_size
    }

    /// Limit the size of pages created from now on.
    pub fn set_max_page_size(&mut self, size: Size) {
        self.max_page_size = size;
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, index: usize) -> Option<&GlyphPage> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> impl Iterator<Item = &GlyphPage> {
        self.pages.iter()
    }

    /// Size of the next page: the heuristic edge clamped to the maximum,
    /// rounded to the host's constraints when the result still fits.
    pub fn next_page_size(&self) -> Size {
        let edge = page_edge_for(self.font_size);
        let clamped = Size::new(
            edge.min(self.max_page_size.width),
            edge.min(self.max_page_size.height),
        );
        let constraints = self.host.borrow().texture_constraints();
        let optimal = clamped.optimal(constraints.require_pot, constraints.require_square);
        if optimal.width <= self.max_page_size.width && optimal.height <= self.max_page_size.height
        {
            optimal
        } else {
            clamped
        }
    }

    /// Index of a page with a free slot for `pixel_mode`, creating one if needed.
    pub fn ensure_capacity(&mut self, pixel_mode: PixelMode) -> Result<usize, PageError> {
        if let Some(index) = self
            .pages
            .iter()
            .position(|p| p.available_slots > 0 && p.pixel_mode == pixel_mode)
        {
            return Ok(index);
        }
        self.create_page(pixel_mode)
    }

    fn create_page(&mut self, pixel_mode: PixelMode) -> Result<usize, PageError> {
        let index = self.pages.len();
        let size = self.next_page_size();
        let name = format!("{}_{}_page{}", self.name_prefix, self.font_size, index);
        let page = GlyphPage::new(self.host.clone(), name, size, self.font_size, pixel_mode)?;
        log::info!(
            "Created glyph page {} ({}x{}, {} slots)",
            page.name,
            size.width,
            size.height,
            page.total_slots
        );
        self.pages.push(page);
        Ok(index)
    }

    pub fn assign_slot(&mut self, page: usize, glyph: &RasterizedGlyph) -> Result<Rect, PageError> {
        self.pages
            .get_mut(page)
            .ok_or(PageError::UnknownPage(page))?
            .assign_slot(page, glyph)
    }

    pub fn flush(&mut self, page: usize) -> Result<bool, PageError> {
        let page = self.pages.get_mut(page).ok_or(PageError::UnknownPage(page))?;
        Ok(page.flush()?)
    }

    /// Flush every dirty page, returning how many were uploaded.
    ///
    /// A page whose upload fails is logged and skipped.
    pub fn flush_all(&mut self) -> usize {
        let mut flushed = 0;
        for page in &mut self.pages {
            match page.flush() {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Failed to flush {}: {}", page.name, e),
            }
        }
        flushed
    }

    /// Drop every page and its texture.
    pub fn clear(&mut self) {
        if !self.pages.is_empty() {
            log::debug!("Discarding {} glyph pages", self.pages.len());
        }
        self.pages.clear();
    }

    /// Standalone copy of `rect` from a page, after flushing it.
    pub fn extract(&mut self, page: usize, rect: Rect) -> Result<RgbaImage, PageError> {
        self.flush(page)?;
        let page = self.pages.get(page).ok_or(PageError::UnknownPage(page))?;
        let size = rect.size();
        Ok(image::imageops::crop_imm(
            &page.image,
            rect.min.x.max(0) as u32,
            rect.min.y.max(0) as u32,
            size.width,
            size.height,
        )
        .to_image())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::renderer::context::TextureConstraints;
    use crate::renderer::geometry::Point;
    use crate::renderer::software::SoftwareHost;

    fn host(max: Option<Size>) -> (Rc<RefCell<SoftwareHost>>, SharedHost) {
        let concrete = Rc::new(RefCell::new(
            SoftwareHost::new(Size::square(8)).with_max_texture_size(max),
        ));
        let shared: SharedHost = concrete.clone();
        (concrete, shared)
    }

    fn glyph(width: u32, height: u32) -> RasterizedGlyph {
        RasterizedGlyph {
            width,
            height,
            bearing_x: 0,
            bearing_top: height as i32,
            advance: Point::new((width as i32 + 1) * 64, 0),
            pixel_mode: PixelMode::Gray,
            buffer: vec![255; (width * height) as usize],
        }
    }

    #[test]
    fn test_page_edge_table() {
        assert_eq!(page_edge_for(12), 512);
        assert_eq!(page_edge_for(20), 512);
        assert_eq!(page_edge_for(21), 1024);
        assert_eq!(page_edge_for(51), 1024);
        assert_eq!(page_edge_for(102), 2048);
        assert_eq!(page_edge_for(204), 4096);
        assert_eq!(page_edge_for(205), 8192);
    }

    #[test]
    fn test_page_size_is_clamped_to_host_max() {
        let (_, shared) = host(Some(Size::square(1024)));
        let pages = PageAllocator::new(shared, "test", 150);
        assert_eq!(pages.next_page_size(), Size::square(1024));
    }

    #[test]
    fn test_missing_max_defaults_to_2048() {
        let (_, shared) = host(None);
        let pages = PageAllocator::new(shared, "test", 300);
        assert_eq!(pages.max_page_size(), Size::square(2048));
        assert_eq!(pages.next_page_size(), Size::square(2048));
    }

    #[test]
    fn test_constraints_only_applied_when_fitting() {
        let concrete = Rc::new(RefCell::new(
            SoftwareHost::new(Size::square(8))
                .with_max_texture_size(Some(Size::new(1000, 600)))
                .with_constraints(TextureConstraints {
                    require_pot: true,
                    require_square: true,
                }),
        ));
        let shared: SharedHost = concrete;
        let mut pages = PageAllocator::new(shared, "test", 16);
        assert_eq!(pages.next_page_size(), Size::square(512));

        pages.set_max_page_size(Size::new(300, 200));
        assert_eq!(pages.next_page_size(), Size::new(300, 200));
    }

    #[test]
    fn test_slot_bookkeeping_and_row_major_placement() {
        let (concrete, shared) = host(Some(Size::square(64)));
        let mut pages = PageAllocator::new(shared, "test", 20);
        let index = pages.ensure_capacity(PixelMode::Gray).unwrap();
        let page = pages.page(index).unwrap();
        // 64 / 20 = 3 cells per edge.
        assert_eq!(page.total_slots(), 9);
        assert_eq!(page.name(), "test_20_page0");
        assert_eq!(concrete.borrow().texture_count(), 1);

        let first = pages.assign_slot(index, &glyph(10, 12)).unwrap();
        let second = pages.assign_slot(index, &glyph(30, 30)).unwrap();
        let fourth = {
            pages.assign_slot(index, &glyph(1, 1)).unwrap();
            pages.assign_slot(index, &glyph(5, 5)).unwrap()
        };
        assert_eq!(first, Rect::new(0, 0, 10, 12));
        // Larger than the cell: clipped.
        assert_eq!(second, Rect::new(20, 0, 40, 20));
        assert_eq!(fourth, Rect::new(0, 20, 5, 25));

        let page = pages.page(index).unwrap();
        assert_eq!(page.used_slots(), 4);
        assert_eq!(page.used_slots() + page.available_slots(), page.total_slots());
        assert!(page.is_dirty());
        assert_eq!(page.pending_blits(), 4);
    }

    #[test]
    fn test_full_page_triggers_new_page() {
        let (concrete, shared) = host(Some(Size::square(40)));
        let mut pages = PageAllocator::new(shared, "test", 20);
        for _ in 0..4 {
            let index = pages.ensure_capacity(PixelMode::Gray).unwrap();
            assert_eq!(index, 0);
            pages.assign_slot(index, &glyph(4, 4)).unwrap();
        }
        assert!(matches!(
            pages.assign_slot(0, &glyph(4, 4)),
            Err(PageError::Full(0))
        ));
        assert_eq!(pages.ensure_capacity(PixelMode::Gray).unwrap(), 1);
        assert_eq!(pages.len(), 2);
        assert_eq!(concrete.borrow().texture_count(), 2);
    }

    #[test]
    fn test_cell_larger_than_page_fails() {
        let (concrete, shared) = host(Some(Size::square(16)));
        let mut pages = PageAllocator::new(shared, "test", 20);
        assert!(matches!(
            pages.ensure_capacity(PixelMode::Gray),
            Err(PageError::GlyphTooLarge { cell: 20, .. })
        ));
        assert!(pages.is_empty());
        assert_eq!(concrete.borrow().texture_count(), 0);
    }

    #[test]
    fn test_flush_uploads_once_for_all_pending_glyphs() {
        let (concrete, shared) = host(Some(Size::square(64)));
        let mut pages = PageAllocator::new(shared, "test", 20);
        let index = pages.ensure_capacity(PixelMode::Gray).unwrap();
        pages.assign_slot(index, &glyph(3, 3)).unwrap();
        pages.assign_slot(index, &glyph(3, 3)).unwrap();

        assert!(pages.flush(index).unwrap());
        assert!(!pages.flush(index).unwrap());
        assert_eq!(concrete.borrow().stats().uploads, 1);

        let page = pages.page(index).unwrap();
        assert!(!page.is_dirty());
        assert_eq!(page.pending_blits(), 0);
        assert_eq!(page.image().get_pixel(21, 2)[3], 255);
        let texture = page.texture();
        assert_eq!(
            concrete.borrow().texture_image(texture).map(|i| i.get_pixel(1, 1)[3]),
            Some(255)
        );
    }

    #[test]
    fn test_mono_pages_use_one_bit_alpha_format() {
        let (concrete, shared) = host(None);
        let mut pages = PageAllocator::new(shared, "test", 12);
        let gray = pages.ensure_capacity(PixelMode::Gray).unwrap();
        let mono = pages.ensure_capacity(PixelMode::Mono).unwrap();
        assert_ne!(gray, mono);
        let texture = pages.page(mono).unwrap().texture();
        assert_eq!(
            concrete.borrow().texture_format(texture),
            Some(TextureFormat::Rgb5A1)
        );
    }

    #[test]
    fn test_clear_and_drop_remove_textures() {
        let (concrete, shared) = host(Some(Size::square(40)));
        let mut pages = PageAllocator::new(shared, "test", 20);
        pages.ensure_capacity(PixelMode::Gray).unwrap();
        pages.clear();
        assert_eq!(concrete.borrow().texture_count(), 0);

        pages.ensure_capacity(PixelMode::Gray).unwrap();
        drop(pages);
        assert_eq!(concrete.borrow().stats().textures_removed, 2);
    }

    #[test]
    fn test_extract_copies_cell() {
        let (_, shared) = host(Some(Size::square(64)));
        let mut pages = PageAllocator::new(shared, "test", 20);
        let index = pages.ensure_capacity(PixelMode::Gray).unwrap();
        let rect = pages.assign_slot(index, &glyph(4, 6)).unwrap();
        let image = pages.extract(index, rect).unwrap();
        assert_eq!(image.dimensions(), (4, 6));
        assert_eq!(image.get_pixel(3, 5)[3], 255);
    }
}
