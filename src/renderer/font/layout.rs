//! Draw and measure layout.
//!
//! A draw runs `Measuring` (only when centering), then `Iterating` with a
//! `LineBreak` excursion per line break, and ends `Flushed` once the touched
//! pages are uploaded and one batch per page has been issued.

use std::collections::BTreeMap;

#[cfg(feature = "perf-stats")]
use std::time::Instant;

use crate::renderer::atlas::PageAllocator;
use crate::renderer::batch::{GlyphBatch, RenderList};
use crate::renderer::color::Color;
use crate::renderer::geometry::{Point, Rect, Size};

use super::cache::GlyphRecord;

const CARRIAGE_RETURN: u32 = '\r' as u32;
const LINE_FEED: u32 = '\n' as u32;

/// What the layout needs to know about a font.
pub trait GlyphMetrics {
    /// Glyph id with replacement fallback; 0 draws nothing. Never rasterizes.
    fn glyph_index(&self, codepoint: u32) -> u32;
    /// Record for a glyph, rasterizing on a miss.
    fn glyph(&mut self, glyph_id: u32, codepoint: u32) -> Option<GlyphRecord>;
    /// Pen advance in pixels.
    fn advance_of(&mut self, codepoint: u32) -> i32;
    fn kerning(&self, codepoint: u32, previous: u32) -> Point;
    fn ascender(&self) -> i32;
    /// Line height used for measurement.
    fn line_height(&mut self) -> i32;
    fn is_invisible(&self, codepoint: u32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Measuring,
    Iterating,
    LineBreak,
    Flushed,
}

/// Length of the line break starting at `index`, if any. `\r\n` counts as one.
pub fn line_break_at(text: &[u32], index: usize) -> Option<usize> {
    match text.get(index).copied()? {
        CARRIAGE_RETURN if text.get(index + 1) == Some(&LINE_FEED) => Some(2),
        CARRIAGE_RETURN | LINE_FEED => Some(1),
        _ => None,
    }
}

pub fn is_line_break(codepoint: u32) -> bool {
    codepoint == CARRIAGE_RETURN || codepoint == LINE_FEED
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurement {
    pub line_widths: Vec<i32>,
    pub line_height: i32,
}

impl Measurement {
    pub fn width(&self) -> i32 {
        self.line_widths.iter().copied().max().unwrap_or(0)
    }

    pub fn height(&self) -> i32 {
        self.line_widths.len() as i32 * self.line_height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width().max(0) as u32, self.height().max(0) as u32)
    }
}

/// Render lists keyed by page index.
pub type PageLists = BTreeMap<usize, RenderList>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    pub glyphs: usize,
    pub draw_calls: usize,
    pub pages_flushed: usize,
}

#[derive(Debug)]
pub struct LayoutEngine {
    state: LayoutState,
    lines: usize,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self {
            state: LayoutState::Iterating,
            lines: 0,
        }
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// Lines visited by the last layout.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Width of every line and the measurement line height.
    pub fn measure<M: GlyphMetrics + ?Sized>(&mut self, metrics: &mut M, text: &[u32]) -> Measurement {
        let mut line_widths = Vec::new();
        let mut width = 0;
        let mut previous = 0;
        let mut index = 0;
        while index < text.len() {
            if let Some(len) = line_break_at(text, index) {
                line_widths.push(width);
                width = 0;
                previous = 0;
                index += len;
                continue;
            }
            let codepoint = text[index];
            if !metrics.is_invisible(codepoint) {
                width += metrics.kerning(codepoint, previous).x;
                previous = codepoint;
            }
            width += metrics.advance_of(codepoint);
            index += 1;
        }
        line_widths.push(width);

        Measurement {
            line_widths,
            line_height: metrics.line_height(),
        }
    }

    /// Position every visible glyph of `text` inside `rect`, grouped by page.
    pub fn layout<M: GlyphMetrics + ?Sized>(
        &mut self,
        metrics: &mut M,
        text: &[u32],
        rect: Rect,
        center_h: bool,
        center_v: bool,
    ) -> PageLists {
        let measurement = if center_h || center_v {
            self.state = LayoutState::Measuring;
            Some(self.measure(metrics, text))
        } else {
            None
        };
        let line_start = |line: usize| -> i32 {
            match &measurement {
                Some(m) if center_h => {
                    let width = m.line_widths.get(line).copied().unwrap_or(0);
                    rect.min.x + ((rect.width() - width) >> 1)
                }
                _ => rect.min.x,
            }
        };
        let top = match &measurement {
            Some(m) if center_v => rect.min.y + ((rect.height() - m.height()) >> 1),
            _ => rect.min.y,
        };

        self.state = LayoutState::Iterating;
        self.lines = 1;
        let ascender = metrics.ascender();
        let mut lists = PageLists::new();
        let mut pen = Point::new(line_start(0), top);
        let mut previous = 0;
        let mut index = 0;

        while index < text.len() {
            if let Some(len) = line_break_at(text, index) {
                self.state = LayoutState::LineBreak;
                pen.x = line_start(self.lines);
                pen.y += ascender;
                self.lines += 1;
                previous = 0;
                index += len;
                self.state = LayoutState::Iterating;
                continue;
            }

            let codepoint = text[index];
            // Invisible characters advance the pen but neither kern nor
            // become the kerning partner of the next glyph.
            let visible = !metrics.is_invisible(codepoint);
            if visible {
                pen += metrics.kerning(codepoint, previous);
                previous = codepoint;
            }

            let glyph_id = metrics.glyph_index(codepoint);
            if glyph_id != 0 && visible {
                if let Some(record) = metrics.glyph(glyph_id, codepoint) {
                    if !record.source_rect.is_empty() {
                        let position =
                            pen + Point::new(record.offset.x, ascender - record.offset.y);
                        lists
                            .entry(record.page)
                            .or_default()
                            .push(position, record.source_rect);
                    }
                }
            }

            pen.x += metrics.advance_of(codepoint);
            index += 1;
        }
        lists
    }

    /// Upload every page touched by `lists`, then issue one batch per page.
    /// Pages that fail to upload are not drawn.
    pub fn flush(
        &mut self,
        lists: &PageLists,
        pages: &mut PageAllocator,
        color: Color,
        clip: Option<Rect>,
    ) -> DrawStats {
        #[cfg(feature = "perf-stats")]
        let start = Instant::now();
        let mut stats = DrawStats::default();
        let mut failed = Vec::new();
        for &page in lists.keys() {
            match pages.flush(page) {
                Ok(true) => stats.pages_flushed += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Skipping page {}: {}", page, e);
                    failed.push(page);
                }
            }
        }

        let host = pages.host().clone();
        for (&index, list) in lists {
            if failed.contains(&index) || list.is_empty() {
                continue;
            }
            let Some(page) = pages.page(index) else {
                continue;
            };
            host.borrow_mut()
                .draw_batch(&GlyphBatch::new(page.texture(), list, color, clip));
            stats.draw_calls += 1;
            stats.glyphs += list.len();
        }
        self.state = LayoutState::Flushed;

        #[cfg(feature = "perf-stats")]
        log::info!(
            "[PERF] Draw: {} glyphs, {} calls, {} uploads in {:.2}ms",
            stats.glyphs,
            stats.draw_calls,
            stats.pages_flushed,
            start.elapsed().as_secs_f64() * 1000.0
        );
        stats
    }
}
