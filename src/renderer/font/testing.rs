//! Deterministic in-memory rasterizer for tests.
//!
//! Code point `c` below the face's glyph count maps to glyph `c + 1`, and
//! U+FFFD maps to the last glyph when `replacement` is set. Bitmaps are solid
//! boxes sized from the pixel size, so layouts can be computed by hand:
//!
//! - ascender: `3 * size / 4`
//! - regular glyph: `size / 2` wide, `3 * size / 4` tall, sitting on the baseline
//! - `g`, `j`, `_`: same width, `size` tall, descending `size / 4`
//! - space: empty bitmap
//! - advance: `size / 2 + 2` for everything
//!
//! Public but hidden from the docs so `tests/` can drive the real registry,
//! cache and layout without font files. Nothing outside tests constructs it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ahash::RandomState;

use super::registry::{FaceRegistry, MemorySource};
use super::traits::{RasterEngine, RasterFace};
use super::{FaceError, LoadFlags, PixelMode, RasterizedGlyph, SizeMetrics};
use crate::constants::REPLACEMENT_CHARACTER;
use crate::renderer::geometry::Point;

const FAKE_PREFIX: &str = "fake:";

#[derive(Debug, Clone)]
pub struct FakeFaceSpec {
    pub glyph_count: u32,
    pub family: Option<String>,
    /// Code points the char map reports as missing.
    pub unmapped: Vec<u32>,
    /// Glyph ids whose rasterization fails.
    pub failing: Vec<u32>,
    /// Kerning pairs `(previous, current, pixels)`.
    pub kerning: Vec<(char, char, i32)>,
    pub has_kerning: bool,
    pub scalable: bool,
    /// Whether hinting flags are reported as effective.
    pub hinting: bool,
    pub replacement: bool,
    /// Fail to open.
    pub corrupt: bool,
}

impl Default for FakeFaceSpec {
    fn default() -> Self {
        Self {
            glyph_count: 256,
            family: Some("Fake".to_string()),
            unmapped: Vec::new(),
            failing: Vec::new(),
            kerning: Vec::new(),
            has_kerning: true,
            scalable: true,
            hinting: true,
            replacement: true,
            corrupt: false,
        }
    }
}

impl FakeFaceSpec {
    pub fn glyph_id(&self, codepoint: u32) -> u32 {
        if self.unmapped.contains(&codepoint) {
            return 0;
        }
        if codepoint == REPLACEMENT_CHARACTER && self.replacement {
            return self.glyph_count - 1;
        }
        if codepoint < self.glyph_count.saturating_sub(2) {
            codepoint + 1
        } else {
            0
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeLogState {
    pub loads: Vec<u32>,
    pub faces_opened: usize,
    pub faces_closed: usize,
    pub engines_created: usize,
    pub engines_dropped: usize,
}

/// Shared record of everything the fake engines did.
#[derive(Debug, Clone, Default)]
pub struct FakeLog(Rc<RefCell<FakeLogState>>);

impl FakeLog {
    pub fn load_count(&self) -> usize {
        self.0.borrow().loads.len()
    }

    pub fn loads_of(&self, glyph_id: u32) -> usize {
        self.0.borrow().loads.iter().filter(|&&id| id == glyph_id).count()
    }

    pub fn loads(&self) -> Vec<u32> {
        self.0.borrow().loads.clone()
    }

    pub fn clear_loads(&self) {
        self.0.borrow_mut().loads.clear();
    }

    pub fn faces_open(&self) -> usize {
        let state = self.0.borrow();
        state.faces_opened - state.faces_closed
    }

    pub fn engines_alive(&self) -> usize {
        let state = self.0.borrow();
        state.engines_created - state.engines_dropped
    }
}

pub struct FakeEngine {
    specs: HashMap<String, FakeFaceSpec, RandomState>,
    log: FakeLog,
}

impl FakeEngine {
    fn new(specs: HashMap<String, FakeFaceSpec, RandomState>, log: FakeLog) -> Self {
        log.0.borrow_mut().engines_created += 1;
        Self { specs, log }
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.log.0.borrow_mut().engines_dropped += 1;
    }
}

impl RasterEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn open_face(&mut self, bytes: &[u8]) -> Result<Box<dyn RasterFace>, FaceError> {
        let key = std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.strip_prefix(FAKE_PREFIX))
            .ok_or_else(|| FaceError::Parse("not a fake font".to_string()))?;
        let spec = self
            .specs
            .get(key)
            .filter(|spec| !spec.corrupt)
            .cloned()
            .ok_or_else(|| FaceError::Parse(format!("corrupt fake font {key}")))?;
        self.log.0.borrow_mut().faces_opened += 1;
        Ok(Box::new(FakeFace::new(spec, self.log.clone())))
    }
}

pub struct FakeFace {
    spec: FakeFaceSpec,
    kerning: HashMap<(u32, u32), i32, RandomState>,
    pixel_size: u32,
    log: FakeLog,
}

impl FakeFace {
    pub fn new(spec: FakeFaceSpec, log: FakeLog) -> Self {
        let kerning = spec
            .kerning
            .iter()
            .map(|&(prev, cur, px)| {
                let units = if spec.scalable { px * 64 } else { px };
                ((spec.glyph_id(prev as u32), spec.glyph_id(cur as u32)), units)
            })
            .collect();
        Self {
            spec,
            kerning,
            pixel_size: 0,
            log,
        }
    }

    fn codepoint_of(&self, glyph_id: u32) -> u32 {
        if self.spec.replacement && glyph_id == self.spec.glyph_count - 1 {
            REPLACEMENT_CHARACTER
        } else {
            glyph_id - 1
        }
    }
}

impl Drop for FakeFace {
    fn drop(&mut self) {
        self.log.0.borrow_mut().faces_closed += 1;
    }
}

impl RasterFace for FakeFace {
    fn family_name(&self) -> Option<String> {
        self.spec.family.clone()
    }

    fn glyph_count(&self) -> u32 {
        self.spec.glyph_count
    }

    fn set_pixel_size(&mut self, size: u32) -> Result<(), FaceError> {
        if size == 0 {
            return Err(FaceError::InvalidPixelSize(size));
        }
        self.pixel_size = size;
        Ok(())
    }

    fn char_to_glyph_index(&self, codepoint: u32) -> u32 {
        self.spec.glyph_id(codepoint)
    }

    fn load_glyph(
        &mut self,
        glyph_id: u32,
        flags: LoadFlags,
    ) -> Result<RasterizedGlyph, FaceError> {
        self.log.0.borrow_mut().loads.push(glyph_id);
        if glyph_id == 0 || glyph_id >= self.spec.glyph_count || self.spec.failing.contains(&glyph_id)
        {
            return Err(FaceError::GlyphLoad {
                glyph_id,
                reason: "fake failure".to_string(),
            });
        }

        let size = self.pixel_size;
        let ascender = 3 * size / 4;
        let codepoint = self.codepoint_of(glyph_id);
        let (width, height) = match char::from_u32(codepoint) {
            Some(' ') => (0, 0),
            Some('g' | 'j' | '_') => (size / 2, size),
            _ => (size / 2, ascender),
        };
        let (pixel_mode, coverage) = if flags.contains(LoadFlags::MONOCHROME) {
            (PixelMode::Mono, 255)
        } else {
            (PixelMode::Gray, 200)
        };

        Ok(RasterizedGlyph {
            width,
            height,
            bearing_x: 1,
            bearing_top: if height == 0 { 0 } else { ascender as i32 },
            advance: Point::new((size / 2 + 2) as i32 * 64, 0),
            pixel_mode,
            buffer: vec![coverage; (width * height) as usize],
        })
    }

    fn has_kerning(&self) -> bool {
        self.spec.has_kerning
    }

    fn is_scalable(&self) -> bool {
        self.spec.scalable
    }

    fn supports_hinting(&self) -> bool {
        self.spec.hinting
    }

    fn kerning(&self, left: u32, right: u32) -> Point {
        Point::new(self.kerning.get(&(left, right)).copied().unwrap_or(0), 0)
    }

    fn size_metrics(&self) -> SizeMetrics {
        let size = self.pixel_size as i32;
        SizeMetrics {
            ascender: (3 * size / 4) * 64,
            descender: -(size / 4) * 64,
            height: size * 64,
        }
    }
}

/// Registry serving the given fake fonts by name.
pub fn fake_registry(fonts: &[(&str, FakeFaceSpec)]) -> FaceRegistry {
    fake_registry_with_log(fonts, FakeLog::default())
}

pub fn fake_registry_with_log(fonts: &[(&str, FakeFaceSpec)], log: FakeLog) -> FaceRegistry {
    let mut source = MemorySource::new();
    let mut specs = HashMap::default();
    for (name, spec) in fonts {
        source.insert(*name, format!("{FAKE_PREFIX}{name}").into_bytes());
        specs.insert(name.to_string(), spec.clone());
    }
    FaceRegistry::new(
        Box::new(move || {
            Ok(Box::new(FakeEngine::new(specs.clone(), log.clone())) as Box<dyn RasterEngine>)
        }),
        Box::new(source),
    )
}
