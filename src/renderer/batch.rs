use bytemuck::{Pod, Zeroable};

use super::color::Color;
use super::context::TextureId;
use super::geometry::{Point, Rect, Size};

/// Glyph quads accumulated for one atlas page during a draw call.
#[derive(Debug, Default, Clone)]
pub struct RenderList {
    positions: Vec<Point>,
    source_rects: Vec<Rect>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Point, source_rect: Rect) {
        self.positions.push(position);
        self.source_rects.push(source_rect);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn source_rects(&self) -> &[Rect] {
        &self.source_rects
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.source_rects.clear();
    }
}

/// One batched draw call: every glyph from a single page texture.
#[derive(Debug, Clone, Copy)]
pub struct GlyphBatch<'a> {
    pub texture: TextureId,
    pub positions: &'a [Point],
    pub source_rects: &'a [Rect],
    pub color: Color,
    pub clip: Option<Rect>,
}

impl<'a> GlyphBatch<'a> {
    pub fn new(texture: TextureId, list: &'a RenderList, color: Color, clip: Option<Rect>) -> Self {
        Self {
            texture,
            positions: list.positions(),
            source_rects: list.source_rects(),
            color,
            clip,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate `(destination, source)` pairs.
    pub fn quads(&self) -> impl Iterator<Item = (Point, Rect)> + 'a {
        let positions: &'a [Point] = self.positions;
        let source_rects: &'a [Rect] = self.source_rects;
        positions.iter().copied().zip(source_rects.iter().copied())
    }

    /// Build GPU instances with UVs normalized to `texture_size`.
    pub fn instances(&self, texture_size: Size) -> Vec<GlyphInstance> {
        let color = self.color.to_linear_rgba();
        self.quads()
            .map(|(position, source)| GlyphInstance::new(position, source, texture_size, color))
            .collect()
    }
}

/// Per-glyph instance data for GPU submission.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GlyphInstance {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub uv_offset: [f32; 2],
    pub uv_size: [f32; 2],
    pub color: [f32; 4],
}

impl GlyphInstance {
    pub fn new(position: Point, source: Rect, texture_size: Size, color: [f32; 4]) -> Self {
        let tw = texture_size.width.max(1) as f32;
        let th = texture_size.height.max(1) as f32;
        Self {
            position: [position.x as f32, position.y as f32],
            size: [source.width() as f32, source.height() as f32],
            uv_offset: [source.min.x as f32 / tw, source.min.y as f32 / th],
            uv_size: [source.width() as f32 / tw, source.height() as f32 / th],
            color,
        }
    }
}
