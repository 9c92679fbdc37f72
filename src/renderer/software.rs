use std::collections::HashMap;

use ahash::RandomState;
use image::{Rgba, RgbaImage};

use super::batch::GlyphBatch;
use super::color::{mul_u8, Color};
use super::context::{HostError, TextureConstraints, TextureFormat, TextureHost, TextureId};
use super::geometry::{Point, Rect, Size};

/// Counters for what the host has been asked to do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    pub textures_created: usize,
    pub textures_removed: usize,
    pub uploads: usize,
    pub draw_calls: usize,
    pub glyphs_drawn: usize,
}

struct SoftTexture {
    name: String,
    format: TextureFormat,
    pixels: RgbaImage,
}

/// CPU texture host that composites glyph batches onto an RGBA canvas.
pub struct SoftwareHost {
    textures: HashMap<TextureId, SoftTexture, RandomState>,
    next_id: u32,
    max_texture_size: Option<Size>,
    constraints: TextureConstraints,
    canvas: RgbaImage,
    stats: HostStats,
}

impl SoftwareHost {
    pub fn new(canvas_size: Size) -> Self {
        Self {
            textures: HashMap::default(),
            next_id: 1,
            max_texture_size: None,
            constraints: TextureConstraints::default(),
            canvas: RgbaImage::new(canvas_size.width, canvas_size.height),
            stats: HostStats::default(),
        }
    }

    pub fn with_max_texture_size(mut self, size: Option<Size>) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn with_constraints(mut self, constraints: TextureConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn clear_canvas(&mut self, color: Color) {
        let px = Rgba([color.r, color.g, color.b, color.a]);
        for pixel in self.canvas.pixels_mut() {
            *pixel = px;
        }
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_image(&self, texture: TextureId) -> Option<&RgbaImage> {
        self.textures.get(&texture).map(|t| &t.pixels)
    }

    pub fn texture_name(&self, texture: TextureId) -> Option<&str> {
        self.textures.get(&texture).map(|t| t.name.as_str())
    }

    pub fn texture_format(&self, texture: TextureId) -> Option<TextureFormat> {
        self.textures.get(&texture).map(|t| t.format)
    }

    fn canvas_rect(&self) -> Rect {
        Rect::new(0, 0, self.canvas.width() as i32, self.canvas.height() as i32)
    }
}

impl TextureHost for SoftwareHost {
    fn max_texture_size(&self) -> Option<Size> {
        self.max_texture_size
    }

    fn texture_constraints(&self) -> TextureConstraints {
        self.constraints
    }

    fn create_texture(
        &mut self,
        size: Size,
        name: &str,
        format: TextureFormat,
    ) -> Result<TextureId, HostError> {
        let too_large = self
            .max_texture_size
            .is_some_and(|max| size.width > max.width || size.height > max.height);
        if size.is_empty() || too_large {
            return Err(HostError::TextureCreation {
                name: name.to_string(),
                width: size.width,
                height: size.height,
            });
        }

        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.textures.insert(
            id,
            SoftTexture {
                name: name.to_string(),
                format,
                pixels: RgbaImage::new(size.width, size.height),
            },
        );
        self.stats.textures_created += 1;
        Ok(id)
    }

    fn upload(&mut self, texture: TextureId, image: &RgbaImage) -> Result<(), HostError> {
        let entry = self
            .textures
            .get_mut(&texture)
            .ok_or(HostError::UnknownTexture(texture))?;
        if entry.pixels.dimensions() != image.dimensions() {
            return Err(HostError::Upload(format!(
                "size mismatch for {}: {:?} vs {:?}",
                entry.name,
                entry.pixels.dimensions(),
                image.dimensions()
            )));
        }
        entry.pixels.clone_from(image);
        self.stats.uploads += 1;
        Ok(())
    }

    fn remove_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.stats.textures_removed += 1;
        }
    }

    fn draw_batch(&mut self, batch: &GlyphBatch<'_>) {
        let clip = match batch.clip {
            Some(clip) => clip.intersect(&self.canvas_rect()),
            None => self.canvas_rect(),
        };
        let Some(texture) = self.textures.get(&batch.texture) else {
            log::warn!("Draw with unknown texture {:?}", batch.texture);
            return;
        };
        self.stats.draw_calls += 1;
        if clip.is_empty() {
            return;
        }

        let color = batch.color;
        let (tw, th) = texture.pixels.dimensions();
        for (position, source) in batch.quads() {
            self.stats.glyphs_drawn += 1;
            for sy in 0..source.height().max(0) {
                for sx in 0..source.width().max(0) {
                    let dest = position + Point::new(sx, sy);
                    if !clip.contains(dest) {
                        continue;
                    }
                    let tx = (source.min.x + sx) as u32;
                    let ty = (source.min.y + sy) as u32;
                    if tx >= tw || ty >= th {
                        continue;
                    }
                    let texel = texture.pixels.get_pixel(tx, ty);
                    let alpha = mul_u8(texel[3], color.a);
                    if alpha == 0 {
                        continue;
                    }
                    let src = [
                        mul_u8(texel[0], color.r),
                        mul_u8(texel[1], color.g),
                        mul_u8(texel[2], color.b),
                    ];
                    let dst = self.canvas.get_pixel_mut(dest.x as u32, dest.y as u32);
                    blend_over(dst, src, alpha);
                }
            }
        }
    }
}

fn blend_over(dst: &mut Rgba<u8>, src: [u8; 3], alpha: u8) {
    let inv = 255 - alpha;
    for (channel, value) in src.into_iter().enumerate() {
        dst[channel] = mul_u8(value, alpha).saturating_add(mul_u8(dst[channel], inv));
    }
    dst[3] = alpha.saturating_add(mul_u8(dst[3], inv));
}
