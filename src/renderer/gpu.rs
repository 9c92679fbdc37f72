//! Texture host backed by a wgpu device.
//!
//! Pages become `Rgba8Unorm` textures filled with `Queue::write_texture`.
//! Draw batches are turned into instance data and queued until the caller's
//! render pass collects them with [`WgpuHost::take_batches`].

use std::collections::HashMap;

use ahash::RandomState;
use image::RgbaImage;

use super::batch::{GlyphBatch, GlyphInstance};
use super::context::{HostError, TextureConstraints, TextureFormat, TextureHost, TextureId};
use super::geometry::{Rect, Size};

/// Instances for one page texture, ready for a single instanced draw.
pub struct GpuBatch {
    pub texture: TextureId,
    pub instances: Vec<GlyphInstance>,
    pub clip: Option<Rect>,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Size,
}

pub struct WgpuHost {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureId, GpuTexture, RandomState>,
    next_id: u32,
    batches: Vec<GpuBatch>,
}

/// Page pixels are always staged as 8-bit RGBA; 1-bit alpha pages upload
/// through the same format.
pub fn wgpu_format(_format: TextureFormat) -> wgpu::TextureFormat {
    wgpu::TextureFormat::Rgba8Unorm
}

impl WgpuHost {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::default(),
            next_id: 1,
            batches: Vec::new(),
        }
    }

    pub fn texture_view(&self, texture: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(&texture).map(|t| &t.view)
    }

    /// Batches queued since the last call, in submission order.
    pub fn take_batches(&mut self) -> Vec<GpuBatch> {
        std::mem::take(&mut self.batches)
    }
}

impl TextureHost for WgpuHost {
    fn max_texture_size(&self) -> Option<Size> {
        Some(Size::square(self.device.limits().max_texture_dimension_2d))
    }

    fn texture_constraints(&self) -> TextureConstraints {
        TextureConstraints::default()
    }

    fn create_texture(
        &mut self,
        size: Size,
        name: &str,
        format: TextureFormat,
    ) -> Result<TextureId, HostError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if size.is_empty() || size.width > max || size.height > max {
            return Err(HostError::TextureCreation {
                name: name.to_string(),
                width: size.width,
                height: size.height,
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.textures.insert(id, GpuTexture { texture, view, size });
        Ok(id)
    }

    fn upload(&mut self, texture: TextureId, image: &RgbaImage) -> Result<(), HostError> {
        let entry = self
            .textures
            .get(&texture)
            .ok_or(HostError::UnknownTexture(texture))?;
        let (width, height) = image.dimensions();
        if (width, height) != (entry.size.width, entry.size.height) {
            return Err(HostError::Upload(format!(
                "size mismatch: {}x{} into {}x{}",
                width, height, entry.size.width, entry.size.height
            )));
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn remove_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            entry.texture.destroy();
        }
    }

    fn draw_batch(&mut self, batch: &GlyphBatch<'_>) {
        let Some(entry) = self.textures.get(&batch.texture) else {
            log::warn!("Draw with unknown texture {:?}", batch.texture);
            return;
        };
        self.batches.push(GpuBatch {
            texture: batch.texture,
            instances: batch.instances(entry.size),
            clip: batch.clip,
        });
    }
}
