use std::cell::RefCell;
use std::rc::Rc;

use image::RgbaImage;

use super::batch::GlyphBatch;
use super::geometry::{Point, Size};

/// Handle to a texture owned by a [`TextureHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Color format requested for a page texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 16-bit with a single alpha bit, used for monochrome glyph pages.
    Rgb5A1,
    /// 32-bit with 8-bit alpha, used for antialiased glyph pages.
    Rgba8,
}

/// Shape restrictions the host places on texture dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureConstraints {
    pub require_pot: bool,
    pub require_square: bool,
}

/// The image/texture side of the embedding renderer.
///
/// Glyph pages keep a CPU copy of their pixels and hand the whole image to
/// [`TextureHost::upload`] once per flush. Implementations decide how that maps
/// onto their texture objects.
pub trait TextureHost {
    /// Largest texture the host can create, if it can tell.
    fn max_texture_size(&self) -> Option<Size>;

    fn texture_constraints(&self) -> TextureConstraints {
        TextureConstraints::default()
    }

    /// Allocate a blank CPU image for a page texture.
    fn create_image(&self, _format: TextureFormat, size: Size) -> RgbaImage {
        RgbaImage::new(size.width, size.height)
    }

    /// Copy `src` into `dest` with its top-left corner at `origin`.
    fn blit(&self, src: &RgbaImage, dest: &mut RgbaImage, origin: Point) {
        image::imageops::replace(dest, src, origin.x as i64, origin.y as i64);
    }

    fn create_texture(
        &mut self,
        size: Size,
        name: &str,
        format: TextureFormat,
    ) -> Result<TextureId, HostError>;

    /// Replace the full contents of `texture` with `image`.
    fn upload(&mut self, texture: TextureId, image: &RgbaImage) -> Result<(), HostError>;

    fn remove_texture(&mut self, texture: TextureId);

    /// Issue one draw call covering every glyph quad in `batch`.
    fn draw_batch(&mut self, batch: &GlyphBatch<'_>);
}

/// Host shared between a font instance and the pages it creates.
///
/// Fonts are confined to one thread, so a `RefCell` is enough.
pub type SharedHost = Rc<RefCell<dyn TextureHost>>;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Failed to create texture {name} ({width}x{height})")]
    TextureCreation {
        name: String,
        width: u32,
        height: u32,
    },
    #[error("Unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("Texture upload failed: {0}")]
    Upload(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct NullHost;

    impl TextureHost for NullHost {
        fn max_texture_size(&self) -> Option<Size> {
            None
        }

        fn create_texture(
            &mut self,
            _size: Size,
            name: &str,
            _format: TextureFormat,
        ) -> Result<TextureId, HostError> {
            Err(HostError::TextureCreation {
                name: name.to_string(),
                width: 0,
                height: 0,
            })
        }

        fn upload(&mut self, texture: TextureId, _image: &RgbaImage) -> Result<(), HostError> {
            Err(HostError::UnknownTexture(texture))
        }

        fn remove_texture(&mut self, _texture: TextureId) {}

        fn draw_batch(&mut self, _batch: &GlyphBatch<'_>) {}
    }

    #[test]
    fn test_default_blit_places_source_at_origin() {
        let host = NullHost;
        let mut dest = host.create_image(TextureFormat::Rgba8, Size::new(8, 8));
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 200]));

        host.blit(&src, &mut dest, Point::new(3, 4));

        assert_eq!(dest.get_pixel(3, 4)[3], 200);
        assert_eq!(dest.get_pixel(4, 5)[3], 200);
        assert_eq!(dest.get_pixel(2, 4)[3], 0);
        assert_eq!(dest.get_pixel(5, 4)[3], 0);
    }

    #[test]
    fn test_default_constraints_are_unrestricted() {
        let host = NullHost;
        assert_eq!(host.texture_constraints(), TextureConstraints::default());
    }

    #[test]
    fn test_host_error_display() {
        let err = HostError::TextureCreation {
            name: "page".to_string(),
            width: 512,
            height: 512,
        };
        assert_eq!(err.to_string(), "Failed to create texture page (512x512)");
    }
}
