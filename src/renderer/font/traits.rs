use crate::renderer::font::{FaceError, LoadFlags, RasterizedGlyph, SizeMetrics};
use crate::renderer::geometry::Point;

/// A parsed font file inside a rasterizer engine.
///
/// Glyph id 0 is the missing glyph. Kerning and advances use 26.6 fixed
/// point for scalable faces and whole pixels otherwise.
pub trait RasterFace {
    fn family_name(&self) -> Option<String> {
        None
    }
    fn glyph_count(&self) -> u32;
    fn set_pixel_size(&mut self, size: u32) -> Result<(), FaceError>;
    fn char_to_glyph_index(&self, codepoint: u32) -> u32;
    fn load_glyph(&mut self, glyph_id: u32, flags: LoadFlags)
        -> Result<RasterizedGlyph, FaceError>;
    fn has_kerning(&self) -> bool;
    fn is_scalable(&self) -> bool;
    /// Whether `NO_HINTING` and `NO_AUTOHINT` change the rendered bitmaps.
    fn supports_hinting(&self) -> bool {
        true
    }
    fn kerning(&self, left: u32, right: u32) -> Point;
    fn size_metrics(&self) -> SizeMetrics;
}

/// Process-wide rasterizer library state that opens faces.
pub trait RasterEngine {
    fn name(&self) -> &str;
    fn open_face(&mut self, bytes: &[u8]) -> Result<Box<dyn RasterFace>, FaceError>;
}
