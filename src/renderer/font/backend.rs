use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::renderer::color::Color;
use crate::renderer::context::SharedHost;
use crate::renderer::geometry::{Rect, Size};

use super::layout::DrawStats;
use super::registry::{FaceRegistry, FontError};
use super::ttfont::{FontOptions, TrueTypeFont};

/// Text operations every font backend provides.
pub trait FontBackend {
    fn get_dimension(&mut self, text: &[u32]) -> Size;
    fn get_char_dimension(&mut self, codepoint: u32) -> Size;
    fn draw(
        &mut self,
        text: &[u32],
        rect: Rect,
        color: Color,
        center_h: bool,
        center_v: bool,
        clip: Option<Rect>,
    ) -> DrawStats;
    fn get_character_index_at(&mut self, text: &[u32], x: i32) -> Option<usize>;
    fn set_kerning_width(&mut self, width: i32);
    fn set_kerning_height(&mut self, height: i32);
    fn kerning_width(&self) -> i32;
    fn kerning_height(&self) -> i32;
    fn set_invisible_characters(&mut self, codepoints: &[u32]);
    fn set_batch_load_size(&mut self, batch_size: u32);
    fn set_max_page_texture_size(&mut self, size: Size);
    fn set_monochrome(&mut self, monochrome: bool);
    fn set_font_hinting(&mut self, enable: bool, enable_auto: bool);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    TrueType,
}

/// Open a font with the backend named by `kind`.
pub fn open_font(
    kind: BackendKind,
    registry: &FaceRegistry,
    host: SharedHost,
    path: &Path,
    options: &FontOptions,
) -> Result<Box<dyn FontBackend>, FontError> {
    match kind {
        BackendKind::TrueType => Ok(Box::new(TrueTypeFont::new(registry, host, path, options)?)),
    }
}

impl FontBackend for TrueTypeFont {
    fn get_dimension(&mut self, text: &[u32]) -> Size {
        TrueTypeFont::get_dimension(self, text)
    }

    fn get_char_dimension(&mut self, codepoint: u32) -> Size {
        TrueTypeFont::get_char_dimension(self, codepoint)
    }

    fn draw(
        &mut self,
        text: &[u32],
        rect: Rect,
        color: Color,
        center_h: bool,
        center_v: bool,
        clip: Option<Rect>,
    ) -> DrawStats {
        TrueTypeFont::draw(self, text, rect, color, center_h, center_v, clip)
    }

    fn get_character_index_at(&mut self, text: &[u32], x: i32) -> Option<usize> {
        TrueTypeFont::get_character_index_at(self, text, x)
    }

    fn set_kerning_width(&mut self, width: i32) {
        TrueTypeFont::set_kerning_width(self, width);
    }

    fn set_kerning_height(&mut self, height: i32) {
        TrueTypeFont::set_kerning_height(self, height);
    }

    fn kerning_width(&self) -> i32 {
        TrueTypeFont::kerning_width(self)
    }

    fn kerning_height(&self) -> i32 {
        TrueTypeFont::kerning_height(self)
    }

    fn set_invisible_characters(&mut self, codepoints: &[u32]) {
        TrueTypeFont::set_invisible_characters(self, codepoints);
    }

    fn set_batch_load_size(&mut self, batch_size: u32) {
        TrueTypeFont::set_batch_load_size(self, batch_size);
    }

    fn set_max_page_texture_size(&mut self, size: Size) {
        TrueTypeFont::set_max_page_texture_size(self, size);
    }

    fn set_monochrome(&mut self, monochrome: bool) {
        TrueTypeFont::set_monochrome(self, monochrome);
    }

    fn set_font_hinting(&mut self, enable: bool, enable_auto: bool) {
        TrueTypeFont::set_font_hinting(self, enable, enable_auto);
    }
}
