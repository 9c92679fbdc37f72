use crate::renderer::Size;

/// U+FFFD, drawn in place of code points the face cannot map.
pub const REPLACEMENT_CHARACTER: u32 = 0xFFFD;

pub const DEFAULT_FONT_SIZE: u32 = 16;
pub const DEFAULT_BATCH_LOAD_SIZE: u32 = 1;
pub const DEFAULT_INVISIBLE_CHARACTERS: &str = " ";

/// Page limit used when the host cannot report its maximum texture size.
pub const DEFAULT_MAX_PAGE_SIZE: Size = Size::square(2048);

/// Page edge length by font pixel size: the first row whose bound is not
/// exceeded wins, anything larger gets the last edge.
pub const PAGE_EDGE_TABLE: [(u32, u32); 4] = [(20, 512), (51, 1024), (102, 2048), (204, 4096)];
pub const LARGEST_PAGE_EDGE: u32 = 8192;

/// Unmapped code points from here on are treated as full-width.
pub const FULL_WIDTH_FALLBACK_START: u32 = 0x2000;

/// Characters whose bitmaps decide the measured line height.
pub const LINE_HEIGHT_PROBES: [char; 3] = ['g', 'j', '_'];

pub const ASCII_PRELOAD_END: u32 = 128;

pub const DEFAULT_CANVAS_WIDTH: u32 = 640;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 120;
