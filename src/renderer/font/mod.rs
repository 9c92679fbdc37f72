mod backend;
mod cache;
mod face;
mod layout;
mod loader;
mod registry;
mod text;
mod traits;
mod truetype;
mod ttfont;

#[doc(hidden)]
pub mod testing;

pub use backend::{open_font, BackendKind, FontBackend};
pub use cache::{GlyphCache, GlyphRecord};
pub use face::{FaceError, LoadFlags, PixelMode, RasterizedGlyph, RenderMode, SizeMetrics};
pub use layout::{DrawStats, GlyphMetrics, LayoutEngine, LayoutState, Measurement, PageLists};
pub use loader::{BatchLoader, LoadContext};
pub use registry::{
    EngineFactory, Face, FaceRegistry, FileSource, FontError, FontSource, MemorySource,
};
pub use text::CodePoints;
pub use traits::{RasterEngine, RasterFace};
pub use truetype::{TrueTypeEngine, TrueTypeFace};
pub use ttfont::{FontOptions, TrueTypeFont};
