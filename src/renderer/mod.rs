pub mod atlas;
mod batch;
mod color;
mod context;
pub mod font;
mod geometry;
#[cfg(feature = "gpu")]
pub mod gpu;
mod software;

pub use atlas::{page_edge_for, GlyphPage, PageAllocator, PageError};
pub use batch::{GlyphBatch, GlyphInstance, RenderList};
pub use color::Color;
pub use context::{
    HostError, SharedHost, TextureConstraints, TextureFormat, TextureHost, TextureId,
};
pub use geometry::{Point, Rect, Size};
pub use software::{HostStats, SoftwareHost};
