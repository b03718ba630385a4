//! Vector-graphics rendering backend for plotting libraries.
//!
//! Draws paths, markers, path collections, quad meshes, Gouraud triangles,
//! images and text onto a raster or recording surface. It uses:
//! - `tiny-skia` for rasterization
//! - `cosmic-text` for text shaping and glyph outlines
//! - `fontdb` for the font database handed to cosmic-text
//! - `kurbo` for affine matrix algebra
//!
//! Coordinates passed in are in user space with the origin at the bottom
//! left; the renderer flips them into device space (origin top left).
//!
//! # Example
//!
//! ```rust,ignore
//! use plot_render::{Path, Renderer, RendererConfig, Rgba, Transform2D};
//!
//! let mut renderer = Renderer::new_raster(100, 100, RendererConfig::default())?;
//! let gc = renderer.gc();
//! renderer.set_foreground(Rgba::rgb(1.0, 0.0, 0.0));
//! renderer.set_linewidth(1.0);
//! let line = Path::polyline(vec![[10.0, 10.0], [90.0, 90.0]]);
//! renderer.draw_path(gc, &line, &Transform2D::identity(), None)?;
//! let pixels = renderer.get_buffer()?;
//! ```

mod config;
mod error;
mod font_config;
mod geometry;
mod hatch;
mod markers;
mod mesh;
pub mod path;
mod pattern_cache;
mod renderer;
mod state;
mod style;
mod surface;
pub mod text;
mod transform;

// Re-export public API
pub use config::{RendererConfig, ShapingMode, DEFAULT_SIMPLIFY_THRESHOLD};
pub use error::{RenderError, RenderResult};
pub use font_config::{font_config_to_fontdb, CustomFont, FontConfig};
pub use geometry::{
    Bbox, ClipRect, DashSpec, IntRect, OffsetPosition, PathCollection, QuadMesh, Rgba, RgbaImage,
};
pub use hatch::hatch_path;
pub use markers::{stamp_grid_size, MarkerDraw, MARKER_STAMP_MIN_THRESHOLD};
pub use mesh::MeshTriangle;
pub use path::{Path, PathCode, SketchParams, Snapper};
pub use pattern_cache::CacheStats;
pub use renderer::{CollectionStats, Dispatch, GraphicsContext, Region, Renderer};
pub use state::{AdditionalState, ClipPath, StateStack};
pub use style::{
    Antialias, AntialiasSetting, LineCap, LineJoin, PRECISE_ANTIALIAS_MAX_LINE_WIDTH,
};
pub use surface::{Page, Recording, RecordingSurface, Surface, SurfaceKind, MAX_DIMENSION};
pub use text::mathtext::{GlyphBounds, MathGlyph, MathLayout, MathSink, MathText};
pub use text::{FontProps, FontRef, ShapedText};
pub use transform::{device_matrix, relative_matrix, Transform2D};
