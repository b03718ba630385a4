//! Geometry and color types, and parameter structs for the bulk draw calls.

use crate::error::{RenderError, RenderResult};
use crate::path::Path;
use crate::transform::Transform2D;

/// A straight (non-premultiplied) RGBA color with components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from RGB components.
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Parse a CSS color string such as "#ff0000" or "rgba(0, 0, 255, 0.5)".
    pub fn parse(s: &str) -> RenderResult<Self> {
        let parsed = csscolorparser::parse(s)
            .map_err(|e| RenderError::invalid(format!("Invalid color {s:?}: {e}")))?;
        let [r, g, b, a] = parsed.to_array();
        Ok(Self::new(r as f64, g as f64, b as f64, a as f64))
    }

    /// Replace the alpha channel when an override is given.
    pub fn with_alpha_override(self, alpha: Option<f64>) -> Self {
        match alpha {
            Some(a) => Self { a, ..self },
            None => self,
        }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::BLACK
    }
}

impl From<Rgba> for tiny_skia::Color {
    fn from(c: Rgba) -> Self {
        tiny_skia::Color::from_rgba(
            c.r.clamp(0.0, 1.0) as f32,
            c.g.clamp(0.0, 1.0) as f32,
            c.b.clamp(0.0, 1.0) as f32,
            c.a.clamp(0.0, 1.0) as f32,
        )
        .unwrap_or(tiny_skia::Color::BLACK)
    }
}

/// A clip rectangle in user space (origin at the bottom left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A floating point rectangle in device space, given by its corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bbox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Bbox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Grow to include another box.
    pub(crate) fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub(crate) fn from_rect(rect: tiny_skia::Rect) -> Bbox {
        Bbox {
            x0: rect.left() as f64,
            y0: rect.top() as f64,
            x1: rect.right() as f64,
            y1: rect.bottom() as f64,
        }
    }
}

/// An integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl IntRect {
    pub(crate) fn union(&self, other: &IntRect) -> IntRect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        IntRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// An owned RGBA image.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    /// Pixel data, 4 bytes per pixel, rows packed without padding.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbaImage {
    /// Wrap raw bytes, checking that the length matches the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> RenderResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(RenderError::invalid(format!(
                "Image data has {} bytes, expected {}x{}x4",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }
}

/// Where collection offsets live before the offset transform is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetPosition {
    /// Offsets are in screen space.
    #[default]
    Screen,
    /// Offsets are in data space and must be pushed through the per-path transforms.
    Data,
}

/// Dash specification in points: optional offset plus optional on/off list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashSpec {
    pub offset: Option<f64>,
    pub dashes: Option<Vec<f64>>,
}

impl DashSpec {
    pub fn solid() -> Self {
        Self::default()
    }

    pub fn new(offset: f64, dashes: Vec<f64>) -> Self {
        Self {
            offset: Some(offset),
            dashes: Some(dashes),
        }
    }
}

/// Parameters for drawing a collection of paths.
///
/// Per-element attributes cycle: element `i` uses `paths[i % paths.len()]`,
/// `transforms[i % transforms.len()]` and so on, for
/// `max(paths.len(), transforms.len(), offsets.len())` elements.
#[derive(Debug, Clone)]
pub struct PathCollection<'a> {
    pub master_transform: &'a Transform2D,
    pub paths: &'a [Path],
    pub transforms: &'a [Transform2D],
    pub offsets: &'a [[f64; 2]],
    pub offset_transform: &'a Transform2D,
    pub facecolors: &'a [Rgba],
    pub edgecolors: &'a [Rgba],
    /// Line widths in points; empty means the current line width.
    pub linewidths: &'a [f64],
    pub dashes: &'a [DashSpec],
    pub antialiaseds: &'a [bool],
    pub offset_position: OffsetPosition,
}

/// Parameters for drawing a quadrilateral mesh.
#[derive(Debug, Clone)]
pub struct QuadMesh<'a> {
    pub master_transform: &'a Transform2D,
    /// Number of cells along x.
    pub mesh_width: usize,
    /// Number of cells along y.
    pub mesh_height: usize,
    /// `(mesh_height + 1) * (mesh_width + 1)` grid points, row-major.
    pub coordinates: &'a [[f64; 2]],
    pub offsets: &'a [[f64; 2]],
    pub offset_transform: &'a Transform2D,
    /// One color per cell (or a single color for all cells).
    pub facecolors: &'a [Rgba],
    pub antialiased: bool,
    /// Optional cell edge colors; the index wraps around when shorter than the cell count.
    pub edgecolors: &'a [Rgba],
}
