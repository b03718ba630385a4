//! Recording of laid out math expressions.
//!
//! Math layout is done by an external engine that reports where each glyph
//! and each filled rule goes. [`MathtextBackend`] receives those reports,
//! turns them into device-space fills on a [`Recording`] and keeps track of
//! the inked extents, so the expression can be measured and then replayed at
//! its final position.

use super::{FontProps, FontRef, Shaper};
use crate::error::RenderResult;
use crate::geometry::Bbox;
use crate::surface::Recording;
use tiny_skia::{FillRule, Rect, Transform};

/// Ink bounds of a glyph relative to its origin, y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// One glyph placed by the math layout engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MathGlyph {
    pub font: FontRef,
    /// Size in points.
    pub fontsize: f64,
    pub codepoint: char,
    pub bounds: GlyphBounds,
}

/// Receiver of math layout output. Coordinates are in pixels, y down, with
/// the origin at the top left of the expression.
pub trait MathSink {
    /// Overall size of the expression; `depth` is the part below the baseline.
    fn set_canvas_size(&mut self, width: f64, height: f64, depth: f64);

    /// Draw `glyph` with its origin at `(ox, oy)`.
    fn render_glyph(&mut self, ox: f64, oy: f64, glyph: &MathGlyph) -> RenderResult<()>;

    /// Fill the axis-aligned rectangle between the two corners.
    fn render_rect_filled(&mut self, x1: f64, y1: f64, x2: f64, y2: f64);
}

/// A math layout engine.
pub trait MathLayout {
    /// Lay out `expr` for `dpi` and report the result to `sink`.
    fn layout(
        &self,
        expr: &str,
        dpi: f64,
        props: &FontProps,
        sink: &mut dyn MathSink,
    ) -> RenderResult<()>;
}

/// A recorded math expression and its metrics.
#[derive(Debug, Clone)]
pub struct MathText {
    pub recording: Recording,
    /// Inked extents, y down, relative to the top left of the expression.
    pub extents: Bbox,
    /// Distance from the top of the expression to its baseline.
    pub to_baseline: f64,
}

impl MathText {
    /// Width, height and descent below the baseline (never negative).
    pub fn width_height_descent(&self) -> (f64, f64, f64) {
        (
            self.extents.width(),
            self.extents.height(),
            (self.extents.y1 - self.to_baseline).max(0.0),
        )
    }
}

/// [`MathSink`] that records into a [`Recording`].
pub(crate) struct MathtextBackend<'a> {
    shaper: &'a mut Shaper,
    dpi: f64,
    recording: Recording,
    extents: Option<Bbox>,
    to_baseline: f64,
}

impl<'a> MathtextBackend<'a> {
    pub(crate) fn new(shaper: &'a mut Shaper, dpi: f64) -> Self {
        Self {
            shaper,
            dpi,
            recording: Recording::new(),
            extents: None,
            to_baseline: 0.0,
        }
    }

    fn include(&mut self, bbox: Bbox) {
        self.extents = Some(match self.extents {
            Some(extents) => extents.union(&bbox),
            None => bbox,
        });
    }

    pub(crate) fn finish(self) -> MathText {
        MathText {
            recording: self.recording,
            extents: self.extents.unwrap_or_default(),
            to_baseline: self.to_baseline,
        }
    }
}

impl MathSink for MathtextBackend<'_> {
    fn set_canvas_size(&mut self, _width: f64, height: f64, _depth: f64) {
        self.to_baseline = height;
    }

    fn render_glyph(&mut self, ox: f64, oy: f64, glyph: &MathGlyph) -> RenderResult<()> {
        let props = FontProps::new(glyph.font.clone(), glyph.fontsize);
        let shaped = self
            .shaper
            .shape(glyph.codepoint.encode_utf8(&mut [0; 4]), &props, self.dpi)?;
        let placement = Transform::from_translate(ox as f32, oy as f32);
        if let Some(path) = shaped.outline().and_then(|outline| outline.transform(placement)) {
            self.recording.fill(path, FillRule::Winding);
        }
        // Glyph bounds are y up; flip them around the origin.
        let b = glyph.bounds;
        self.include(Bbox::new(ox + b.xmin, oy - b.ymax, ox + b.xmax, oy - b.ymin));
        Ok(())
    }

    fn render_rect_filled(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let rect = Rect::from_ltrb(
            x1.min(x2) as f32,
            y1.min(y2) as f32,
            x1.max(x2) as f32,
            y1.max(y2) as f32,
        );
        if let Some(rect) = rect {
            self.recording
                .fill(tiny_skia::PathBuilder::from_rect(rect), FillRule::Winding);
        }
        self.include(Bbox::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)));
    }
}
