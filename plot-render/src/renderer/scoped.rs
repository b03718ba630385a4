//! Applying the state stack around a single draw call.

use crate::geometry::ClipRect;
use crate::state::AdditionalState;
use crate::surface::{Canvas, Source};
use std::ops::{Deref, DerefMut};
use tiny_skia::{FillRule, PathBuilder, Rect};

/// Canvas access with the top [`AdditionalState`] applied.
///
/// Entering saves the canvas state, applies the alpha override to the
/// foreground color, resolves the antialias mode against the current line
/// width, and intersects the clip with the clip rectangle and clip path.
/// Dropping the guard restores the canvas, also when the draw call fails.
pub(crate) struct AdditionalContext<'c> {
    canvas: &'c mut Canvas,
}

impl<'c> AdditionalContext<'c> {
    pub(crate) fn enter(canvas: &'c mut Canvas, state: &AdditionalState, height: f64) -> Self {
        canvas.save();

        let foreground = match &canvas.gstate().source {
            Source::Solid(color) => Some(*color),
            Source::Tile { .. } => None,
        };
        if let Some(color) = foreground {
            canvas.set_source_rgba(color.with_alpha_override(state.alpha));
        }

        let antialias = state.antialias.resolve(canvas.gstate().line_width);
        canvas.set_antialias(antialias);

        if let Some(rect) = state.clip_rectangle.as_ref().and_then(|r| device_rect(r, height)) {
            canvas.clip(PathBuilder::from_rect(rect), FillRule::Winding);
        }
        if let Some(clip_path) = &state.clip_path {
            canvas.clip(clip_path.path().clone(), FillRule::Winding);
        }

        Self { canvas }
    }
}

impl Deref for AdditionalContext<'_> {
    type Target = Canvas;

    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl DerefMut for AdditionalContext<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for AdditionalContext<'_> {
    fn drop(&mut self) {
        self.canvas.restore();
    }
}

/// Flip a user-space clip rectangle into device space. Empty rectangles stay
/// empty and clip everything away.
fn device_rect(rect: &ClipRect, height: f64) -> Option<Rect> {
    let x0 = rect.x.min(rect.x + rect.width);
    let x1 = rect.x.max(rect.x + rect.width);
    let y0 = height - rect.y.max(rect.y + rect.height);
    let y1 = height - rect.y.min(rect.y + rect.height);
    Rect::from_ltrb(x0 as f32, y0 as f32, x1 as f32, y1 as f32)
}
