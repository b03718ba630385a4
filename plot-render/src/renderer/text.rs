//! Text drawing and measurement.

use super::scoped::AdditionalContext;
use super::{GraphicsContext, Renderer};
use crate::error::{RenderError, RenderResult};
use crate::text::mathtext::{MathText, MathtextBackend};
use crate::text::FontProps;
use tiny_skia::{FillRule, Transform};

impl Renderer {
    /// Lay out a math expression with the installed engine.
    pub fn layout_math(&mut self, expr: &str, props: &FontProps) -> RenderResult<MathText> {
        let layout = self
            .math_layout
            .as_deref()
            .ok_or_else(|| RenderError::unsupported("No math layout engine installed"))?;
        let dpi = self.config.dpi;
        let mut backend = MathtextBackend::new(&mut self.shaper, dpi);
        layout.layout(expr, dpi, props, &mut backend)?;
        Ok(backend.finish())
    }

    /// Draw `s` with its baseline origin at user-space `(x, y)`, rotated
    /// counter-clockwise by `angle` degrees.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_text(
        &mut self,
        gc: GraphicsContext,
        x: f64,
        y: f64,
        s: &str,
        props: &FontProps,
        angle: f64,
        ismath: bool,
    ) -> RenderResult<()> {
        self.check_gc(gc)?;
        log::debug!(target: "render", "draw_text {:?} at {} {} ({} deg)", s, x, y, angle);
        let height = self.height() as f64;
        let placement =
            Transform::from_rotate(-angle as f32).post_translate(x as f32, (height - y) as f32);

        if ismath {
            let math = self.layout_math(s, props)?;
            let state = self.states.current();
            let tint = self.foreground().with_alpha_override(state.alpha);
            let origin = Transform::from_translate(0.0, -math.to_baseline as f32).post_concat(placement);
            let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
            return ctx.replay(math.recording.commands(), origin, Some(tint));
        }

        let shaped = self.shaper.shape(s, props, self.config.dpi)?;
        let state = self.states.current();
        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
        match shaped.outline() {
            Some(outline) => ctx.fill(&outline, FillRule::Winding, placement),
            None => Ok(()),
        }
    }

    /// Width, height and descent of `s` in pixels.
    pub fn get_text_width_height_descent(
        &mut self,
        s: &str,
        props: &FontProps,
        ismath: bool,
    ) -> RenderResult<(f64, f64, f64)> {
        if ismath {
            Ok(self.layout_math(s, props)?.width_height_descent())
        } else {
            Ok(self.shaper.shape(s, props, self.config.dpi)?.width_height_descent())
        }
    }
}
