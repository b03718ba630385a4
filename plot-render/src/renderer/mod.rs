//! The renderer: one drawing target plus its state stack.
//!
//! Attribute setters only record values; they take effect when a draw call
//! opens its [`AdditionalContext`](scoped::AdditionalContext). Every draw call
//! takes the [`GraphicsContext`] token that this renderer handed out.

mod draw;
mod region;
mod scoped;
mod text;

pub use draw::{CollectionStats, Dispatch};
pub use region::Region;

use crate::config::RendererConfig;
use crate::error::{RenderError, RenderResult};
use crate::geometry::{ClipRect, IntRect, Rgba};
use crate::path::{load_path, Path, SketchParams, Snapper};
use crate::state::{AdditionalState, ClipPath, StateStack};
use crate::style::{AntialiasSetting, LineCap, LineJoin};
use crate::surface::{Canvas, Source, Surface, SurfaceKind};
use crate::text::mathtext::MathLayout;
use crate::text::Shaper;
use crate::transform::{device_matrix, Transform2D};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RENDERER_ID: AtomicU64 = AtomicU64::new(1);

/// Token tying draw calls to the renderer that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsContext {
    renderer_id: u64,
}

/// Renders paths, collections, meshes, images and text onto one surface.
pub struct Renderer {
    id: u64,
    canvas: Canvas,
    states: StateStack,
    config: RendererConfig,
    shaper: Shaper,
    math_layout: Option<Box<dyn MathLayout>>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("id", &self.id)
            .field("kind", &self.canvas.kind())
            .field("size", &self.canvas.size())
            .field("dpi", &self.config.dpi)
            .field("state_depth", &self.states.depth())
            .finish()
    }
}

impl Renderer {
    /// Render into a new transparent pixel buffer.
    pub fn new_raster(width: u32, height: u32, config: RendererConfig) -> RenderResult<Self> {
        Ok(Self::from_surface(Surface::raster(width, height)?, config))
    }

    /// Record into a new multi-page vector surface.
    pub fn new_vector(width: u32, height: u32, config: RendererConfig) -> RenderResult<Self> {
        Ok(Self::from_surface(Surface::vector(width, height)?, config))
    }

    /// Render onto an existing surface.
    pub fn from_surface(surface: Surface, config: RendererConfig) -> Self {
        let id = NEXT_RENDERER_ID.fetch_add(1, Ordering::Relaxed);
        let base = AdditionalState::new(config.hatch_color, config.hatch_linewidth);
        let shaper = Shaper::new(config.font.clone(), config.shaping);
        let mut renderer = Self {
            id,
            canvas: Canvas::new(surface),
            states: StateStack::new(base),
            config,
            shaper,
            math_layout: None,
        };
        renderer.set_linewidth(1.0);
        log::debug!(
            target: "render",
            "new {:?} renderer {}x{} at {} dpi",
            renderer.canvas.kind(),
            renderer.width(),
            renderer.height(),
            renderer.config.dpi
        );
        renderer
    }

    /// Install the engine used for math text.
    pub fn set_math_layout(&mut self, layout: Box<dyn MathLayout>) {
        self.math_layout = Some(layout);
    }

    pub fn surface(&self) -> &Surface {
        self.canvas.surface()
    }

    /// Give up the renderer and keep its surface.
    pub fn into_surface(self) -> Surface {
        self.canvas.into_surface()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    // --- Graphics contexts and the state stack ---

    /// Token for the current state.
    pub fn gc(&self) -> GraphicsContext {
        GraphicsContext {
            renderer_id: self.id,
        }
    }

    /// Push a copy of the current state and return a token for it.
    pub fn new_gc(&mut self) -> GraphicsContext {
        self.canvas.save();
        self.states.push();
        log::debug!(target: "render", "save (depth {})", self.states.depth());
        self.gc()
    }

    /// Pop the state pushed by the matching [`new_gc`](Self::new_gc).
    pub fn restore(&mut self) -> RenderResult<()> {
        self.states.pop()?;
        self.canvas.restore();
        log::debug!(target: "render", "restore (depth {})", self.states.depth());
        Ok(())
    }

    /// Number of state frames, including the base frame.
    pub fn state_depth(&self) -> usize {
        self.states.depth()
    }

    /// Properties live on the renderer, so copying only checks the token.
    pub fn copy_properties(&mut self, gc: GraphicsContext) -> RenderResult<()> {
        self.check_gc(gc)
    }

    pub(crate) fn check_gc(&self, gc: GraphicsContext) -> RenderResult<()> {
        if gc.renderer_id != self.id {
            return Err(RenderError::invalid("Non-matching GraphicsContext"));
        }
        Ok(())
    }

    fn state(&self) -> &AdditionalState {
        self.states.current()
    }

    fn state_mut(&mut self) -> &mut AdditionalState {
        self.states.current_mut()
    }

    // --- Setters ---

    /// Override the alpha of everything drawn; `None` uses each color's own.
    pub fn set_alpha(&mut self, alpha: Option<f64>) {
        self.state_mut().alpha = alpha;
    }

    pub fn set_antialiased(&mut self, antialias: impl Into<AntialiasSetting>) {
        self.state_mut().antialias = antialias.into();
    }

    pub fn set_capstyle(&mut self, capstyle: &str) -> RenderResult<()> {
        let cap: LineCap = capstyle.parse()?;
        self.canvas.set_line_cap(cap);
        Ok(())
    }

    pub fn set_joinstyle(&mut self, joinstyle: &str) -> RenderResult<()> {
        let join: LineJoin = joinstyle.parse()?;
        self.canvas.set_line_join(join);
        Ok(())
    }

    /// Clip rectangle in user space (origin at the bottom left).
    pub fn set_clip_rectangle(&mut self, rect: Option<ClipRect>) {
        self.state_mut().clip_rectangle = rect;
    }

    /// Clip to `path` under `transform`; `None` removes the clip path.
    pub fn set_clip_path(&mut self, clip: Option<(&Path, &Transform2D)>) -> RenderResult<()> {
        let clip_path = match clip {
            Some((path, transform)) => {
                let matrix = device_matrix(transform, self.height() as f64)?;
                load_path(path, &matrix, Snapper::Off).map(ClipPath::new)
            }
            None => None,
        };
        self.state_mut().clip_path = clip_path;
        Ok(())
    }

    /// Dash offset and on/off lengths, in points. A list needs an offset.
    pub fn set_dashes(&mut self, offset: Option<f64>, dashes: Option<&[f64]>) -> RenderResult<()> {
        match self.dash_to_pixels(offset, dashes)? {
            Some((list, offset)) => self.canvas.set_dash(&list, offset),
            None => self.canvas.set_dash(&[], 0.0),
        }
        Ok(())
    }

    /// Convert a dash specification in points to device units; `None` is solid.
    fn dash_to_pixels(
        &self,
        offset: Option<f64>,
        dashes: Option<&[f64]>,
    ) -> RenderResult<Option<(Vec<f64>, f64)>> {
        match (offset, dashes) {
            (_, None) => Ok(None),
            (None, Some(_)) => Err(RenderError::invalid("Missing dash offset")),
            (Some(offset), Some(dashes)) => {
                if dashes.iter().any(|d| !(d.is_finite() && *d >= 0.0)) {
                    return Err(RenderError::invalid("Dash lengths must be non-negative"));
                }
                if !dashes.is_empty() && dashes.iter().all(|&d| d == 0.0) {
                    return Err(RenderError::invalid("Dash lengths must not all be zero"));
                }
                let list = dashes.iter().map(|&d| self.points_to_pixels(d)).collect();
                Ok(Some((list, self.points_to_pixels(offset))))
            }
        }
    }

    pub fn set_foreground(&mut self, color: Rgba) {
        self.canvas.set_source_rgba(color);
    }

    pub fn set_hatch(&mut self, hatch: Option<&str>) {
        self.state_mut().hatch = hatch.filter(|h| !h.is_empty()).map(str::to_owned);
    }

    pub fn set_hatch_color(&mut self, color: Rgba) {
        self.state_mut().hatch_color = color;
    }

    /// Hatch line width in points.
    pub fn set_hatch_linewidth(&mut self, width: f64) {
        self.state_mut().hatch_linewidth = width;
    }

    /// Line width in points.
    pub fn set_linewidth(&mut self, width: f64) {
        let px = self.points_to_pixels(width);
        self.canvas.set_line_width(px);
        self.canvas.set_miter_limit(px);
    }

    pub fn set_snap(&mut self, snap: bool) {
        self.state_mut().snap = snap;
    }

    /// Enable sketch distortion; `None` for the scale turns it off.
    pub fn set_sketch_params(
        &mut self,
        scale: Option<f64>,
        length: Option<f64>,
        randomness: Option<f64>,
    ) {
        self.state_mut().sketch = scale
            .filter(|s| *s > 0.0)
            .map(|scale| SketchParams::new(scale, length, randomness));
    }

    // --- Getters ---

    /// Effective alpha: the override when set, else the foreground alpha.
    pub fn get_alpha(&self) -> f64 {
        self.state().alpha.unwrap_or(self.foreground().a)
    }

    pub fn get_antialiased(&self) -> AntialiasSetting {
        self.state().antialias
    }

    pub fn get_capstyle(&self) -> &'static str {
        self.canvas.gstate().line_cap.name()
    }

    pub fn get_joinstyle(&self) -> &'static str {
        self.canvas.gstate().line_join.name()
    }

    pub fn get_clip_rectangle(&self) -> Option<ClipRect> {
        self.state().clip_rectangle
    }

    pub fn get_clip_path(&self) -> Option<&ClipPath> {
        self.state().clip_path.as_ref()
    }

    /// Dash offset and lengths in points, `(None, None)` for solid lines.
    pub fn get_dashes(&self) -> (Option<f64>, Option<Vec<f64>>) {
        match &self.canvas.gstate().dash {
            Some((dashes, offset)) => (
                Some(self.pixels_to_points(*offset)),
                Some(dashes.iter().map(|&d| self.pixels_to_points(d)).collect()),
            ),
            None => (None, None),
        }
    }

    /// Foreground color as set, without the alpha override.
    pub fn get_rgb(&self) -> Rgba {
        self.foreground()
    }

    /// Line width in points.
    pub fn get_linewidth(&self) -> f64 {
        self.pixels_to_points(self.canvas.gstate().line_width)
    }

    pub fn get_hatch(&self) -> Option<&str> {
        self.state().hatch.as_deref()
    }

    pub fn get_hatch_color(&self) -> Rgba {
        self.state().hatch_color
    }

    pub fn get_hatch_linewidth(&self) -> f64 {
        self.state().hatch_linewidth
    }

    pub fn get_snap(&self) -> bool {
        self.state().snap
    }

    pub fn get_sketch_params(&self) -> Option<SketchParams> {
        self.state().sketch
    }

    pub fn dpi(&self) -> f64 {
        self.config.dpi
    }

    pub fn width(&self) -> u32 {
        self.canvas.size().0
    }

    pub fn height(&self) -> u32 {
        self.canvas.size().1
    }

    pub fn kind(&self) -> SurfaceKind {
        self.canvas.kind()
    }

    pub fn points_to_pixels(&self, points: f64) -> f64 {
        points * self.config.dpi / 72.0
    }

    fn pixels_to_points(&self, pixels: f64) -> f64 {
        pixels * 72.0 / self.config.dpi
    }

    fn foreground(&self) -> Rgba {
        match &self.canvas.gstate().source {
            Source::Solid(color) => *color,
            Source::Tile { .. } => Rgba::BLACK,
        }
    }

    /// Simplification threshold in effect; vector targets never simplify.
    fn simplify_threshold(&self) -> f64 {
        match self.canvas.kind() {
            SurfaceKind::Raster => self.config.simplify_threshold,
            SurfaceKind::Vector => 0.0,
        }
    }

    // --- Pages and buffers ---

    /// Resize the output. Only vector surfaces can change size.
    pub fn set_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        log::debug!(target: "render", "set_size {}x{}", width, height);
        self.canvas.set_size(width, height)
    }

    /// Start a new page (no-op on raster surfaces).
    pub fn show_page(&mut self) -> RenderResult<()> {
        log::debug!(target: "render", "show_page");
        self.canvas.show_page()
    }

    /// Seal the output; further drawing on vector surfaces fails.
    pub fn finish(&mut self) {
        log::debug!(target: "render", "finish");
        self.canvas.finish();
    }

    /// Premultiplied RGBA bytes of the raster surface.
    pub fn get_buffer(&self) -> RenderResult<&[u8]> {
        self.canvas
            .pixmap()
            .map(|pixmap| pixmap.data())
            .ok_or_else(|| RenderError::unsupported("Buffer access needs a raster surface"))
    }

    /// Union of the rectangles written back by region restores.
    pub fn damage(&self) -> Option<IntRect> {
        self.canvas.damage()
    }

    /// Return and reset the damage rectangle.
    pub fn take_damage(&mut self) -> Option<IntRect> {
        self.canvas.take_damage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_config::FontConfig;
    use crate::style::Antialias;

    fn renderer() -> Renderer {
        let config = RendererConfig::default().with_font_config(FontConfig::empty());
        Renderer::new_raster(20, 10, config).unwrap()
    }

    #[test]
    fn test_new_gc_and_restore_balance() {
        let mut r = renderer();
        r.set_alpha(Some(0.3));
        let gc = r.new_gc();
        assert_eq!(gc, r.gc());
        r.set_alpha(Some(0.9));
        r.set_linewidth(4.0);
        assert_eq!(r.state_depth(), 2);
        r.restore().unwrap();
        assert_eq!(r.state_depth(), 1);
        assert_eq!(r.get_alpha(), 0.3);
        assert_eq!(r.get_linewidth(), 1.0);
        assert!(matches!(r.restore(), Err(RenderError::StateStackUnderflow)));
    }

    #[test]
    fn test_gc_from_other_renderer_rejected() {
        let mut a = renderer();
        let b = renderer();
        assert!(a.copy_properties(a.gc()).is_ok());
        let err = a.copy_properties(b.gc()).unwrap_err();
        assert!(err.to_string().contains("Non-matching GraphicsContext"));
    }

    #[test]
    fn test_dashes_in_points() {
        let config = RendererConfig::default()
            .with_dpi(144.0)
            .with_font_config(FontConfig::empty());
        let mut r = Renderer::new_raster(10, 10, config).unwrap();
        r.set_dashes(Some(1.0), Some(&[3.0, 1.5])).unwrap();
        assert_eq!(r.canvas.gstate().dash, Some((vec![6.0, 3.0], 2.0)));
        assert_eq!(r.get_dashes(), (Some(1.0), Some(vec![3.0, 1.5])));
        r.set_dashes(None, None).unwrap();
        assert_eq!(r.get_dashes(), (None, None));
        assert!(matches!(
            r.set_dashes(None, Some(&[1.0])),
            Err(RenderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_style_names() {
        let mut r = renderer();
        r.set_capstyle("round").unwrap();
        r.set_joinstyle("bevel").unwrap();
        assert_eq!(r.get_capstyle(), "round");
        assert_eq!(r.get_joinstyle(), "bevel");
        assert!(r.set_capstyle("pointy").is_err());
        assert_eq!(r.get_capstyle(), "round");
    }

    #[test]
    fn test_attribute_round_trips() {
        let mut r = renderer();
        r.set_antialiased(Antialias::Gray);
        assert_eq!(r.get_antialiased(), AntialiasSetting::Mode(Antialias::Gray));
        r.set_hatch(Some("//"));
        assert_eq!(r.get_hatch(), Some("//"));
        r.set_hatch(Some(""));
        assert_eq!(r.get_hatch(), None);
        r.set_sketch_params(Some(2.0), None, None);
        assert_eq!(r.get_sketch_params().map(|p| p.length), Some(128.0));
        r.set_sketch_params(None, None, None);
        assert!(r.get_sketch_params().is_none());
        r.set_foreground(Rgba::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(r.get_rgb(), Rgba::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(r.get_alpha(), 0.4);
        assert!(r.get_snap());
        assert_eq!(r.points_to_pixels(72.0), 72.0);
    }

    #[test]
    fn test_clip_path_is_loaded_in_device_space() {
        let mut r = renderer();
        let square = Path::rectangle(0.0, 0.0, 5.0, 5.0);
        r.set_clip_path(Some((&square, &Transform2D::identity())))
            .unwrap();
        let bounds = r.get_clip_path().unwrap().path().bounds();
        assert_eq!(bounds.top(), 5.0);
        assert_eq!(bounds.bottom(), 10.0);
        r.set_clip_path(None).unwrap();
        assert!(r.get_clip_path().is_none());
    }

    #[test]
    fn test_buffer_needs_raster() {
        let config = RendererConfig::default().with_font_config(FontConfig::empty());
        let r = Renderer::new_vector(10, 10, config).unwrap();
        assert!(matches!(r.get_buffer(), Err(RenderError::Unsupported(_))));
        assert_eq!(renderer().get_buffer().unwrap().len(), 20 * 10 * 4);
    }
}
