//! The drawing surface underneath the renderer.
//!
//! A [`Surface`] is either a premultiplied RGBA pixel buffer or a vector
//! recording. The crate-internal [`Canvas`] wraps one and adds what a 2D
//! drawing library keeps next to its target: a graphics state with
//! save/restore, intersecting clip regions and a group stack. Every drawing
//! operation becomes a [`Command`]; raster targets execute it at once, vector
//! targets store a self-contained copy that can be replayed later.

mod recording;

pub use recording::{Page, Recording, RecordingSurface};
pub(crate) use recording::{rasterize, RecordedCommand};

use crate::error::{RenderError, RenderResult};
use crate::geometry::{Bbox, IntRect, Rgba};
use crate::mesh::{self, MeshTriangle};
use crate::style::{Antialias, LineCap, LineJoin};
use std::sync::Arc;
use tiny_skia::{FillRule, FilterQuality, Mask, Pixmap, PixmapPaint, Transform};

/// Maximum surface dimension.
pub const MAX_DIMENSION: u32 = 32767;

pub(crate) fn check_dimensions(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Raster,
    Vector,
}

/// An output target.
#[derive(Debug)]
pub enum Surface {
    Raster(Pixmap),
    Vector(RecordingSurface),
}

impl Surface {
    /// A transparent pixel buffer.
    pub fn raster(width: u32, height: u32) -> RenderResult<Self> {
        check_dimensions(width, height)?;
        let pixmap = Pixmap::new(width, height)
            .ok_or(RenderError::InvalidDimensions { width, height })?;
        Ok(Surface::Raster(pixmap))
    }

    /// An empty single-page recording.
    pub fn vector(width: u32, height: u32) -> RenderResult<Self> {
        Ok(Surface::Vector(RecordingSurface::new(width, height)?))
    }

    pub fn kind(&self) -> SurfaceKind {
        match self {
            Surface::Raster(_) => SurfaceKind::Raster,
            Surface::Vector(_) => SurfaceKind::Vector,
        }
    }

    /// Pixel size; for vector surfaces the size of the current page.
    pub fn size(&self) -> (u32, u32) {
        match self {
            Surface::Raster(pixmap) => (pixmap.width(), pixmap.height()),
            Surface::Vector(recording) => recording.size(),
        }
    }

    pub fn as_pixmap(&self) -> Option<&Pixmap> {
        match self {
            Surface::Raster(pixmap) => Some(pixmap),
            Surface::Vector(_) => None,
        }
    }

    pub fn as_recording(&self) -> Option<&RecordingSurface> {
        match self {
            Surface::Vector(recording) => Some(recording),
            Surface::Raster(_) => None,
        }
    }
}

/// What paint is applied to fills and strokes.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    Solid(Rgba),
    /// A repeating tile; `transform` maps tile pixels to device space.
    Tile {
        pixmap: Arc<Pixmap>,
        transform: Transform,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ClipRegion {
    pub(crate) path: tiny_skia::Path,
    pub(crate) rule: FillRule,
    pub(crate) anti_alias: bool,
}

/// Intersection of clip regions. The id changes whenever the regions do, so
/// that raster masks can be reused between draws.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClipStack {
    id: u64,
    regions: Arc<Vec<ClipRegion>>,
}

impl ClipStack {
    pub(crate) fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Paint, antialias mode and clip of one command.
#[derive(Debug, Clone)]
pub(crate) struct Style {
    pub(crate) source: Source,
    pub(crate) antialias: Antialias,
    pub(crate) clip: ClipStack,
}

/// Surface-level graphics state.
#[derive(Debug, Clone)]
pub(crate) struct GState {
    pub(crate) source: Source,
    pub(crate) line_width: f64,
    pub(crate) line_cap: LineCap,
    pub(crate) line_join: LineJoin,
    pub(crate) miter_limit: f64,
    /// On/off lengths (even count) and offset, in device units.
    pub(crate) dash: Option<(Vec<f64>, f64)>,
    pub(crate) antialias: Antialias,
    pub(crate) clip: ClipStack,
}

impl Default for GState {
    fn default() -> Self {
        Self {
            source: Source::Solid(Rgba::BLACK),
            line_width: 2.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
            antialias: Antialias::Default,
            clip: ClipStack::default(),
        }
    }
}

impl GState {
    fn style(&self) -> Style {
        Style {
            source: self.source.clone(),
            antialias: self.antialias,
            clip: self.clip.clone(),
        }
    }
}

/// A drawing operation over borrowed device-space data.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Command<'a> {
    Fill {
        path: &'a tiny_skia::Path,
        rule: FillRule,
        transform: Transform,
    },
    Stroke {
        path: &'a tiny_skia::Path,
        stroke: &'a tiny_skia::Stroke,
        transform: Transform,
    },
    Image {
        pixmap: &'a Pixmap,
        transform: Transform,
    },
    Mesh {
        triangles: &'a [MeshTriangle],
    },
}

/// Stored form of [`Command`].
#[derive(Debug, Clone)]
pub(crate) enum OwnedCommand {
    Fill {
        path: tiny_skia::Path,
        rule: FillRule,
        transform: Transform,
    },
    Stroke {
        path: tiny_skia::Path,
        stroke: tiny_skia::Stroke,
        transform: Transform,
    },
    Image {
        pixmap: Arc<Pixmap>,
        transform: Transform,
    },
    Mesh {
        triangles: Vec<MeshTriangle>,
    },
}

impl Command<'_> {
    fn into_owned(self) -> OwnedCommand {
        match self {
            Command::Fill {
                path,
                rule,
                transform,
            } => OwnedCommand::Fill {
                path: path.clone(),
                rule,
                transform,
            },
            Command::Stroke {
                path,
                stroke,
                transform,
            } => OwnedCommand::Stroke {
                path: path.clone(),
                stroke: stroke.clone(),
                transform,
            },
            Command::Image { pixmap, transform } => OwnedCommand::Image {
                pixmap: Arc::new(pixmap.clone()),
                transform,
            },
            Command::Mesh { triangles } => OwnedCommand::Mesh {
                triangles: triangles.to_vec(),
            },
        }
    }
}

impl OwnedCommand {
    /// Device-space bounds of the geometry, ignoring stroke width.
    pub(crate) fn bounds(&self) -> Option<Bbox> {
        match self {
            OwnedCommand::Fill {
                path, transform, ..
            }
            | OwnedCommand::Stroke {
                path, transform, ..
            } => path
                .clone()
                .transform(*transform)
                .map(|p| Bbox::from_rect(p.bounds())),
            OwnedCommand::Image { pixmap, transform } => {
                let rect = tiny_skia::Rect::from_xywh(
                    0.0,
                    0.0,
                    pixmap.width() as f32,
                    pixmap.height() as f32,
                )?;
                let path = tiny_skia::PathBuilder::from_rect(rect).transform(*transform)?;
                Some(Bbox::from_rect(path.bounds()))
            }
            OwnedCommand::Mesh { triangles } => triangles
                .iter()
                .map(MeshTriangle::bounds)
                .reduce(|a, b| a.union(&b)),
        }
    }
}

/// Offscreen target of `push_group`.
#[derive(Debug)]
pub(crate) enum Group {
    Raster(Pixmap),
    Vector(Vec<RecordedCommand>),
}

impl Group {
    /// Pixels of the group; recorded groups are played back first.
    pub(crate) fn into_pixmap(self, width: u32, height: u32) -> RenderResult<Pixmap> {
        match self {
            Group::Raster(pixmap) => Ok(pixmap),
            Group::Vector(commands) => rasterize(&commands, width, height),
        }
    }
}

enum Target<'a> {
    Pixels(&'a mut Pixmap),
    Commands(&'a mut Vec<RecordedCommand>),
}

/// A surface plus its graphics state.
pub(crate) struct Canvas {
    surface: Surface,
    groups: Vec<Group>,
    gstate: GState,
    saved: Vec<GState>,
    damage: Option<IntRect>,
    clip_counter: u64,
    mask_cache: Option<(u64, Mask)>,
}

impl Canvas {
    pub(crate) fn new(surface: Surface) -> Self {
        Self {
            surface,
            groups: Vec::new(),
            gstate: GState::default(),
            saved: Vec::new(),
            damage: None,
            clip_counter: 0,
            mask_cache: None,
        }
    }

    pub(crate) fn surface(&self) -> &Surface {
        &self.surface
    }

    pub(crate) fn into_surface(self) -> Surface {
        self.surface
    }

    /// A transparent raster canvas with the same paint and line settings but
    /// no clip.
    pub(crate) fn offscreen(&self, width: u32, height: u32) -> RenderResult<Canvas> {
        let mut canvas = Canvas::new(Surface::raster(width, height)?);
        canvas.gstate = GState {
            clip: ClipStack::default(),
            ..self.gstate.clone()
        };
        Ok(canvas)
    }

    pub(crate) fn into_pixmap(self) -> Option<Pixmap> {
        match self.surface {
            Surface::Raster(pixmap) => Some(pixmap),
            Surface::Vector(_) => None,
        }
    }

    pub(crate) fn kind(&self) -> SurfaceKind {
        self.surface.kind()
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        self.surface.size()
    }

    // --- Graphics state ---

    pub(crate) fn save(&mut self) {
        self.saved.push(self.gstate.clone());
    }

    /// Pop the last saved state; false if nothing was saved.
    pub(crate) fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(gstate) => {
                self.gstate = gstate;
                true
            }
            None => false,
        }
    }

    pub(crate) fn save_depth(&self) -> usize {
        self.saved.len()
    }

    pub(crate) fn gstate(&self) -> &GState {
        &self.gstate
    }

    pub(crate) fn set_source_rgba(&mut self, color: Rgba) {
        self.gstate.source = Source::Solid(color);
    }

    pub(crate) fn set_source_tile(&mut self, pixmap: Arc<Pixmap>, transform: Transform) {
        self.gstate.source = Source::Tile { pixmap, transform };
    }

    pub(crate) fn set_line_width(&mut self, width: f64) {
        self.gstate.line_width = width;
    }

    pub(crate) fn set_line_cap(&mut self, cap: LineCap) {
        self.gstate.line_cap = cap;
    }

    pub(crate) fn set_line_join(&mut self, join: LineJoin) {
        self.gstate.line_join = join;
    }

    pub(crate) fn set_miter_limit(&mut self, limit: f64) {
        self.gstate.miter_limit = limit;
    }

    /// Set the dash pattern in device units; an empty list means solid.
    /// Odd-length lists are repeated to get an even count.
    pub(crate) fn set_dash(&mut self, dashes: &[f64], offset: f64) {
        self.gstate.dash = if dashes.is_empty() {
            None
        } else {
            let mut list = dashes.to_vec();
            if list.len() % 2 == 1 {
                list.extend_from_slice(dashes);
            }
            Some((list, offset))
        };
    }

    pub(crate) fn set_antialias(&mut self, antialias: Antialias) {
        self.gstate.antialias = antialias;
    }

    /// Intersect the clip with a device-space path.
    pub(crate) fn clip(&mut self, path: tiny_skia::Path, rule: FillRule) {
        let mut regions = self.gstate.clip.regions.as_ref().clone();
        regions.push(ClipRegion {
            path,
            rule,
            anti_alias: self.gstate.antialias.is_enabled(),
        });
        self.gstate.clip = ClipStack {
            id: self.next_clip_id(),
            regions: Arc::new(regions),
        };
    }

    fn next_clip_id(&mut self) -> u64 {
        self.clip_counter += 1;
        self.clip_counter
    }

    /// The stroke described by the current state, or `None` for zero width.
    pub(crate) fn stroke_style(&self) -> Option<tiny_skia::Stroke> {
        let g = &self.gstate;
        if !(g.line_width > 0.0) {
            return None;
        }
        Some(tiny_skia::Stroke {
            width: g.line_width as f32,
            miter_limit: g.miter_limit as f32,
            line_cap: g.line_cap.into(),
            line_join: g.line_join.into(),
            dash: g.dash.as_ref().and_then(|(dashes, offset)| {
                let dash = tiny_skia::StrokeDash::new(
                    dashes.iter().map(|&d| d as f32).collect(),
                    *offset as f32,
                );
                if dash.is_none() {
                    log::warn!(
                        target: "render",
                        "unusable dash pattern {:?}, stroking solid",
                        dashes
                    );
                }
                dash
            }),
        })
    }

    /// Whether strokes are rasterized as hairlines. tiny-skia draws
    /// antialiased strokes at most one pixel wide from their centerline, not
    /// from the stroke outline.
    pub(crate) fn strokes_as_hairline(&self) -> bool {
        let g = &self.gstate;
        g.antialias.is_enabled() && g.line_width > 0.0 && g.line_width as f32 <= 1.0
    }

    // --- Drawing ---

    pub(crate) fn fill(
        &mut self,
        path: &tiny_skia::Path,
        rule: FillRule,
        transform: Transform,
    ) -> RenderResult<()> {
        self.emit(Command::Fill {
            path,
            rule,
            transform,
        })
    }

    /// Stroke a device-space path with the current line settings.
    pub(crate) fn stroke(&mut self, path: &tiny_skia::Path, transform: Transform) -> RenderResult<()> {
        let Some(stroke) = self.stroke_style() else {
            return Ok(());
        };
        self.emit(Command::Stroke {
            path,
            stroke: &stroke,
            transform,
        })
    }

    pub(crate) fn paint_image(&mut self, pixmap: &Pixmap, transform: Transform) -> RenderResult<()> {
        self.emit(Command::Image { pixmap, transform })
    }

    pub(crate) fn paint_mesh(&mut self, triangles: &[MeshTriangle]) -> RenderResult<()> {
        if triangles.is_empty() {
            return Ok(());
        }
        self.emit(Command::Mesh { triangles })
    }

    /// Play recorded commands back under an extra transform, inside the
    /// current clip. A tint replaces the color of solid paints, keeping
    /// their alpha as a coverage factor.
    pub(crate) fn replay(
        &mut self,
        commands: &[RecordedCommand],
        transform: Transform,
        tint: Option<Rgba>,
    ) -> RenderResult<()> {
        for recorded in commands {
            let style = self.replayed_style(&recorded.style, transform, tint);
            match &recorded.command {
                OwnedCommand::Fill {
                    path,
                    rule,
                    transform: t,
                } => self.emit_styled(
                    Command::Fill {
                        path,
                        rule: *rule,
                        transform: t.post_concat(transform),
                    },
                    style,
                )?,
                OwnedCommand::Stroke {
                    path,
                    stroke,
                    transform: t,
                } => self.emit_styled(
                    Command::Stroke {
                        path,
                        stroke,
                        transform: t.post_concat(transform),
                    },
                    style,
                )?,
                OwnedCommand::Image {
                    pixmap,
                    transform: t,
                } => self.emit_styled(
                    Command::Image {
                        pixmap,
                        transform: t.post_concat(transform),
                    },
                    style,
                )?,
                OwnedCommand::Mesh { triangles } => {
                    let moved: Vec<MeshTriangle> =
                        triangles.iter().map(|t| t.transformed(&transform)).collect();
                    self.emit_styled(Command::Mesh { triangles: &moved }, style)?
                }
            }
        }
        Ok(())
    }

    fn replayed_style(&mut self, recorded: &Style, transform: Transform, tint: Option<Rgba>) -> Style {
        let source = match (&recorded.source, tint) {
            (Source::Solid(color), Some(tint)) => Source::Solid(Rgba {
                a: tint.a * color.a,
                ..tint
            }),
            (Source::Solid(color), None) => Source::Solid(*color),
            (Source::Tile { pixmap, transform: t }, _) => Source::Tile {
                pixmap: Arc::clone(pixmap),
                transform: t.post_concat(transform),
            },
        };
        let clip = if recorded.clip.is_empty() {
            self.gstate.clip.clone()
        } else {
            let mut regions = self.gstate.clip.regions.as_ref().clone();
            regions.extend(recorded.clip.regions.iter().filter_map(|region| {
                Some(ClipRegion {
                    path: region.path.clone().transform(transform)?,
                    rule: region.rule,
                    anti_alias: region.anti_alias,
                })
            }));
            ClipStack {
                id: self.next_clip_id(),
                regions: Arc::new(regions),
            }
        };
        Style {
            source,
            antialias: recorded.antialias,
            clip,
        }
    }

    fn emit(&mut self, command: Command<'_>) -> RenderResult<()> {
        let style = self.gstate.style();
        self.emit_styled(command, style)
    }

    fn emit_styled(&mut self, command: Command<'_>, style: Style) -> RenderResult<()> {
        let Canvas {
            surface,
            groups,
            mask_cache,
            ..
        } = self;
        let target = match groups.last_mut() {
            Some(Group::Raster(pixmap)) => Target::Pixels(pixmap),
            Some(Group::Vector(commands)) => Target::Commands(commands),
            None => match surface {
                Surface::Raster(pixmap) => Target::Pixels(pixmap),
                Surface::Vector(recording) => Target::Commands(recording.current_commands_mut()?),
            },
        };
        match target {
            Target::Pixels(pixmap) => {
                let mask = cached_mask(mask_cache, &style.clip, pixmap.width(), pixmap.height());
                execute(pixmap, command, &style, mask);
            }
            Target::Commands(commands) => commands.push(RecordedCommand {
                command: command.into_owned(),
                style,
            }),
        }
        Ok(())
    }

    // --- Groups ---

    /// Redirect drawing to an offscreen target of the same kind and size.
    /// Also saves the graphics state.
    pub(crate) fn push_group(&mut self) -> RenderResult<()> {
        let (width, height) = self.size();
        let group = match &self.surface {
            Surface::Raster(_) => Group::Raster(
                Pixmap::new(width, height).ok_or(RenderError::InvalidDimensions { width, height })?,
            ),
            Surface::Vector(recording) => {
                if recording.is_finished() {
                    return Err(RenderError::SurfaceFinished);
                }
                Group::Vector(Vec::new())
            }
        };
        self.save();
        self.groups.push(group);
        Ok(())
    }

    /// End the innermost group and restore the graphics state.
    pub(crate) fn pop_group(&mut self) -> RenderResult<Group> {
        let group = self
            .groups
            .pop()
            .ok_or_else(|| RenderError::invalid("No group to pop"))?;
        self.restore();
        Ok(group)
    }

    // --- Raster access ---

    pub(crate) fn pixmap(&self) -> Option<&Pixmap> {
        self.surface.as_pixmap()
    }

    pub(crate) fn pixmap_mut(&mut self) -> Option<&mut Pixmap> {
        match &mut self.surface {
            Surface::Raster(pixmap) => Some(pixmap),
            Surface::Vector(_) => None,
        }
    }

    /// Record that `rect` was written outside of the drawing operations.
    pub(crate) fn mark_dirty(&mut self, rect: IntRect) {
        self.damage = Some(match self.damage {
            Some(damage) => damage.union(&rect),
            None => rect,
        });
    }

    pub(crate) fn damage(&self) -> Option<IntRect> {
        self.damage
    }

    pub(crate) fn take_damage(&mut self) -> Option<IntRect> {
        self.damage.take()
    }

    // --- Pages ---

    pub(crate) fn show_page(&mut self) -> RenderResult<()> {
        match &mut self.surface {
            Surface::Raster(_) => Ok(()),
            Surface::Vector(recording) => recording.show_page(),
        }
    }

    pub(crate) fn set_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        match &mut self.surface {
            Surface::Raster(_) => Err(RenderError::unsupported(
                "set_size is only supported on vector surfaces",
            )),
            Surface::Vector(recording) => recording.set_size(width, height),
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Surface::Vector(recording) = &mut self.surface {
            recording.finish();
        }
    }
}

fn build_mask(regions: &[ClipRegion], width: u32, height: u32) -> Option<Mask> {
    let (first, rest) = regions.split_first()?;
    let mut mask = Mask::new(width, height)?;
    mask.fill_path(&first.path, first.rule, first.anti_alias, Transform::identity());
    for region in rest {
        mask.intersect_path(&region.path, region.rule, region.anti_alias, Transform::identity());
    }
    Some(mask)
}

fn cached_mask<'m>(
    cache: &'m mut Option<(u64, Mask)>,
    clip: &ClipStack,
    width: u32,
    height: u32,
) -> Option<&'m Mask> {
    if clip.is_empty() {
        return None;
    }
    let fresh = cache.as_ref().is_some_and(|(id, mask)| {
        *id == clip.id && mask.width() == width && mask.height() == height
    });
    if !fresh {
        *cache = build_mask(&clip.regions, width, height).map(|mask| (clip.id, mask));
    }
    cache.as_ref().map(|(_, mask)| mask)
}

fn with_paint<R>(style: &Style, draw: impl for<'a> FnOnce(&tiny_skia::Paint<'a>) -> R) -> R {
    let mut paint = tiny_skia::Paint {
        anti_alias: style.antialias.is_enabled(),
        force_hq_pipeline: style.antialias.is_precise(),
        ..Default::default()
    };
    match &style.source {
        Source::Solid(color) => {
            paint.set_color((*color).into());
            draw(&paint)
        }
        Source::Tile { pixmap, transform } => {
            paint.shader = tiny_skia::Pattern::new(
                (**pixmap).as_ref(),
                tiny_skia::SpreadMode::Repeat,
                FilterQuality::Nearest,
                1.0,
                *transform,
            );
            draw(&paint)
        }
    }
}

fn image_quality(t: &Transform) -> FilterQuality {
    let integral = t.sx == 1.0
        && t.sy == 1.0
        && t.kx == 0.0
        && t.ky == 0.0
        && t.tx.fract() == 0.0
        && t.ty.fract() == 0.0;
    if integral {
        FilterQuality::Nearest
    } else {
        FilterQuality::Bilinear
    }
}

fn execute(pixmap: &mut Pixmap, command: Command<'_>, style: &Style, mask: Option<&Mask>) {
    match command {
        Command::Fill {
            path,
            rule,
            transform,
        } => with_paint(style, |paint| {
            pixmap.fill_path(path, paint, rule, transform, mask);
        }),
        Command::Stroke {
            path,
            stroke,
            transform,
        } => with_paint(style, |paint| {
            pixmap.stroke_path(path, paint, stroke, transform, mask);
        }),
        Command::Image {
            pixmap: image,
            transform,
        } => {
            let paint = PixmapPaint {
                quality: image_quality(&transform),
                ..Default::default()
            };
            pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, mask);
        }
        Command::Mesh { triangles } => paint_mesh_layer(pixmap, triangles, mask),
    }
}

fn paint_mesh_layer(pixmap: &mut Pixmap, triangles: &[MeshTriangle], mask: Option<&Mask>) {
    let Some(bounds) = triangles
        .iter()
        .map(MeshTriangle::bounds)
        .reduce(|a, b| a.union(&b))
    else {
        return;
    };
    let x0 = bounds.x0.floor().max(0.0);
    let y0 = bounds.y0.floor().max(0.0);
    let x1 = bounds.x1.ceil().min(pixmap.width() as f64);
    let y1 = bounds.y1.ceil().min(pixmap.height() as f64);
    if !(x1 > x0 && y1 > y0) {
        return;
    }
    let Some(mut layer) = Pixmap::new((x1 - x0) as u32, (y1 - y0) as u32) else {
        return;
    };
    mesh::rasterize(&mut layer, (x0 as i32, y0 as i32), triangles);
    pixmap.draw_pixmap(
        x0 as i32,
        y0 as i32,
        layer.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        mask,
    );
}
