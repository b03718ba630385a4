//! Path, marker, collection, mesh and image drawing.

use super::scoped::AdditionalContext;
use super::{GraphicsContext, Renderer};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{OffsetPosition, PathCollection, QuadMesh, Rgba, RgbaImage};
use crate::hatch::hatch_path;
use crate::markers::{self, MarkerDraw, MarkerPaint};
use crate::mesh::{self, MeshTriangle};
use crate::path::{load_path, load_path_range, sketch_path, Path, PathCode, Snapper};
use crate::pattern_cache::{self, CacheStats, PatternCache, PatternKey, PATTERN_CACHE_MAX_BYTES};
use crate::style::{AntialiasSetting, DrawOp};
use crate::surface::SurfaceKind;
use crate::transform::{apply, device_matrix, relative_matrix, Transform2D};
use kurbo::Affine;
use std::sync::Arc;
use tiny_skia::{ColorU8, FillRule, Pixmap, Transform};

/// Outcome of [`Renderer::draw_path_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The collection was drawn.
    Handled(CollectionStats),
    /// The collection needs per-element drawing, see
    /// [`Renderer::draw_path_collection_generic`].
    Fallback,
}

/// Work done by one collection draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionStats {
    /// Elements drawn.
    pub elements: usize,
    pub cache: CacheStats,
}

fn cycle<T>(items: &[T], i: usize) -> Option<&T> {
    if items.is_empty() {
        None
    } else {
        items.get(i % items.len())
    }
}

fn collection_len(collection: &PathCollection<'_>) -> usize {
    collection
        .paths
        .len()
        .max(collection.transforms.len())
        .max(collection.offsets.len())
}

/// Vertices that carry a marker: the end point of every drawing segment.
fn marker_vertices(path: &Path) -> Vec<[f64; 2]> {
    let vertices = path.vertices();
    let Some(codes) = path.codes() else {
        return vertices.to_vec();
    };
    let mut out = Vec::with_capacity(codes.len());
    let mut i = 0;
    while i < codes.len() {
        let code = codes[i];
        let step = code.num_vertices();
        match code {
            PathCode::Stop => break,
            PathCode::ClosePoly => {}
            _ => out.extend(vertices.get(i + step - 1).copied()),
        }
        i += step;
    }
    out
}

/// Closed device-space outline of one mesh cell.
fn cell_path(corners: &[(f64, f64); 4]) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    pb.move_to(corners[0].0 as f32, corners[0].1 as f32);
    for &(x, y) in &corners[1..] {
        pb.line_to(x as f32, y as f32);
    }
    pb.close();
    pb.finish()
}

impl Renderer {
    /// Tile of `dpi x dpi` pixels with the hatch geometry in the hatch color.
    fn hatch_tile(&self, hatch: &str) -> RenderResult<Option<(Arc<Pixmap>, u32)>> {
        let state = self.states.current();
        let Some(geometry) = hatch_path(hatch, self.config.hatch_density) else {
            return Ok(None);
        };
        let size = self.config.dpi.round().max(1.0) as u32;
        let n = size as f64;
        let to_tile = Affine::new([n, 0.0, 0.0, -n, 0.0, n]);
        let Some(path) = load_path(&geometry, &to_tile, Snapper::Off) else {
            return Ok(None);
        };

        let mut tile = self.canvas.offscreen(size, size)?;
        tile.set_dash(&[], 0.0);
        tile.set_line_width(self.points_to_pixels(state.hatch_linewidth));
        tile.set_source_rgba(state.hatch_color.with_alpha_override(state.alpha));
        tile.fill(&path, FillRule::EvenOdd, Transform::identity())?;
        tile.stroke(&path, Transform::identity())?;
        Ok(tile.into_pixmap().map(|pixmap| (Arc::new(pixmap), size)))
    }

    /// Draw `path` under `transform`: fill with `fill` if given, paint the
    /// hatch if one is set, then stroke with the foreground color.
    pub fn draw_path(
        &mut self,
        gc: GraphicsContext,
        path: &Path,
        transform: &Transform2D,
        fill: Option<Rgba>,
    ) -> RenderResult<()> {
        self.check_gc(gc)?;
        log::debug!(target: "render", "draw_path {} vertices", path.len());
        let height = self.height() as f64;
        let matrix = device_matrix(transform, height)?;
        let hatch = match self.states.current().hatch.as_deref() {
            Some(hatch) => self.hatch_tile(hatch)?,
            None => None,
        };

        let state = self.states.current();
        let snap = state.snap && self.canvas.kind() == SurfaceKind::Raster;
        let snapper = Snapper::for_line_width(snap, self.canvas.gstate().line_width);
        let chunksize = self.config.path_chunksize;
        let chunked = chunksize > 0
            && path.codes().is_none()
            && fill.is_none()
            && hatch.is_none()
            && path.len() > chunksize;
        let sketch = |loaded: tiny_skia::Path| match &state.sketch {
            Some(params) => sketch_path(&loaded, params).unwrap_or(loaded),
            None => loaded,
        };

        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);

        if chunked {
            log::trace!(target: "render", "stroking in chunks of {}", chunksize);
            let mut start = 0;
            while start + 1 < path.len() {
                let stop = (start + chunksize + 1).min(path.len());
                if let Some(chunk) = load_path_range(path, start, stop, &matrix, snapper)? {
                    ctx.stroke(&sketch(chunk), Transform::identity())?;
                }
                start += chunksize;
            }
            return Ok(());
        }

        let Some(loaded) = load_path(path, &matrix, snapper) else {
            return Ok(());
        };
        let loaded = sketch(loaded);

        if let Some(color) = fill {
            ctx.save();
            ctx.set_source_rgba(color.with_alpha_override(state.alpha));
            let filled = ctx.fill(&loaded, FillRule::Winding, Transform::identity());
            ctx.restore();
            filled?;
        }
        if let Some((tile, size)) = hatch {
            // Tiles line up with the bottom edge of the canvas.
            let anchor = Transform::from_translate(0.0, (height % size as f64) as f32);
            ctx.save();
            ctx.set_source_tile(tile, anchor);
            let hatched = ctx.fill(&loaded, FillRule::Winding, Transform::identity());
            ctx.restore();
            hatched?;
        }
        ctx.stroke(&loaded, Transform::identity())
    }

    /// Draw `marker_path` (under `marker_transform`, relative to each vertex)
    /// at every vertex of `path` (under `transform`).
    pub fn draw_markers(
        &mut self,
        gc: GraphicsContext,
        marker_path: &Path,
        marker_transform: &Transform2D,
        path: &Path,
        transform: &Transform2D,
        fill: Option<Rgba>,
    ) -> RenderResult<MarkerDraw> {
        self.check_gc(gc)?;
        let height = self.height() as f64;
        let marker_matrix = device_matrix(marker_transform, 0.0)?;
        let matrix = device_matrix(transform, height)?;
        let Some(marker) = load_path(marker_path, &marker_matrix, Snapper::Off) else {
            return Ok(MarkerDraw::Direct);
        };
        let positions: Vec<(f64, f64)> = marker_vertices(path)
            .into_iter()
            .map(|[x, y]| apply(&matrix, x, y))
            .collect();
        let threshold = self.simplify_threshold();

        let state = self.states.current();
        let paint = MarkerPaint {
            face: fill.map(|color| color.with_alpha_override(state.alpha)),
            edge: self.foreground().with_alpha_override(state.alpha),
        };
        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
        let drawn = markers::draw_markers(&mut ctx, &marker, &positions, &paint, threshold)?;
        log::debug!(target: "render", "draw_markers {} positions: {:?}", positions.len(), drawn);
        Ok(drawn)
    }

    /// Draw a collection of paths, reusing one tessellated outline for all
    /// elements that differ only by translation.
    ///
    /// Hatched collections and offsets in data space are not handled here;
    /// the caller should then use [`draw_path_collection_generic`](Self::draw_path_collection_generic).
    pub fn draw_path_collection(
        &mut self,
        gc: GraphicsContext,
        collection: &PathCollection<'_>,
    ) -> RenderResult<Dispatch> {
        self.check_gc(gc)?;
        if self.states.current().hatch.is_some()
            || collection.offset_position == OffsetPosition::Data
        {
            log::debug!(target: "render", "path collection needs per-element drawing");
            return Ok(Dispatch::Fallback);
        }
        if collection.paths.is_empty() {
            return Ok(Dispatch::Handled(CollectionStats::default()));
        }

        let height = self.height() as f64;
        let master = device_matrix(collection.master_transform, height)?;
        let offset_matrix = device_matrix(collection.offset_transform, 0.0)?;
        let matrices = collection
            .transforms
            .iter()
            .map(|t| relative_matrix(t, &master))
            .collect::<RenderResult<Vec<_>>>()?;
        let linewidths: Vec<f64> = collection
            .linewidths
            .iter()
            .map(|&lw| self.points_to_pixels(lw))
            .collect();
        let dashes = collection
            .dashes
            .iter()
            .map(|d| self.dash_to_pixels(d.offset, d.dashes.as_deref()))
            .collect::<RenderResult<Vec<_>>>()?;
        let mut cache = PatternCache::new(PATTERN_CACHE_MAX_BYTES, self.simplify_threshold() > 0.0);

        let count = collection_len(collection);
        let mut elements = 0;
        let state = self.states.current();
        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
        let default_line_width = ctx.gstate().line_width;

        for i in 0..count {
            let path = &collection.paths[i % collection.paths.len()];
            let [ox, oy] = cycle(collection.offsets, i).copied().unwrap_or([0.0, 0.0]);
            let (dx, dy) = apply(&offset_matrix, ox, oy);
            if !(dx.is_finite() && dy.is_finite()) {
                continue;
            }
            let matrix = Affine::translate((dx, dy)) * cycle(&matrices, i).copied().unwrap_or(master);
            let [_, _, _, _, tx, ty] = matrix.as_coeffs();
            let placement = Transform::from_translate(tx as f32, ty as f32);

            let line_width = cycle(&linewidths, i).copied().unwrap_or(default_line_width);
            ctx.set_line_width(line_width);
            match cycle(&dashes, i) {
                Some(Some((list, offset))) => ctx.set_dash(list, *offset),
                Some(None) => ctx.set_dash(&[], 0.0),
                None => {}
            }
            let antialias = cycle(collection.antialiaseds, i)
                .map(|&aa| AntialiasSetting::from(aa))
                .unwrap_or(state.antialias);
            ctx.set_antialias(antialias.resolve(line_width));

            if let Some(face) = cycle(collection.facecolors, i) {
                let key = PatternKey::new(path, &matrix, DrawOp::Fill, line_width, None);
                let outline = cache.get_or_insert(key, || {
                    pattern_cache::outline(path, &matrix, DrawOp::Fill, None)
                });
                if let Some(outline) = outline {
                    ctx.set_source_rgba(face.with_alpha_override(state.alpha));
                    ctx.fill(&outline, FillRule::Winding, placement)?;
                }
            }
            if let Some(edge) = cycle(collection.edgecolors, i) {
                ctx.set_source_rgba(edge.with_alpha_override(state.alpha));
                if ctx.strokes_as_hairline() {
                    // Hairlines are stroked from the centerline, which is the fill outline.
                    let key = PatternKey::new(path, &matrix, DrawOp::Fill, line_width, None);
                    let centerline = cache.get_or_insert(key, || {
                        pattern_cache::outline(path, &matrix, DrawOp::Fill, None)
                    });
                    if let Some(centerline) = centerline {
                        ctx.stroke(&centerline, placement)?;
                    }
                } else if let Some(stroke) = ctx.stroke_style() {
                    let key = PatternKey::new(
                        path,
                        &matrix,
                        DrawOp::Stroke,
                        line_width,
                        ctx.gstate().dash.as_ref(),
                    );
                    let outline = cache.get_or_insert(key, || {
                        pattern_cache::outline(path, &matrix, DrawOp::Stroke, Some(&stroke))
                    });
                    if let Some(outline) = outline {
                        ctx.fill(&outline, FillRule::Winding, placement)?;
                    }
                }
            }
            elements += 1;
        }

        let stats = CollectionStats {
            elements,
            cache: cache.stats(),
        };
        log::debug!(target: "render", "draw_path_collection {:?}", stats);
        Ok(Dispatch::Handled(stats))
    }

    /// Draw a collection one element at a time through [`draw_path`](Self::draw_path).
    pub fn draw_path_collection_generic(
        &mut self,
        gc: GraphicsContext,
        collection: &PathCollection<'_>,
    ) -> RenderResult<()> {
        self.check_gc(gc)?;
        if collection.paths.is_empty() {
            return Ok(());
        }
        log::debug!(
            target: "render",
            "draw_path_collection_generic {} elements",
            collection_len(collection)
        );
        for i in 0..collection_len(collection) {
            self.new_gc();
            let drawn = self.draw_collection_element(gc, collection, i);
            self.restore()?;
            drawn?;
        }
        Ok(())
    }

    fn draw_collection_element(
        &mut self,
        gc: GraphicsContext,
        collection: &PathCollection<'_>,
        i: usize,
    ) -> RenderResult<()> {
        let path = &collection.paths[i % collection.paths.len()];
        let transform = cycle(collection.transforms, i).copied().unwrap_or_default();
        let to_display = transform.then(collection.master_transform);
        let [ox, oy] = cycle(collection.offsets, i).copied().unwrap_or([0.0, 0.0]);
        let (ux, uy) = collection.offset_transform.transform_point(ox, oy);
        let (ux, uy) = match collection.offset_position {
            OffsetPosition::Screen => (ux, uy),
            OffsetPosition::Data => {
                let (x, y) = to_display.transform_point(ux, uy);
                let (x0, y0) = to_display.transform_point(0.0, 0.0);
                (x - x0, y - y0)
            }
        };
        let full = to_display.then(&Transform2D::translate(ux, uy));

        match cycle(collection.edgecolors, i) {
            Some(edge) => {
                self.set_foreground(*edge);
                if let Some(&lw) = cycle(collection.linewidths, i) {
                    self.set_linewidth(lw);
                }
            }
            None => self.canvas.set_line_width(0.0),
        }
        if let Some(dash) = cycle(collection.dashes, i) {
            self.set_dashes(dash.offset, dash.dashes.as_deref())?;
        }
        if let Some(&aa) = cycle(collection.antialiaseds, i) {
            self.set_antialiased(aa);
        }
        let face = cycle(collection.facecolors, i).copied();
        self.draw_path(gc, path, &full, face)
    }

    /// Draw a quadrilateral mesh. Without edge colors the cells become one
    /// gradient mesh; with edge colors every cell is filled and stroked.
    pub fn draw_quad_mesh(&mut self, gc: GraphicsContext, quad: &QuadMesh<'_>) -> RenderResult<()> {
        self.check_gc(gc)?;
        if quad.offsets.iter().any(|&[x, y]| x != 0.0 || y != 0.0) {
            return Err(RenderError::unsupported("Non-trivial offsets not supported"));
        }
        let (w, h) = (quad.mesh_width, quad.mesh_height);
        if quad.coordinates.len() != (w + 1) * (h + 1) {
            return Err(RenderError::invalid(format!(
                "Expected {}x{} mesh coordinates, got {}",
                h + 1,
                w + 1,
                quad.coordinates.len()
            )));
        }
        log::debug!(target: "render", "draw_quad_mesh {}x{}", w, h);
        if w == 0 || h == 0 || (quad.facecolors.is_empty() && quad.edgecolors.is_empty()) {
            return Ok(());
        }

        let height = self.height() as f64;
        let matrix = device_matrix(quad.master_transform, height)?;
        let points: Vec<(f64, f64)> = quad
            .coordinates
            .iter()
            .map(|&[x, y]| apply(&matrix, x, y))
            .collect();
        let corners = |row: usize, col: usize| {
            let at = |r: usize, c: usize| points[r * (w + 1) + c];
            [at(row, col), at(row, col + 1), at(row + 1, col + 1), at(row + 1, col)]
        };

        let state = self.states.current();
        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
        let antialias = AntialiasSetting::from(quad.antialiased).resolve(ctx.gstate().line_width);
        ctx.set_antialias(antialias);

        if quad.edgecolors.is_empty() {
            let mut triangles = Vec::with_capacity(2 * w * h);
            for row in 0..h {
                for col in 0..w {
                    if let Some(face) = cycle(quad.facecolors, row * w + col) {
                        let color = face.with_alpha_override(state.alpha);
                        triangles.extend(mesh::quad_triangles(corners(row, col), [color; 4]));
                    }
                }
            }
            return ctx.paint_mesh(&triangles);
        }

        for row in 0..h {
            for col in 0..w {
                let index = row * w + col;
                let Some(cell) = cell_path(&corners(row, col)) else {
                    continue;
                };
                if let Some(face) = cycle(quad.facecolors, index) {
                    ctx.set_source_rgba(face.with_alpha_override(state.alpha));
                    ctx.fill(&cell, FillRule::Winding, Transform::identity())?;
                }
                if let Some(edge) = cycle(quad.edgecolors, index) {
                    ctx.set_source_rgba(edge.with_alpha_override(state.alpha));
                    ctx.stroke(&cell, Transform::identity())?;
                }
            }
        }
        Ok(())
    }

    /// Draw triangles with colors interpolated between their corners.
    pub fn draw_gouraud_triangles(
        &mut self,
        gc: GraphicsContext,
        triangles: &[[[f64; 2]; 3]],
        colors: &[[Rgba; 3]],
        transform: &Transform2D,
    ) -> RenderResult<()> {
        self.check_gc(gc)?;
        if triangles.len() != colors.len() {
            return Err(RenderError::invalid(format!(
                "Non-matching shapes: {} triangles, {} color triples",
                triangles.len(),
                colors.len()
            )));
        }
        log::debug!(target: "render", "draw_gouraud_triangles {}", triangles.len());
        let height = self.height() as f64;
        let matrix = device_matrix(transform, height)?;
        let state = self.states.current();
        let mesh: Vec<MeshTriangle> = triangles
            .iter()
            .zip(colors)
            .map(|(points, colors)| {
                MeshTriangle::new(
                    points.map(|[x, y]| apply(&matrix, x, y)),
                    colors.map(|c| c.with_alpha_override(state.alpha)),
                )
            })
            .collect();
        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
        ctx.paint_mesh(&mesh)
    }

    /// Draw a straight-alpha RGBA image (top row first) with its bottom left
    /// corner at user-space `(x, y)`.
    pub fn draw_image(
        &mut self,
        gc: GraphicsContext,
        x: f64,
        y: f64,
        image: &RgbaImage,
    ) -> RenderResult<()> {
        self.check_gc(gc)?;
        log::debug!(target: "render", "draw_image {}x{} at {} {}", image.width, image.height, x, y);
        let Some(mut pixmap) = Pixmap::new(image.width, image.height) else {
            return Ok(());
        };
        let state = self.states.current();
        let opacity = state.alpha.map_or(1.0, |a| a.clamp(0.0, 1.0));
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.data.chunks_exact(4)) {
            let alpha = (src[3] as f64 * opacity).round() as u8;
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], alpha).premultiply();
        }

        let height = self.height() as f64;
        let top = height - y - image.height as f64;
        let placement = Transform::from_translate(x as f32, top as f32);
        let mut ctx = AdditionalContext::enter(&mut self.canvas, state, height);
        ctx.paint_image(&pixmap, placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_vertices_skip_control_points() {
        let path = Path::with_codes(
            vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 3.0], [0.0, 0.0]],
            vec![
                PathCode::MoveTo,
                PathCode::Curve3,
                PathCode::Curve3,
                PathCode::LineTo,
                PathCode::ClosePoly,
            ],
        )
        .unwrap();
        assert_eq!(
            marker_vertices(&path),
            vec![[0.0, 0.0], [2.0, 0.0], [3.0, 3.0]]
        );
        let polyline = Path::polyline(vec![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(marker_vertices(&polyline), vec![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_cycle() {
        let items = [1, 2, 3];
        assert_eq!(cycle(&items, 4), Some(&2));
        assert_eq!(cycle::<i32>(&[], 4), None);
    }

    #[test]
    fn test_cell_path_bounds() {
        let cell = cell_path(&[(0.0, 0.0), (2.0, 0.0), (2.0, 3.0), (0.0, 3.0)]).unwrap();
        assert_eq!(cell.bounds().width(), 2.0);
        assert_eq!(cell.bounds().height(), 3.0);
    }
}
