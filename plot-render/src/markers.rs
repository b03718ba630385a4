//! Marker stamping.
//!
//! Scatter plots draw one small shape at many fractional positions. On raster
//! targets the shape is rendered once per sub-pixel phase on an `n x n` grid
//! and each instance becomes a blit of the nearest phase at its integer
//! position.

use crate::error::RenderResult;
use crate::geometry::{Bbox, Rgba};
use crate::surface::{Canvas, SurfaceKind, MAX_DIMENSION};
use tiny_skia::{FillRule, Pixmap, Transform};

/// Smallest simplification threshold for which stamping is used; finer grids
/// cost more to set up than they save.
pub const MARKER_STAMP_MIN_THRESHOLD: f64 = 1.0 / 16.0;

/// Colors of one marker: optional face, then the edge stroked on top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MarkerPaint {
    pub(crate) face: Option<Rgba>,
    pub(crate) edge: Rgba,
}

/// How a batch of markers was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDraw {
    /// Blitted from an `n x n` grid of pre-rendered phases.
    Stamped { grid: usize },
    /// Every instance drawn with its own transform.
    Direct,
}

/// Grid size for `count` markers, or `None` when stamping does not pay off.
pub fn stamp_grid_size(threshold: f64, count: usize) -> Option<usize> {
    if !(threshold >= MARKER_STAMP_MIN_THRESHOLD) {
        return None;
    }
    let n = (1.0 / threshold).ceil() as usize;
    (n * n < count).then_some(n)
}

/// Fill then stroke `marker` translated by `(dx, dy)`.
fn draw_marker(
    canvas: &mut Canvas,
    marker: &tiny_skia::Path,
    dx: f64,
    dy: f64,
    paint: &MarkerPaint,
) -> RenderResult<()> {
    let transform = Transform::from_translate(dx as f32, dy as f32);
    if let Some(face) = paint.face {
        canvas.set_source_rgba(face);
        canvas.fill(marker, FillRule::Winding, transform)?;
    }
    canvas.set_source_rgba(paint.edge);
    canvas.stroke(marker, transform)
}

/// Device extents of the marker ink: its stroke outline, plus the fill when
/// it has a face.
fn marker_extents(canvas: &Canvas, marker: &tiny_skia::Path, paint: &MarkerPaint) -> Option<Bbox> {
    let fill = paint.face.map(|_| Bbox::from_rect(marker.bounds()));
    let stroke = canvas
        .stroke_style()
        .and_then(|stroke| marker.stroke(&stroke, 1.0))
        .map(|outline| Bbox::from_rect(outline.bounds()));
    match (fill, stroke) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    }
}

/// Nearest phase index in `0..n` and the integer pixel it belongs to.
fn phase(x: f64, n: usize) -> (f64, usize) {
    let base = x.floor();
    let index = ((x - base) * n as f64).round() as usize;
    if index >= n {
        (base + 1.0, 0)
    } else {
        (base, index)
    }
}

fn render_stamps(
    canvas: &Canvas,
    marker: &tiny_skia::Path,
    paint: &MarkerPaint,
    extents: &Bbox,
    n: usize,
) -> RenderResult<Option<(Vec<Pixmap>, f64, f64)>> {
    let x0 = extents.x0.floor();
    let y0 = extents.y0.floor();
    // One spare pixel on each axis leaves room for the sub-pixel shift.
    let width = extents.x1.ceil() - x0 + 1.0;
    let height = extents.y1.ceil() - y0 + 1.0;
    if !(width >= 1.0 && height >= 1.0)
        || width > MAX_DIMENSION as f64
        || height > MAX_DIMENSION as f64
    {
        return Ok(None);
    }
    let mut stamps = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let mut stamp = canvas.offscreen(width as u32, height as u32)?;
            let dx = -x0 + i as f64 / n as f64;
            let dy = -y0 + j as f64 / n as f64;
            draw_marker(&mut stamp, marker, dx, dy, paint)?;
            if let Some(pixmap) = stamp.into_pixmap() {
                stamps.push(pixmap);
            }
        }
    }
    Ok(Some((stamps, x0, y0)))
}

/// Draw `marker` (device-space, centered on the origin) at each of
/// `positions`, stamping when the target and the threshold allow it.
pub(crate) fn draw_markers(
    canvas: &mut Canvas,
    marker: &tiny_skia::Path,
    positions: &[(f64, f64)],
    paint: &MarkerPaint,
    threshold: f64,
) -> RenderResult<MarkerDraw> {
    let grid = match canvas.kind() {
        SurfaceKind::Raster => stamp_grid_size(threshold, positions.len()),
        SurfaceKind::Vector => None,
    };
    let stamped = match (grid, marker_extents(canvas, marker, paint)) {
        (Some(n), Some(extents)) => render_stamps(canvas, marker, paint, &extents, n)?
            .map(|(stamps, x0, y0)| (n, stamps, x0, y0)),
        _ => None,
    };

    let Some((n, stamps, x0, y0)) = stamped else {
        for &(x, y) in positions {
            if x.is_finite() && y.is_finite() {
                draw_marker(canvas, marker, x, y, paint)?;
            }
        }
        return Ok(MarkerDraw::Direct);
    };

    log::debug!(target: "render", "stamping {} markers from a {n}x{n} grid", positions.len());
    for &(x, y) in positions {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let (px, i) = phase(x, n);
        let (py, j) = phase(y, n);
        if let Some(stamp) = stamps.get(i * n + j) {
            let transform = Transform::from_translate((px + x0) as f32, (py + y0) as f32);
            canvas.paint_image(stamp, transform)?;
        }
    }
    Ok(MarkerDraw::Stamped { grid: n })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.0 / 9.0, 100, Some(9))]
    #[case(1.0 / 9.0, 81, None)]
    #[case(1.0 / 16.0, 1000, Some(16))]
    #[case(1.0 / 17.0, 1000, None)]
    #[case(0.0, 1000, None)]
    #[case(0.5, 5, Some(2))]
    fn test_stamp_grid_size(
        #[case] threshold: f64,
        #[case] count: usize,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(stamp_grid_size(threshold, count), expected);
    }

    #[rstest]
    #[case(3.0, 4, (3.0, 0))]
    #[case(3.26, 4, (3.0, 1))]
    #[case(3.9, 4, (4.0, 0))]
    #[case(-0.25, 2, (0.0, 0))]
    fn test_phase(#[case] x: f64, #[case] n: usize, #[case] expected: (f64, usize)) {
        assert_eq!(phase(x, n), expected);
    }
}
