//! Gouraud-shaded triangle meshes.
//!
//! tiny-skia has no mesh gradients, so triangles are scan-converted here:
//! every pixel center inside a triangle gets the barycentric blend of the
//! corner colors. Shared edges follow a top-left style tie rule so that each
//! pixel center on an edge belongs to exactly one triangle, which keeps
//! translucent meshes free of seams.

use crate::geometry::{Bbox, Rgba};
use tiny_skia::Pixmap;

/// One triangle in device space with a color per corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshTriangle {
    pub points: [(f64, f64); 3],
    pub colors: [Rgba; 3],
}

impl MeshTriangle {
    pub fn new(points: [(f64, f64); 3], colors: [Rgba; 3]) -> Self {
        Self { points, colors }
    }

    #[cfg(test)]
    pub(crate) fn flat(points: [(f64, f64); 3], color: Rgba) -> Self {
        Self::new(points, [color; 3])
    }

    pub(crate) fn transformed(&self, t: &tiny_skia::Transform) -> Self {
        let map = |(x, y): (f64, f64)| {
            let (sx, ky, kx, sy, tx, ty) = (
                t.sx as f64,
                t.ky as f64,
                t.kx as f64,
                t.sy as f64,
                t.tx as f64,
                t.ty as f64,
            );
            (sx * x + kx * y + tx, ky * x + sy * y + ty)
        };
        Self {
            points: self.points.map(map),
            colors: self.colors,
        }
    }

    pub(crate) fn bounds(&self) -> Bbox {
        let xs = self.points.map(|p| p.0);
        let ys = self.points.map(|p| p.1);
        Bbox::new(
            xs.iter().copied().fold(f64::INFINITY, f64::min),
            ys.iter().copied().fold(f64::INFINITY, f64::min),
            xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    }

    /// Color at device position `(x, y)`, or `None` outside the triangle.
    pub fn color_at(&self, x: f64, y: f64) -> Option<Rgba> {
        let [p0, p1, p2] = self.points;
        let area = edge(p0, p1, p2);
        if area == 0.0 || !area.is_finite() {
            return None;
        }
        // Orient counter-clockwise in device space so all weights are positive inside.
        let (p1, p2, c1, c2) = if area > 0.0 {
            (p1, p2, self.colors[1], self.colors[2])
        } else {
            (p2, p1, self.colors[2], self.colors[1])
        };
        let area = area.abs();
        let p = (x, y);
        let w0 = edge(p1, p2, p);
        let w1 = edge(p2, p0, p);
        let w2 = edge(p0, p1, p);
        if !(covers(w0, p1, p2) && covers(w1, p2, p0) && covers(w2, p0, p1)) {
            return None;
        }
        let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
        let c0 = self.colors[0];
        Some(Rgba::new(
            l0 * c0.r + l1 * c1.r + l2 * c2.r,
            l0 * c0.g + l1 * c1.g + l2 * c2.g,
            l0 * c0.b + l1 * c1.b + l2 * c2.b,
            l0 * c0.a + l1 * c1.a + l2 * c2.a,
        ))
    }
}

fn edge(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Inside test for one edge `a -> b` with weight `w`; points exactly on the
/// edge count only for one of the two directions an edge can be walked in.
fn covers(w: f64, a: (f64, f64), b: (f64, f64)) -> bool {
    if w != 0.0 {
        return w > 0.0;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    dy > 0.0 || (dy == 0.0 && dx > 0.0)
}

/// Source-over composite of a straight color onto a premultiplied pixel.
fn blend(dst: &mut [u8], color: Rgba) {
    let a = color.a.clamp(0.0, 1.0);
    if a == 0.0 {
        return;
    }
    let inv = 1.0 - a;
    let da = dst[3] as f64;
    let out_a = (a * 255.0 + da * inv).round().min(255.0);
    for (i, c) in [color.r, color.g, color.b].into_iter().enumerate() {
        let value = (c.clamp(0.0, 1.0) * a * 255.0 + dst[i] as f64 * inv).round();
        dst[i] = value.min(out_a) as u8;
    }
    dst[3] = out_a as u8;
}

/// Scan-convert `triangles` into `layer`, whose top-left pixel sits at
/// device position `origin`.
pub(crate) fn rasterize(layer: &mut Pixmap, origin: (i32, i32), triangles: &[MeshTriangle]) {
    let width = layer.width() as i64;
    let height = layer.height() as i64;
    let stride = width as usize * 4;
    let data = layer.data_mut();
    for triangle in triangles {
        let bounds = triangle.bounds();
        if !(bounds.x0.is_finite() && bounds.y0.is_finite() && bounds.x1.is_finite() && bounds.y1.is_finite()) {
            continue;
        }
        let x0 = ((bounds.x0.floor() as i64) - origin.0 as i64).max(0);
        let y0 = ((bounds.y0.floor() as i64) - origin.1 as i64).max(0);
        let x1 = ((bounds.x1.ceil() as i64) - origin.0 as i64).min(width);
        let y1 = ((bounds.y1.ceil() as i64) - origin.1 as i64).min(height);
        for py in y0..y1 {
            let cy = (py + origin.1 as i64) as f64 + 0.5;
            for px in x0..x1 {
                let cx = (px + origin.0 as i64) as f64 + 0.5;
                if let Some(color) = triangle.color_at(cx, cy) {
                    let idx = py as usize * stride + px as usize * 4;
                    blend(&mut data[idx..idx + 4], color);
                }
            }
        }
    }
}

/// Split a quadrilateral cell (corners in order around the cell) into two triangles.
pub(crate) fn quad_triangles(corners: [(f64, f64); 4], colors: [Rgba; 4]) -> [MeshTriangle; 2] {
    [
        MeshTriangle::new(
            [corners[0], corners[1], corners[2]],
            [colors[0], colors[1], colors[2]],
        ),
        MeshTriangle::new(
            [corners[0], corners[2], corners[3]],
            [colors[0], colors[2], colors[3]],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * pixmap.width() + x) * 4) as usize;
        let d = pixmap.data();
        [d[idx], d[idx + 1], d[idx + 2], d[idx + 3]]
    }

    #[test]
    fn test_color_interpolation_at_corners_and_centroid() {
        let tri = MeshTriangle::new(
            [(0.0, 0.0), (30.0, 0.0), (0.0, 30.0)],
            [
                Rgba::rgb(1.0, 0.0, 0.0),
                Rgba::rgb(0.0, 1.0, 0.0),
                Rgba::rgb(0.0, 0.0, 1.0),
            ],
        );
        let c = tri.color_at(10.0, 10.0).unwrap();
        assert!((c.r - 1.0 / 3.0).abs() < 1e-12);
        assert!((c.g - 1.0 / 3.0).abs() < 1e-12);
        assert!((c.b - 1.0 / 3.0).abs() < 1e-12);
        assert!((c.a - 1.0).abs() < 1e-12);
        assert!(tri.color_at(25.0, 25.0).is_none());
    }

    #[test]
    fn test_orientation_does_not_matter() {
        let a = MeshTriangle::flat([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)], Rgba::WHITE);
        let b = MeshTriangle::flat([(0.0, 0.0), (0.0, 10.0), (10.0, 0.0)], Rgba::WHITE);
        assert!(a.color_at(2.5, 2.5).is_some());
        assert!(b.color_at(2.5, 2.5).is_some());
    }

    #[test]
    fn test_shared_edge_pixels_painted_once() {
        // Two translucent triangles splitting a square along its diagonal;
        // pixel centers on the diagonal must not be blended twice.
        let color = Rgba::new(0.0, 0.0, 1.0, 0.5);
        let corners = [(0.0, 0.0), (8.0, 0.0), (8.0, 8.0), (0.0, 8.0)];
        let triangles = quad_triangles(corners, [color; 4]);
        let mut layer = Pixmap::new(8, 8).unwrap();
        rasterize(&mut layer, (0, 0), &triangles);
        let expected = pixel(&layer, 5, 2);
        assert_eq!(expected[3], 128);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(pixel(&layer, x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_rasterize_respects_origin() {
        let tri = MeshTriangle::flat([(10.0, 10.0), (20.0, 10.0), (10.0, 20.0)], Rgba::BLACK);
        let mut layer = Pixmap::new(10, 10).unwrap();
        rasterize(&mut layer, (10, 10), &[tri]);
        assert_eq!(pixel(&layer, 1, 1)[3], 255);
        assert_eq!(pixel(&layer, 9, 9)[3], 0);
    }

    #[test]
    fn test_degenerate_triangle_draws_nothing() {
        let tri = MeshTriangle::flat([(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)], Rgba::BLACK);
        let mut layer = Pixmap::new(10, 10).unwrap();
        rasterize(&mut layer, (0, 0), &[tri]);
        assert!(layer.data().iter().all(|&b| b == 0));
    }
}
