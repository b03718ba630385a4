//! Abstract paths and their conversion into device-space geometry.

mod clip;
mod loader;
mod sketch;
mod snap;

pub use clip::{clip_segment, Clipped, COORD_LIMIT};
pub use loader::{load_path, load_path_range};
pub use sketch::{sketch_path, SketchParams};
pub use snap::Snapper;

use crate::error::{RenderError, RenderResult};
use kurbo::{PathEl, Shape};
use std::hash::{Hash, Hasher};

/// Per-vertex path operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PathCode {
    Stop = 0,
    MoveTo = 1,
    LineTo = 2,
    /// Quadratic Bezier: this vertex is the control point, the next one the end point.
    Curve3 = 3,
    /// Cubic Bezier: this vertex and the next are control points, the one after the end point.
    Curve4 = 4,
    ClosePoly = 79,
}

impl PathCode {
    /// Number of vertices consumed by this code, including its own.
    pub fn num_vertices(self) -> usize {
        match self {
            PathCode::Curve3 => 2,
            PathCode::Curve4 => 3,
            _ => 1,
        }
    }
}

impl TryFrom<u8> for PathCode {
    type Error = RenderError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PathCode::Stop),
            1 => Ok(PathCode::MoveTo),
            2 => Ok(PathCode::LineTo),
            3 => Ok(PathCode::Curve3),
            4 => Ok(PathCode::Curve4),
            79 => Ok(PathCode::ClosePoly),
            _ => Err(RenderError::invalid(format!("Invalid path code: {code}"))),
        }
    }
}

/// A sequence of vertices with optional per-vertex codes.
///
/// A path without codes is a polyline: a move to the first vertex followed by
/// lines through the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    vertices: Vec<[f64; 2]>,
    codes: Option<Vec<PathCode>>,
}

impl Path {
    /// A polyline through `vertices`.
    pub fn polyline(vertices: Vec<[f64; 2]>) -> Self {
        Self {
            vertices,
            codes: None,
        }
    }

    /// A path with explicit codes; lengths must match and curves must have
    /// all of their vertices.
    pub fn with_codes(vertices: Vec<[f64; 2]>, codes: Vec<PathCode>) -> RenderResult<Self> {
        if codes.len() != vertices.len() {
            return Err(RenderError::invalid(
                "Lengths of vertices and codes do not match",
            ));
        }
        let mut i = 0;
        while i < codes.len() {
            let step = codes[i].num_vertices();
            if i + step > codes.len() {
                return Err(RenderError::invalid(format!(
                    "Truncated curve at vertex {i}"
                )));
            }
            i += step;
        }
        Ok(Self {
            vertices,
            codes: Some(codes),
        })
    }

    /// Build from a flat `N x 2` array of coordinates and optional raw codes.
    pub fn from_flat(
        coords: &[f64],
        shape: (usize, usize),
        codes: Option<&[u8]>,
    ) -> RenderResult<Self> {
        let (n, dim) = shape;
        if dim != 2 || coords.len() != n * dim {
            return Err(RenderError::invalid("vertices must have shape (n, 2)"));
        }
        let vertices = coords.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        match codes {
            None => Ok(Self::polyline(vertices)),
            Some(raw) => {
                let codes = raw
                    .iter()
                    .map(|&c| PathCode::try_from(c))
                    .collect::<RenderResult<Vec<_>>>()?;
                Self::with_codes(vertices, codes)
            }
        }
    }

    /// Parse SVG path data. Relative, shorthand and arc commands are reduced
    /// to absolute moves, lines and Beziers.
    pub fn from_svg(data: &str) -> RenderResult<Self> {
        let mut vertices = Vec::new();
        let mut codes = Vec::new();
        for segment in svgtypes::SimplifyingPathParser::from(data) {
            let segment = segment
                .map_err(|e| RenderError::invalid(format!("Invalid SVG path: {e}")))?;
            match segment {
                svgtypes::SimplePathSegment::MoveTo { x, y } => {
                    vertices.push([x, y]);
                    codes.push(PathCode::MoveTo);
                }
                svgtypes::SimplePathSegment::LineTo { x, y } => {
                    vertices.push([x, y]);
                    codes.push(PathCode::LineTo);
                }
                svgtypes::SimplePathSegment::Quadratic { x1, y1, x, y } => {
                    vertices.extend([[x1, y1], [x, y]]);
                    codes.extend([PathCode::Curve3; 2]);
                }
                svgtypes::SimplePathSegment::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    vertices.extend([[x1, y1], [x2, y2], [x, y]]);
                    codes.extend([PathCode::Curve4; 3]);
                }
                svgtypes::SimplePathSegment::ClosePath => {
                    let last = vertices.last().copied().unwrap_or([0.0, 0.0]);
                    vertices.push(last);
                    codes.push(PathCode::ClosePoly);
                }
            }
        }
        Self::with_codes(vertices, codes)
    }

    /// Closed axis-aligned rectangle.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        let vertices = vec![
            [x, y],
            [x + width, y],
            [x + width, y + height],
            [x, y + height],
            [x, y],
        ];
        let codes = vec![
            PathCode::MoveTo,
            PathCode::LineTo,
            PathCode::LineTo,
            PathCode::LineTo,
            PathCode::ClosePoly,
        ];
        Self {
            vertices,
            codes: Some(codes),
        }
    }

    /// Circle of radius 1 around the origin, made of cubic Beziers.
    pub fn unit_circle() -> Self {
        Self::from_kurbo(&kurbo::Circle::new((0.0, 0.0), 1.0).to_path(1e-6))
    }

    /// Regular star with `points` tips on the unit circle.
    pub fn unit_regular_star(points: usize, inner_radius: f64) -> Self {
        let n = points.max(2) * 2;
        let mut vertices: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                let theta = std::f64::consts::FRAC_PI_2
                    + 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                let r = if i % 2 == 0 { 1.0 } else { inner_radius };
                [r * theta.cos(), r * theta.sin()]
            })
            .collect();
        vertices.push(vertices[0]);
        let mut codes = vec![PathCode::LineTo; n + 1];
        codes[0] = PathCode::MoveTo;
        codes[n] = PathCode::ClosePoly;
        Self {
            vertices,
            codes: Some(codes),
        }
    }

    pub(crate) fn from_kurbo(bez: &kurbo::BezPath) -> Self {
        let mut vertices = Vec::new();
        let mut codes = Vec::new();
        let mut last = [0.0, 0.0];
        for el in bez.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    last = [p.x, p.y];
                    vertices.push(last);
                    codes.push(PathCode::MoveTo);
                }
                PathEl::LineTo(p) => {
                    last = [p.x, p.y];
                    vertices.push(last);
                    codes.push(PathCode::LineTo);
                }
                PathEl::QuadTo(c, p) => {
                    last = [p.x, p.y];
                    vertices.extend([[c.x, c.y], last]);
                    codes.extend([PathCode::Curve3; 2]);
                }
                PathEl::CurveTo(c1, c2, p) => {
                    last = [p.x, p.y];
                    vertices.extend([[c1.x, c1.y], [c2.x, c2.y], last]);
                    codes.extend([PathCode::Curve4; 3]);
                }
                PathEl::ClosePath => {
                    vertices.push(last);
                    codes.push(PathCode::ClosePoly);
                }
            }
        }
        Self {
            vertices,
            codes: Some(codes),
        }
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    pub fn codes(&self) -> Option<&[PathCode]> {
        self.codes.as_deref()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Hash of the exact vertex bits and codes, used to recognise repeated shapes.
    pub(crate) fn content_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.vertices.len().hash(&mut hasher);
        for [x, y] in &self.vertices {
            x.to_bits().hash(&mut hasher);
            y.to_bits().hash(&mut hasher);
        }
        self.codes.hash(&mut hasher);
        hasher.finish()
    }

    /// Bitwise equality of vertices and codes; unlike `==`, NaN vertices
    /// compare equal to themselves.
    pub(crate) fn same_content(&self, other: &Path) -> bool {
        std::ptr::eq(self, other)
            || (self.codes == other.codes
                && self.vertices.len() == other.vertices.len()
                && self
                    .vertices
                    .iter()
                    .zip(&other.vertices)
                    .all(|(a, b)| {
                        a[0].to_bits() == b[0].to_bits() && a[1].to_bits() == b[1].to_bits()
                    }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_compares_bits() {
        let a = Path::polyline(vec![[0.0, 0.0], [f64::NAN, 1.0]]);
        let b = Path::polyline(vec![[0.0, 0.0], [f64::NAN, 1.0]]);
        let c = Path::polyline(vec![[-0.0, 0.0], [f64::NAN, 1.0]]);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_from_flat_shape_checks() {
        let coords = [0.0, 0.0, 1.0, 1.0, 2.0, 0.0];
        let path = Path::from_flat(&coords, (3, 2), None).unwrap();
        assert_eq!(path.len(), 3);
        assert!(path.codes().is_none());

        assert!(matches!(
            Path::from_flat(&coords, (2, 3), None),
            Err(RenderError::InvalidArgument(_))
        ));
        assert!(matches!(
            Path::from_flat(&coords, (4, 2), None),
            Err(RenderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_codes_length_mismatch() {
        let err = Path::with_codes(vec![[0.0, 0.0], [1.0, 1.0]], vec![PathCode::MoveTo]);
        assert!(matches!(err, Err(RenderError::InvalidArgument(_))));
    }

    #[test]
    fn test_truncated_curve_rejected() {
        let err = Path::with_codes(
            vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]],
            vec![PathCode::MoveTo, PathCode::Curve4, PathCode::Curve4],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_raw_code() {
        let err = Path::from_flat(&[0.0, 0.0], (1, 2), Some(&[7]));
        assert!(matches!(err, Err(RenderError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_svg() {
        let path = Path::from_svg("M 0 0 L 10 0 Q 15 5 10 10 Z").unwrap();
        let codes = path.codes().unwrap();
        assert_eq!(
            codes,
            &[
                PathCode::MoveTo,
                PathCode::LineTo,
                PathCode::Curve3,
                PathCode::Curve3,
                PathCode::ClosePoly
            ]
        );
        assert_eq!(path.vertices()[3], [10.0, 10.0]);
        assert!(Path::from_svg("M 0 0 L").is_err());
    }

    #[test]
    fn test_unit_circle_is_closed_cubics() {
        let circle = Path::unit_circle();
        let codes = circle.codes().unwrap();
        assert_eq!(codes[0], PathCode::MoveTo);
        assert_eq!(*codes.last().unwrap(), PathCode::ClosePoly);
        assert!(codes.contains(&PathCode::Curve4));
        for [x, y] in circle.vertices() {
            // Control points sit slightly outside the circle.
            assert!((x * x + y * y).sqrt() < 1.4);
        }
    }

    #[test]
    fn test_content_hash_distinguishes_shapes() {
        let a = Path::rectangle(0.0, 0.0, 1.0, 1.0);
        let b = Path::rectangle(0.0, 0.0, 1.0, 2.0);
        assert_eq!(a.content_hash(), a.clone().content_hash());
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
