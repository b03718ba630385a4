//! User-space transforms and their conversion to device matrices.
//!
//! User space has its origin at the bottom left with y pointing up; device
//! space has its origin at the top left with y pointing down. Device matrices
//! are [`kurbo::Affine`] values, converted to [`tiny_skia::Transform`] only at
//! the point where something is handed to the rasterizer.

use crate::error::{RenderError, RenderResult};
use kurbo::{Affine, Point};

/// A 3x3 row-major user-space transform.
///
/// Only affine transforms can be rendered; a transform built with
/// [`Transform2D::non_affine`] is rejected by every draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    matrix: [[f64; 3]; 3],
    is_affine: bool,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    pub fn identity() -> Self {
        Self::from_values(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Build the affine map `x' = a x + c y + e`, `y' = b x + d y + f`.
    pub fn from_values(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            matrix: [[a, c, e], [b, d, f], [0.0, 0.0, 1.0]],
            is_affine: true,
        }
    }

    /// Wrap an arbitrary 3x3 matrix that is not an affine map.
    pub fn non_affine(matrix: [[f64; 3]; 3]) -> Self {
        Self {
            matrix,
            is_affine: false,
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::from_values(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::from_values(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation (in user space) by `degrees`.
    pub fn rotate_deg(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::from_values(c, s, -s, c, 0.0, 0.0)
    }

    /// Apply `self` first, then `next`.
    pub fn then(&self, next: &Transform2D) -> Self {
        let a = &next.matrix;
        let b = &self.matrix;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
            }
        }
        Self {
            matrix: out,
            is_affine: self.is_affine && next.is_affine,
        }
    }

    pub fn is_affine(&self) -> bool {
        self.is_affine
    }

    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.matrix;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    fn check_affine(&self) -> RenderResult<()> {
        if self.is_affine {
            Ok(())
        } else {
            Err(RenderError::invalid("Only affine transforms are handled"))
        }
    }
}

/// Device matrix for `transform`, flipping y around `height`.
///
/// Pass `height = 0.0` for transforms whose output is a displacement (marker
/// shapes, collection offsets) rather than a position on the canvas.
pub fn device_matrix(transform: &Transform2D, height: f64) -> RenderResult<Affine> {
    transform.check_affine()?;
    let m = transform.matrix();
    Ok(Affine::new([
        m[0][0],
        -m[1][0],
        m[0][1],
        -m[1][1],
        m[0][2],
        height - m[1][2],
    ]))
}

/// Device matrix for a local transform expressed relative to `master`.
///
/// The local transform is applied first and the (already flipped) master
/// matrix second, so a collection can share one master matrix across many
/// per-element transforms.
pub fn relative_matrix(transform: &Transform2D, master: &Affine) -> RenderResult<Affine> {
    transform.check_affine()?;
    let m = transform.matrix();
    let local = Affine::new([m[0][0], m[1][0], m[0][1], m[1][1], m[0][2], m[1][2]]);
    Ok(*master * local)
}

pub(crate) fn apply(matrix: &Affine, x: f64, y: f64) -> (f64, f64) {
    let p = *matrix * Point::new(x, y);
    (p.x, p.y)
}

/// Same matrix with its translation removed.
pub(crate) fn linear_part(matrix: &Affine) -> Affine {
    let [a, b, c, d, _, _] = matrix.as_coeffs();
    Affine::new([a, b, c, d, 0.0, 0.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_matrix_flips_y() {
        let t = Transform2D::from_values(2.0, 0.0, 0.0, 3.0, 10.0, 20.0);
        let m = device_matrix(&t, 100.0).unwrap();
        assert_eq!(m.as_coeffs(), [2.0, 0.0, 0.0, -3.0, 10.0, 80.0]);
        // User (0, 0) lands on device (10, 80); user y grows upward.
        assert_eq!(apply(&m, 0.0, 0.0), (10.0, 80.0));
        assert_eq!(apply(&m, 0.0, 1.0), (10.0, 77.0));
    }

    #[test]
    fn test_device_matrix_off_diagonal_signs() {
        let t = Transform2D::from_values(1.0, 4.0, 5.0, 1.0, 0.0, 0.0);
        let m = device_matrix(&t, 0.0).unwrap();
        assert_eq!(m.as_coeffs(), [1.0, -4.0, 5.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_relative_matrix_applies_local_first() {
        let master = device_matrix(&Transform2D::identity(), 50.0).unwrap();
        let local = Transform2D::translate(5.0, 5.0);
        let m = relative_matrix(&local, &master).unwrap();
        // (0, 0) -> local (5, 5) -> master flip (5, 45).
        assert_eq!(apply(&m, 0.0, 0.0), (5.0, 45.0));
    }

    #[test]
    fn test_non_affine_rejected() {
        let t = Transform2D::non_affine([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.1, 0.0, 1.0]]);
        assert!(matches!(
            device_matrix(&t, 10.0),
            Err(RenderError::InvalidArgument(_))
        ));
        let master = Affine::IDENTITY;
        assert!(relative_matrix(&t, &master).is_err());
        // Composition with a non-affine transform stays non-affine.
        assert!(!Transform2D::identity().then(&t).is_affine());
    }

    #[test]
    fn test_then_composes_in_order() {
        let t = Transform2D::scale(2.0, 2.0).then(&Transform2D::translate(1.0, 0.0));
        assert_eq!(t.transform_point(1.0, 1.0), (3.0, 2.0));
        let r = Transform2D::rotate_deg(90.0);
        let (x, y) = r.transform_point(1.0, 0.0);
        assert!(x.abs() < 1e-12 && (y - 1.0).abs() < 1e-12);
    }
}
