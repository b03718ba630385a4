//! Hatch pattern geometry.
//!
//! A hatch string is a list of pattern characters; repeating a character
//! makes that part of the pattern denser. The geometry lives in the unit
//! square (y up) and is tiled by the renderer.

use crate::path::{Path, PathCode};

fn push_line(vertices: &mut Vec<[f64; 2]>, codes: &mut Vec<PathCode>, a: [f64; 2], b: [f64; 2]) {
    vertices.extend([a, b]);
    codes.extend([PathCode::MoveTo, PathCode::LineTo]);
}

/// `num` evenly spaced offsets in [0, 1), centered in their cells.
fn centered_steps(num: usize) -> impl Iterator<Item = f64> {
    let step = 1.0 / num as f64;
    (0..num).map(move |i| i as f64 * step + step / 2.0)
}

/// `num + 1` offsets from -0.5 to 0.5 inclusive.
fn diagonal_steps(num: usize) -> impl Iterator<Item = f64> {
    (0..=num).map(move |i| -0.5 + i as f64 / num as f64)
}

struct ShapeHatch {
    shape: Path,
    size: f64,
    filled: bool,
    rows: usize,
}

impl ShapeHatch {
    fn append(&self, vertices: &mut Vec<[f64; 2]>, codes: &mut Vec<PathCode>) {
        if self.rows == 0 {
            return;
        }
        let offset = 1.0 / self.rows as f64;
        let scale = offset * self.size;
        let shape_codes = self.shape.codes().unwrap_or(&[]);
        let outer: Vec<[f64; 2]> = self
            .shape
            .vertices()
            .iter()
            .map(|[x, y]| [x * scale, y * scale])
            .collect();
        // Outlines get a smaller mirrored copy, which winds the other way, so
        // that filling leaves a ring.
        let inner: Vec<[f64; 2]> = outer.iter().map(|[x, y]| [-x * 0.9, y * 0.9]).collect();
        for row in 0..=self.rows {
            let row_pos = row as f64 * offset;
            let cols: Vec<f64> = if row % 2 == 0 {
                (0..=self.rows).map(|i| i as f64 * offset).collect()
            } else {
                (0..self.rows)
                    .map(|i| offset / 2.0 + i as f64 * offset)
                    .collect()
            };
            for col_pos in cols {
                let place = |v: &[f64; 2]| [v[0] + col_pos, v[1] + row_pos];
                vertices.extend(outer.iter().map(place));
                codes.extend_from_slice(shape_codes);
                if !self.filled {
                    vertices.extend(inner.iter().map(place));
                    codes.extend_from_slice(shape_codes);
                }
            }
        }
    }
}

/// Build the unit-square geometry for `hatch`, or `None` if it draws nothing.
pub fn hatch_path(hatch: &str, density: usize) -> Option<Path> {
    let count = |chars: &[char]| hatch.chars().filter(|c| chars.contains(c)).count() * density;
    let mut vertices = Vec::new();
    let mut codes = Vec::new();

    let horizontal = count(&['-', '+']);
    for y in centered_steps(horizontal) {
        push_line(&mut vertices, &mut codes, [0.0, y], [1.0, y]);
    }
    let vertical = count(&['|', '+']);
    for x in centered_steps(vertical) {
        push_line(&mut vertices, &mut codes, [x, 0.0], [x, 1.0]);
    }
    let north_east = count(&['/', 'x', 'X']);
    if north_east > 0 {
        for s in diagonal_steps(north_east) {
            push_line(&mut vertices, &mut codes, [s, -s], [1.0 + s, 1.0 - s]);
        }
    }
    let south_east = count(&['\\', 'x', 'X']);
    if south_east > 0 {
        for s in diagonal_steps(south_east) {
            push_line(&mut vertices, &mut codes, [s, 1.0 + s], [1.0 + s, s]);
        }
    }

    let shapes = [
        ShapeHatch {
            shape: Path::unit_circle(),
            size: 0.2,
            filled: false,
            rows: count(&['o']),
        },
        ShapeHatch {
            shape: Path::unit_circle(),
            size: 0.35,
            filled: false,
            rows: count(&['O']),
        },
        ShapeHatch {
            shape: Path::unit_circle(),
            size: 0.1,
            filled: true,
            rows: count(&['.']),
        },
        ShapeHatch {
            shape: Path::unit_regular_star(5, 0.5),
            size: 1.0 / 3.0,
            filled: true,
            rows: count(&['*']),
        },
    ];
    for shape in &shapes {
        shape.append(&mut vertices, &mut codes);
    }

    if vertices.is_empty() {
        return None;
    }
    Path::with_codes(vertices, codes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_characters_draw_nothing() {
        assert!(hatch_path("", 6).is_none());
        assert!(hatch_path("?", 6).is_none());
    }

    #[test]
    fn test_horizontal_lines() {
        let path = hatch_path("-", 2).unwrap();
        assert_eq!(
            path.vertices(),
            &[[0.0, 0.25], [1.0, 0.25], [0.0, 0.75], [1.0, 0.75]]
        );
    }

    #[test]
    fn test_repeated_character_is_denser() {
        let single = hatch_path("/", 6).unwrap();
        let double = hatch_path("//", 6).unwrap();
        assert_eq!(single.len(), 2 * 7);
        assert_eq!(double.len(), 2 * 13);
    }

    #[test]
    fn test_cross_combines_both_diagonals() {
        let cross = hatch_path("x", 1).unwrap();
        // Two lines per direction at density 1.
        assert_eq!(cross.len(), 8);
    }

    #[test]
    fn test_circle_rings_have_inner_outline() {
        let rings = hatch_path("o", 1).unwrap();
        let filled = hatch_path(".", 1).unwrap();
        // Rows 0 and 1 with two and one shapes respectively.
        let per_circle = Path::unit_circle().len();
        assert_eq!(rings.len(), 3 * per_circle * 2);
        assert_eq!(filled.len(), 3 * per_circle);
    }
}
