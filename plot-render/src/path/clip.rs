//! Cohen-Sutherland segment clipping against the representable coordinate box.

/// Largest device coordinate handed to the rasterizer (2^22). Beyond this,
/// single-precision coordinates lose sub-pixel accuracy.
pub const COORD_LIMIT: f64 = (1u32 << 22) as f64;

const LEFT: u8 = 1 << 0;
const RIGHT: u8 = 1 << 1;
const BOTTOM: u8 = 1 << 2;
const TOP: u8 = 1 << 3;

fn outcode(x: f64, y: f64) -> u8 {
    let mut code = 0;
    if x < -COORD_LIMIT {
        code |= LEFT;
    } else if x > COORD_LIMIT {
        code |= RIGHT;
    }
    if y < -COORD_LIMIT {
        code |= BOTTOM;
    } else if y > COORD_LIMIT {
        code |= TOP;
    }
    code
}

/// Outcome of clipping one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clipped {
    /// The (possibly shortened) segment lies inside the box. `start_moved`
    /// is set when the start point had to be pulled onto the boundary.
    Inside {
        start: (f64, f64),
        end: (f64, f64),
        start_moved: bool,
    },
    /// Nothing of the segment is inside the box.
    Outside,
}

/// Clip the segment `start -> end` to `[-COORD_LIMIT, COORD_LIMIT]^2`.
///
/// Most segments are expected to be fully inside, which costs two outcode
/// computations.
pub fn clip_segment(start: (f64, f64), end: (f64, f64)) -> Clipped {
    let (mut x0, mut y0) = start;
    let (mut x1, mut y1) = end;
    let mut code0 = outcode(x0, y0);
    let mut code1 = outcode(x1, y1);
    let mut start_moved = false;
    loop {
        if code0 | code1 == 0 {
            return Clipped::Inside {
                start: (x0, y0),
                end: (x1, y1),
                start_moved,
            };
        }
        if code0 & code1 != 0 {
            return Clipped::Outside;
        }
        let code = if code0 != 0 { code0 } else { code1 };
        let (xc, yc) = if code & TOP != 0 {
            (x0 + (x1 - x0) * (COORD_LIMIT - y0) / (y1 - y0), COORD_LIMIT)
        } else if code & BOTTOM != 0 {
            (x0 + (x1 - x0) * (-COORD_LIMIT - y0) / (y1 - y0), -COORD_LIMIT)
        } else if code & RIGHT != 0 {
            (COORD_LIMIT, y0 + (y1 - y0) * (COORD_LIMIT - x0) / (x1 - x0))
        } else {
            (-COORD_LIMIT, y0 + (y1 - y0) * (-COORD_LIMIT - x0) / (x1 - x0))
        };
        if code == code0 {
            start_moved = true;
            x0 = xc;
            y0 = yc;
            code0 = outcode(x0, y0);
        } else {
            x1 = xc;
            y1 = yc;
            code1 = outcode(x1, y1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_segment_unchanged() {
        let clipped = clip_segment((1.5, -2.25), (1e6, 3e6));
        assert_eq!(
            clipped,
            Clipped::Inside {
                start: (1.5, -2.25),
                end: (1e6, 3e6),
                start_moved: false
            }
        );
    }

    #[test]
    fn test_outside_segment_dropped() {
        let far = 2.0 * COORD_LIMIT;
        assert_eq!(clip_segment((far, 0.0), (far, 10.0)), Clipped::Outside);
        assert_eq!(clip_segment((0.0, -far), (10.0, -far)), Clipped::Outside);
        // Both beyond the top-right corner.
        assert_eq!(clip_segment((far, far), (far * 2.0, far)), Clipped::Outside);
    }

    #[test]
    fn test_crossing_segment_truncated_to_boundary() {
        let far = 2.0 * COORD_LIMIT;
        match clip_segment((0.0, 0.0), (far, 0.0)) {
            Clipped::Inside {
                start,
                end,
                start_moved,
            } => {
                assert_eq!(start, (0.0, 0.0));
                assert_eq!(end, (COORD_LIMIT, 0.0));
                assert!(!start_moved);
            }
            Clipped::Outside => panic!("segment should be kept"),
        }
    }

    #[test]
    fn test_crossing_from_outside_moves_start() {
        let far = 2.0 * COORD_LIMIT;
        match clip_segment((0.0, -far), (0.0, 0.0)) {
            Clipped::Inside {
                start,
                end,
                start_moved,
            } => {
                assert_eq!(start, (0.0, -COORD_LIMIT));
                assert_eq!(end, (0.0, 0.0));
                assert!(start_moved);
            }
            Clipped::Outside => panic!("segment should be kept"),
        }
    }

    #[test]
    fn test_diagonal_through_box_clipped_on_both_ends() {
        let far = 2.0 * COORD_LIMIT;
        match clip_segment((-far, -far), (far, far)) {
            Clipped::Inside { start, end, .. } => {
                assert_eq!(start, (-COORD_LIMIT, -COORD_LIMIT));
                assert_eq!(end, (COORD_LIMIT, COORD_LIMIT));
            }
            Clipped::Outside => panic!("segment should be kept"),
        }
    }
}
