//! Conversion of abstract paths into device-space `tiny_skia` paths.
//!
//! Paths with codes are replayed exactly, with coordinates clamped to the
//! representable range. Codeless paths are polylines, clipped segment by
//! segment. Both modes snap axis-aligned segments when a snapper is active.

use super::clip::{clip_segment, Clipped, COORD_LIMIT};
use super::snap::Snapper;
use super::{Path, PathCode};
use crate::error::{RenderError, RenderResult};
use crate::transform::apply;
use kurbo::Affine;

type Pt = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Move(Pt),
    Line(Pt),
    Cubic(Pt, Pt, Pt),
    Close,
}

fn is_finite((x, y): Pt) -> bool {
    x.is_finite() && y.is_finite()
}

fn clamp((x, y): Pt) -> Pt {
    (
        x.clamp(-COORD_LIMIT, COORD_LIMIT),
        y.clamp(-COORD_LIMIT, COORD_LIMIT),
    )
}

/// Device-space path under construction. Tracks the current point the way a
/// drawing surface does: a line without a current point starts a sub-path.
struct OpBuffer {
    ops: Vec<Op>,
    current: Option<Pt>,
    subpath_start: Option<Pt>,
    snapper: Snapper,
}

impl OpBuffer {
    fn new(snapper: Snapper, capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
            current: None,
            subpath_start: None,
            snapper,
        }
    }

    fn move_to(&mut self, p: Pt) {
        self.ops.push(Op::Move(p));
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    fn new_sub_path(&mut self) {
        self.current = None;
    }

    fn line_to(&mut self, p: Pt) {
        let Some(prev) = self.current else {
            self.move_to(p);
            return;
        };
        self.push_line(prev, p);
        self.current = Some(p);
    }

    /// Record a line from `start` (the end of the previous op) to `end`,
    /// snapping both ends if the line is horizontal or vertical.
    fn push_line(&mut self, start: Pt, end: Pt) {
        if self.snapper.is_enabled() && (start.0 == end.0 || start.1 == end.1) {
            self.snap_last(start);
            self.ops.push(Op::Line(self.snapper.snap_point(end)));
        } else {
            self.ops.push(Op::Line(end));
        }
    }

    fn snap_last(&mut self, raw: Pt) {
        let snapped = self.snapper.snap_point(raw);
        match self.ops.last_mut() {
            Some(Op::Move(p)) | Some(Op::Line(p)) | Some(Op::Cubic(_, _, p)) => *p = snapped,
            Some(Op::Close) | None => {}
        }
    }

    fn cubic_to(&mut self, c1: Pt, c2: Pt, end: Pt) {
        self.ops.push(Op::Cubic(c1, c2, end));
        self.current = Some(end);
    }

    fn close(&mut self) {
        if self.current.is_some() {
            self.ops.push(Op::Close);
            self.current = self.subpath_start;
        }
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        let mut pb = tiny_skia::PathBuilder::with_capacity(self.ops.len(), self.ops.len() * 3);
        for op in self.ops {
            match op {
                Op::Move((x, y)) => pb.move_to(x as f32, y as f32),
                Op::Line((x, y)) => pb.line_to(x as f32, y as f32),
                Op::Cubic((x1, y1), (x2, y2), (x, y)) => pb.cubic_to(
                    x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
                ),
                Op::Close => pb.close(),
            }
        }
        pb.finish()
    }
}

/// Load `path` through `matrix` into a device-space path.
///
/// Returns `None` when nothing drawable remains (empty path, or every vertex
/// non-finite).
pub fn load_path(path: &Path, matrix: &Affine, snapper: Snapper) -> Option<tiny_skia::Path> {
    let buffer = match path.codes() {
        Some(codes) => load_exact(path.vertices(), codes, matrix, snapper),
        None => load_polyline(path.vertices(), matrix, snapper),
    };
    buffer.finish()
}

/// Load vertices `start..stop` of a codeless path, for chunked stroking.
pub fn load_path_range(
    path: &Path,
    start: usize,
    stop: usize,
    matrix: &Affine,
    snapper: Snapper,
) -> RenderResult<Option<tiny_skia::Path>> {
    if path.codes().is_some() {
        return Err(RenderError::invalid("Sub-path ranges need a codeless path"));
    }
    if !(start <= stop && stop <= path.len()) {
        return Err(RenderError::invalid("Invalid bounds for sub-path"));
    }
    Ok(load_polyline(&path.vertices()[start..stop], matrix, snapper).finish())
}

fn load_exact(
    vertices: &[[f64; 2]],
    codes: &[PathCode],
    matrix: &Affine,
    snapper: Snapper,
) -> OpBuffer {
    let mut buf = OpBuffer::new(snapper, codes.len());
    let point = |i: usize| vertices.get(i).map(|&[x, y]| apply(matrix, x, y));
    let mut i = 0;
    while i < codes.len() {
        let Some(raw) = point(i) else { break };
        let finite = is_finite(raw);
        let p0 = clamp(raw);
        match codes[i] {
            PathCode::Stop => {}
            PathCode::MoveTo if finite => buf.move_to(p0),
            PathCode::LineTo if finite => buf.line_to(p0),
            PathCode::MoveTo | PathCode::LineTo => buf.new_sub_path(),
            PathCode::Curve3 => {
                let Some(end) = point(i + 1) else { break };
                i += 1;
                if !is_finite(end) {
                    buf.new_sub_path();
                } else {
                    let end = clamp(end);
                    match buf.current {
                        Some(prev) if finite => buf.cubic_to(
                            ((prev.0 + 2.0 * p0.0) / 3.0, (prev.1 + 2.0 * p0.1) / 3.0),
                            ((2.0 * p0.0 + end.0) / 3.0, (2.0 * p0.1 + end.1) / 3.0),
                            end,
                        ),
                        _ => buf.move_to(end),
                    }
                }
            }
            PathCode::Curve4 => {
                let (Some(c2), Some(end)) = (point(i + 1), point(i + 2)) else {
                    break;
                };
                i += 2;
                if !is_finite(end) {
                    buf.new_sub_path();
                } else if finite && is_finite(c2) && buf.current.is_some() {
                    buf.cubic_to(p0, clamp(c2), clamp(end));
                } else {
                    buf.move_to(clamp(end));
                }
            }
            PathCode::ClosePoly => buf.close(),
        }
        i += 1;
    }
    buf
}

fn load_polyline(vertices: &[[f64; 2]], matrix: &Affine, snapper: Snapper) -> OpBuffer {
    let mut buf = OpBuffer::new(snapper, vertices.len());
    // Previous point before clipping and snapping.
    let mut prev: Option<Pt> = None;
    for &[x, y] in vertices {
        let p = apply(matrix, x, y);
        if !is_finite(p) {
            prev = None;
            continue;
        }
        let Some(raw_prev) = prev.replace(p) else {
            buf.ops.push(Op::Move(clamp(p)));
            continue;
        };
        match clip_segment(raw_prev, p) {
            Clipped::Inside {
                start,
                end,
                start_moved,
            } => {
                if start_moved {
                    buf.ops.push(Op::Move(start));
                }
                buf.push_line(start, end);
            }
            // Keep the raw destination as the start of whatever follows.
            Clipped::Outside => buf.ops.push(Op::Move(clamp(p))),
        }
    }
    buf
}
