//! Hand-drawn ("xkcd") distortion of device-space paths.
//!
//! Paths are flattened and cut into roughly one pixel long pieces; each vertex
//! is then pushed perpendicular to its segment by a sine wave whose phase
//! advances at a pseudo-random rate. The generator is reseeded for every path
//! so the same input always wiggles the same way.

use tiny_skia::PathSegment;

/// Sketch parameters as set by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SketchParams {
    /// Amplitude of the wiggle, perpendicular to the line, in pixels.
    pub scale: f64,
    /// Length of one wiggle along the line, in pixels.
    pub length: f64,
    /// Factor by which the length is shrunk or expanded.
    pub randomness: f64,
}

impl SketchParams {
    pub fn new(scale: f64, length: Option<f64>, randomness: Option<f64>) -> Self {
        Self {
            scale,
            length: length.unwrap_or(128.0),
            randomness: randomness.unwrap_or(16.0),
        }
    }
}

const CURVE_STEPS: usize = 16;

/// Linear congruential generator (MSVC constants), seeded at zero.
struct Lcg(u32);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(214013).wrapping_add(2531011);
        self.0 as f64 / 4294967296.0
    }
}

struct Sketcher {
    scale: f64,
    p_scale: f64,
    log_randomness: f64,
    rng: Lcg,
    phase: f64,
    last: Option<(f64, f64)>,
}

impl Sketcher {
    fn new(params: &SketchParams) -> Self {
        Self {
            scale: params.scale,
            p_scale: 2.0 * std::f64::consts::PI / (params.length * params.randomness),
            log_randomness: 2.0 * params.randomness.ln(),
            rng: Lcg(0),
            phase: 0.0,
            last: None,
        }
    }

    fn start(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.phase = 0.0;
        self.last = Some((x, y));
        (x, y)
    }

    fn vertex(&mut self, x: f64, y: f64) -> (f64, f64) {
        let Some((last_x, last_y)) = self.last.replace((x, y)) else {
            return self.start(x, y);
        };
        self.phase += (self.rng.next_f64() * self.log_randomness).exp();
        let den = last_x - x;
        let num = last_y - y;
        let len = (num * num + den * den).sqrt();
        if len == 0.0 {
            return (x, y);
        }
        let r = (self.phase * self.p_scale).sin() * self.scale;
        (x + r / len * num, y - r / len * den)
    }
}

fn flatten(path: &tiny_skia::Path) -> Vec<(Vec<(f64, f64)>, bool)> {
    let mut polylines: Vec<(Vec<(f64, f64)>, bool)> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let pt = |p: tiny_skia::Point| (p.x as f64, p.y as f64);
    for segment in path.segments() {
        match segment {
            PathSegment::MoveTo(p) => {
                if current.len() > 1 {
                    polylines.push((std::mem::take(&mut current), false));
                }
                current.clear();
                current.push(pt(p));
            }
            PathSegment::LineTo(p) => current.push(pt(p)),
            PathSegment::QuadTo(c, p) => {
                let p0 = current.last().copied().unwrap_or((0.0, 0.0));
                let (c, p1) = (pt(c), pt(p));
                for k in 1..=CURVE_STEPS {
                    let t = k as f64 / CURVE_STEPS as f64;
                    let u = 1.0 - t;
                    current.push((
                        u * u * p0.0 + 2.0 * u * t * c.0 + t * t * p1.0,
                        u * u * p0.1 + 2.0 * u * t * c.1 + t * t * p1.1,
                    ));
                }
            }
            PathSegment::CubicTo(c1, c2, p) => {
                let p0 = current.last().copied().unwrap_or((0.0, 0.0));
                let (c1, c2, p1) = (pt(c1), pt(c2), pt(p));
                for k in 1..=CURVE_STEPS {
                    let t = k as f64 / CURVE_STEPS as f64;
                    let u = 1.0 - t;
                    let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
                    current.push((
                        w0 * p0.0 + w1 * c1.0 + w2 * c2.0 + w3 * p1.0,
                        w0 * p0.1 + w1 * c1.1 + w2 * c2.1 + w3 * p1.1,
                    ));
                }
            }
            PathSegment::Close => {
                if let Some(&first) = current.first() {
                    current.push(first);
                    let start = first;
                    polylines.push((std::mem::take(&mut current), true));
                    current.push(start);
                }
            }
        }
    }
    if current.len() > 1 {
        polylines.push((current, false));
    }
    polylines
}

/// Apply the sketch distortion to a device-space path.
pub fn sketch_path(path: &tiny_skia::Path, params: &SketchParams) -> Option<tiny_skia::Path> {
    if params.scale == 0.0 {
        return Some(path.clone());
    }
    let mut sketcher = Sketcher::new(params);
    let mut pb = tiny_skia::PathBuilder::new();
    for (points, closed) in flatten(path) {
        let Some(&(x0, y0)) = points.first() else {
            continue;
        };
        let (sx, sy) = sketcher.start(x0, y0);
        pb.move_to(sx as f32, sy as f32);
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let steps = ((b.0 - a.0).hypot(b.1 - a.1).ceil() as usize).max(1);
            for k in 1..=steps {
                let t = k as f64 / steps as f64;
                let (x, y) = sketcher.vertex(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
                pb.line_to(x as f32, y as f32);
            }
        }
        if closed {
            pb.close();
        }
    }
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal_line() -> tiny_skia::Path {
        let mut pb = tiny_skia::PathBuilder::new();
        pb.move_to(0.0, 50.0);
        pb.line_to(200.0, 50.0);
        pb.finish().unwrap()
    }

    #[test]
    fn test_zero_scale_is_identity() {
        let path = horizontal_line();
        let params = SketchParams::new(0.0, None, None);
        assert_eq!(sketch_path(&path, &params).unwrap(), path);
    }

    #[test]
    fn test_sketch_is_deterministic_and_bounded() {
        let path = horizontal_line();
        let params = SketchParams::new(3.0, Some(20.0), Some(2.0));
        let a = sketch_path(&path, &params).unwrap();
        let b = sketch_path(&path, &params).unwrap();
        assert_eq!(a, b);
        // One vertex per pixel of length.
        assert_eq!(a.points().len(), 201);
        let mut moved = false;
        for p in a.points() {
            assert!((p.y - 50.0).abs() <= 3.0 + 1e-4);
            moved |= (p.y - 50.0).abs() > 0.1;
        }
        assert!(moved);
    }

    #[test]
    fn test_lcg_sequence() {
        let mut rng = Lcg(0);
        let first = rng.next_f64();
        assert_eq!(first, 2531011.0 / 4294967296.0);
        assert!((0.0..1.0).contains(&rng.next_f64()));
    }
}
