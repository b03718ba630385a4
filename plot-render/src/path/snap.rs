//! Pixel snapping of axis-aligned segments.

/// How device coordinates are rounded before being handed to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapper {
    /// Leave coordinates untouched.
    Off,
    /// Snap to pixel centers (`floor(x) + 0.5`), so odd-width strokes cover whole pixels.
    PixelCenter,
    /// Snap to pixel boundaries (`round(x)`), for even widths and for the edges of fills.
    PixelEdge,
}

impl Snapper {
    /// Pick the rule for a device-space line width.
    ///
    /// A line width of exactly zero means the edge is defined by the fill, so
    /// it snaps between pixels like even widths do.
    pub fn for_line_width(enabled: bool, line_width: f64) -> Self {
        if !enabled {
            return Snapper::Off;
        }
        let odd = (line_width.round() as i64) % 2 == 1;
        if line_width > 0.0 && (line_width < 1.0 || odd) {
            Snapper::PixelCenter
        } else {
            Snapper::PixelEdge
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Snapper::Off
    }

    pub fn snap(self, x: f64) -> f64 {
        match self {
            Snapper::Off => x,
            Snapper::PixelCenter => x.floor() + 0.5,
            Snapper::PixelEdge => x.round(),
        }
    }

    pub(crate) fn snap_point(self, (x, y): (f64, f64)) -> (f64, f64) {
        (self.snap(x), self.snap(y))
    }
}
