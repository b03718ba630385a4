//! Style enums: line caps and joins, antialiasing modes.

use crate::error::RenderError;
use std::str::FromStr;

/// Line widths (in device units) below this use the precise antialiasing mode
/// when antialiasing is requested as a plain boolean.
pub const PRECISE_ANTIALIAS_MAX_LINE_WIDTH: f64 = 1.0 / 3.0;

/// Line cap style for stroke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    /// Flat edge at the endpoint.
    #[default]
    Butt,
    /// Rounded edge extending past the endpoint.
    Round,
    /// Square edge extending half a line width past the endpoint.
    Projecting,
}

impl LineCap {
    pub fn name(self) -> &'static str {
        match self {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Projecting => "projecting",
        }
    }
}

impl FromStr for LineCap {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "butt" => Ok(LineCap::Butt),
            "round" => Ok(LineCap::Round),
            "projecting" => Ok(LineCap::Projecting),
            _ => Err(RenderError::invalid(format!("Invalid capstyle: {s}"))),
        }
    }
}

impl From<LineCap> for tiny_skia::LineCap {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Projecting => tiny_skia::LineCap::Square,
        }
    }
}

/// Line join style for stroke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    /// Sharp corner.
    Miter,
    /// Rounded corner.
    #[default]
    Round,
    /// Beveled corner.
    Bevel,
}

impl LineJoin {
    pub fn name(self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }
}

impl FromStr for LineJoin {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "miter" => Ok(LineJoin::Miter),
            "round" => Ok(LineJoin::Round),
            "bevel" => Ok(LineJoin::Bevel),
            _ => Err(RenderError::invalid(format!("Invalid joinstyle: {s}"))),
        }
    }
}

impl From<LineJoin> for tiny_skia::LineJoin {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        }
    }
}

/// Antialiasing mode applied to a drawing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialias {
    #[default]
    Default,
    None,
    Gray,
    Subpixel,
    Fast,
    Good,
    Best,
}

impl Antialias {
    pub fn is_enabled(self) -> bool {
        self != Antialias::None
    }

    /// Whether the high-quality rasterization pipeline is requested.
    pub fn is_precise(self) -> bool {
        matches!(self, Antialias::Good | Antialias::Best)
    }
}

/// Antialiasing as configured by the caller: either an explicit mode or a
/// plain on/off switch resolved against the line width at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntialiasSetting {
    Mode(Antialias),
    Enabled(bool),
}

impl Default for AntialiasSetting {
    fn default() -> Self {
        AntialiasSetting::Enabled(true)
    }
}

impl From<bool> for AntialiasSetting {
    fn from(enabled: bool) -> Self {
        AntialiasSetting::Enabled(enabled)
    }
}

impl From<Antialias> for AntialiasSetting {
    fn from(mode: Antialias) -> Self {
        AntialiasSetting::Mode(mode)
    }
}

impl AntialiasSetting {
    /// Pick the concrete mode for a device-space line width.
    ///
    /// Lines thinner than [`PRECISE_ANTIALIAS_MAX_LINE_WIDTH`] get
    /// [`Antialias::Best`]. On raster surfaces that only selects tiny-skia's
    /// high-quality pipeline (`force_hq_pipeline`); coverage is computed the
    /// same way as for [`Antialias::Fast`], so thin lines are not rendered
    /// with finer coverage.
    pub fn resolve(self, line_width: f64) -> Antialias {
        match self {
            AntialiasSetting::Mode(mode) => mode,
            AntialiasSetting::Enabled(true) if line_width < PRECISE_ANTIALIAS_MAX_LINE_WIDTH => {
                Antialias::Best
            }
            AntialiasSetting::Enabled(true) => Antialias::Fast,
            AntialiasSetting::Enabled(false) => Antialias::None,
        }
    }
}

/// Which half of a fill-and-stroke a cached pattern stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawOp {
    Fill,
    Stroke,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("butt", LineCap::Butt)]
    #[case("round", LineCap::Round)]
    #[case("projecting", LineCap::Projecting)]
    fn test_capstyle_round_trip(#[case] name: &str, #[case] cap: LineCap) {
        assert_eq!(name.parse::<LineCap>().unwrap(), cap);
        assert_eq!(cap.name(), name);
    }

    #[rstest]
    #[case("miter", LineJoin::Miter)]
    #[case("round", LineJoin::Round)]
    #[case("bevel", LineJoin::Bevel)]
    fn test_joinstyle_round_trip(#[case] name: &str, #[case] join: LineJoin) {
        assert_eq!(name.parse::<LineJoin>().unwrap(), join);
        assert_eq!(join.name(), name);
    }

    #[test]
    fn test_invalid_style_names() {
        assert!(matches!(
            "square".parse::<LineCap>(),
            Err(RenderError::InvalidArgument(_))
        ));
        assert!(matches!(
            "sharp".parse::<LineJoin>(),
            Err(RenderError::InvalidArgument(_))
        ));
    }

    #[rstest]
    #[case(AntialiasSetting::Enabled(true), 0.2, Antialias::Best)]
    #[case(AntialiasSetting::Enabled(true), 1.0 / 3.0, Antialias::Fast)]
    #[case(AntialiasSetting::Enabled(true), 2.0, Antialias::Fast)]
    #[case(AntialiasSetting::Enabled(false), 0.2, Antialias::None)]
    #[case(AntialiasSetting::Mode(Antialias::Gray), 0.2, Antialias::Gray)]
    #[case(AntialiasSetting::Mode(Antialias::None), 5.0, Antialias::None)]
    fn test_antialias_resolution(
        #[case] setting: AntialiasSetting,
        #[case] line_width: f64,
        #[case] expected: Antialias,
    ) {
        assert_eq!(setting.resolve(line_width), expected);
    }

    #[test]
    fn test_precise_mode_keeps_regular_coverage() {
        let thin = AntialiasSetting::Enabled(true).resolve(0.2);
        let thick = AntialiasSetting::Enabled(true).resolve(2.0);
        // Both antialias; the thin one only asks for the high-quality pipeline.
        assert!(thin.is_enabled() && thick.is_enabled());
        assert!(thin.is_precise());
        assert!(!thick.is_precise());
    }
}
