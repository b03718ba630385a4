//! Renderer configuration.

use crate::error::RenderResult;
use crate::font_config::FontConfig;
use crate::geometry::Rgba;

/// Default `path.simplify_threshold` of the plotting library.
pub const DEFAULT_SIMPLIFY_THRESHOLD: f64 = 1.0 / 9.0;

/// Text shaping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapingMode {
    /// Full shaping: ligatures, kerning and complex scripts.
    #[default]
    Advanced,
    /// One glyph per character, no kerning.
    Basic,
}

impl From<ShapingMode> for cosmic_text::Shaping {
    fn from(mode: ShapingMode) -> Self {
        match mode {
            ShapingMode::Advanced => cosmic_text::Shaping::Advanced,
            ShapingMode::Basic => cosmic_text::Shaping::Basic,
        }
    }
}

/// Settings consumed by [`Renderer`](crate::Renderer) constructors.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Dots per inch; drives the point to pixel conversion `px = pt * dpi / 72`.
    pub dpi: f64,
    /// Path simplification threshold in pixels. Gates the marker stamper and
    /// the collection pattern cache; vector targets always use 0.
    pub simplify_threshold: f64,
    /// Stroke long codeless paths in chunks of this many segments (0 disables).
    pub path_chunksize: usize,
    /// Initial hatch color.
    pub hatch_color: Rgba,
    /// Initial hatch line width, in points.
    pub hatch_linewidth: f64,
    /// Hatch lines per inch for a single pattern character.
    pub hatch_density: usize,
    /// Text shaping strategy.
    pub shaping: ShapingMode,
    /// Fonts available to the text shaper.
    pub font: FontConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            dpi: 72.0,
            simplify_threshold: DEFAULT_SIMPLIFY_THRESHOLD,
            path_chunksize: 0,
            hatch_color: Rgba::BLACK,
            hatch_linewidth: 1.0,
            hatch_density: 6,
            shaping: ShapingMode::Advanced,
            font: FontConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_simplify_threshold(mut self, threshold: f64) -> Self {
        self.simplify_threshold = threshold;
        self
    }

    pub fn with_path_chunksize(mut self, chunksize: usize) -> Self {
        self.path_chunksize = chunksize;
        self
    }

    /// Set the initial hatch color from a color string such as "black" or
    /// "#4c4c4c".
    pub fn with_hatch_color(mut self, color: &str) -> RenderResult<Self> {
        self.hatch_color = Rgba::parse(color)?;
        Ok(self)
    }

    pub fn with_hatch_linewidth(mut self, width: f64) -> Self {
        self.hatch_linewidth = width;
        self
    }

    pub fn with_shaping(mut self, shaping: ShapingMode) -> Self {
        self.shaping = shaping;
        self
    }

    pub fn with_font_config(mut self, font: FontConfig) -> Self {
        self.font = font;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.dpi, 72.0);
        assert_eq!(config.simplify_threshold, 1.0 / 9.0);
        assert_eq!(config.path_chunksize, 0);
        assert_eq!(config.hatch_color, Rgba::BLACK);
        assert_eq!(config.hatch_density, 6);
        assert_eq!(config.shaping, ShapingMode::Advanced);
    }

    #[test]
    fn test_builder_methods() {
        let config = RendererConfig::default()
            .with_dpi(144.0)
            .with_simplify_threshold(0.0)
            .with_path_chunksize(100)
            .with_shaping(ShapingMode::Basic);
        assert_eq!(config.dpi, 144.0);
        assert_eq!(config.simplify_threshold, 0.0);
        assert_eq!(config.path_chunksize, 100);
        assert_eq!(config.shaping, ShapingMode::Basic);
    }

    #[test]
    fn test_hatch_color_from_string() {
        let config = RendererConfig::default()
            .with_hatch_color("rgba(0, 0, 255, 0.5)")
            .unwrap()
            .with_hatch_linewidth(2.0);
        assert_eq!(config.hatch_color, Rgba::new(0.0, 0.0, 1.0, 0.5));
        assert_eq!(config.hatch_linewidth, 2.0);

        let grey = RendererConfig::default().with_hatch_color("#808080").unwrap();
        assert!((grey.hatch_color.r - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(grey.hatch_color.a, 1.0);
    }

    #[test]
    fn test_invalid_hatch_color_rejected() {
        let result = RendererConfig::default().with_hatch_color("not-a-color");
        assert!(matches!(result, Err(crate::RenderError::InvalidArgument(_))));
    }
}
