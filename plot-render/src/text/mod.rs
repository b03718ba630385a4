//! Text shaping into device-space glyph outlines.
//!
//! Strings are shaped with cosmic-text and every glyph is turned into a filled
//! path. The font system is built on first use so that renderers which never
//! draw text never scan the system font directories.

pub mod mathtext;

use crate::config::ShapingMode;
use crate::error::{RenderError, RenderResult};
use crate::font_config::{font_config_to_fontdb, FontConfig};
use crate::geometry::Bbox;
use cosmic_text::{
    Attrs, Buffer, CacheKeyFlags, Command, Family, FontSystem, Metrics, Style, SwashCache, Weight,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tiny_skia::Transform;

/// Which font to shape with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontRef {
    /// A font file, typically the result of resolving style properties.
    File(PathBuf),
    /// A family name looked up in the font database.
    Family(String),
}

/// Font and size of a text draw.
#[derive(Debug, Clone, PartialEq)]
pub struct FontProps {
    pub font: FontRef,
    /// Size in points.
    pub size_pt: f64,
    /// Weight on the 100 to 900 scale.
    pub weight: u16,
    pub italic: bool,
}

impl FontProps {
    pub fn new(font: FontRef, size_pt: f64) -> Self {
        Self {
            font,
            size_pt,
            weight: 400,
            italic: false,
        }
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    /// Font size in pixels at `dpi`.
    pub fn size_px(&self, dpi: f64) -> f64 {
        self.size_pt * dpi / 72.0
    }
}

/// Glyph outlines of a shaped string, in pixels.
///
/// The origin sits on the baseline at the start of the first line and y grows
/// downwards.
#[derive(Debug, Clone, Default)]
pub struct ShapedText {
    glyphs: Vec<tiny_skia::Path>,
    advance: f64,
}

impl ShapedText {
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Width of the widest line, including side bearings.
    pub fn advance(&self) -> f64 {
        self.advance
    }

    /// All glyph outlines as one path, so that overlapping glyphs are painted
    /// once. `None` for blank text.
    pub(crate) fn outline(&self) -> Option<tiny_skia::Path> {
        let mut pb = tiny_skia::PathBuilder::new();
        for glyph in &self.glyphs {
            pb.push_path(glyph);
        }
        pb.finish()
    }

    /// Bounds of the inked area, or `None` for blank text.
    pub fn ink_bounds(&self) -> Option<Bbox> {
        self.glyphs
            .iter()
            .map(|glyph| Bbox::from_rect(glyph.bounds()))
            .reduce(|a, b| a.union(&b))
    }

    /// Width, height and descent of the inked area. The descent is the part
    /// below the baseline and is never negative.
    pub fn width_height_descent(&self) -> (f64, f64, f64) {
        match self.ink_bounds() {
            Some(bounds) => (bounds.width(), bounds.height(), bounds.y1.max(0.0)),
            None => (0.0, 0.0, 0.0),
        }
    }
}

/// Lazily initialized cosmic-text state plus the fonts loaded from files.
pub(crate) struct Shaper {
    config: FontConfig,
    shaping: ShapingMode,
    font_system: Option<FontSystem>,
    swash_cache: SwashCache,
    /// Family name registered for each font file loaded so far.
    loaded_files: HashMap<PathBuf, String>,
}

impl Shaper {
    pub(crate) fn new(config: FontConfig, shaping: ShapingMode) -> Self {
        Self {
            config,
            shaping,
            font_system: None,
            swash_cache: SwashCache::new(),
            loaded_files: HashMap::new(),
        }
    }

    /// Shape `text` at `props.size_pt` points for `dpi`.
    pub(crate) fn shape(
        &mut self,
        text: &str,
        props: &FontProps,
        dpi: f64,
    ) -> RenderResult<ShapedText> {
        let size_px = props.size_px(dpi) as f32;
        if text.is_empty() || !(size_px > 0.0 && size_px.is_finite()) {
            return Ok(ShapedText::default());
        }

        let Shaper {
            config,
            shaping,
            font_system,
            swash_cache,
            loaded_files,
        } = self;
        let font_system = font_system.get_or_insert_with(|| {
            log::debug!(target: "render", "initializing font system");
            FontSystem::new_with_locale_and_db("en".to_string(), font_config_to_fontdb(config))
        });
        let family = resolve_family(font_system, loaded_files, &props.font)?;

        let mut buffer = Buffer::new(font_system, Metrics::new(size_px, size_px * 1.2));
        let style = if props.italic {
            Style::Italic
        } else {
            Style::Normal
        };
        // Unhinted outlines keep glyph shapes independent of the pixel grid.
        let attrs = Attrs::new()
            .family(Family::Name(&family))
            .weight(Weight(props.weight))
            .style(style)
            .cache_key_flags(CacheKeyFlags::DISABLE_HINTING);
        buffer.set_text(font_system, text, &attrs, (*shaping).into(), None);
        buffer.shape_until_scroll(font_system, false);

        let mut shaped = ShapedText::default();
        let mut first_line_y = None;
        for run in buffer.layout_runs() {
            let line_offset = run.line_y - *first_line_y.get_or_insert(run.line_y);
            shaped.advance = shaped.advance.max(run.line_w as f64);
            for glyph in run.glyphs.iter() {
                let physical = glyph.physical((0.0, 0.0), 1.0);
                let x = glyph.x + glyph.font_size * glyph.x_offset;
                let y = line_offset + glyph.y - glyph.font_size * glyph.y_offset;
                let Some(commands) = swash_cache.get_outline_commands(font_system, physical.cache_key)
                else {
                    continue;
                };
                if let Some(path) = outline_path(&commands)
                    .and_then(|path| path.transform(Transform::from_translate(x, y)))
                {
                    shaped.glyphs.push(path);
                }
            }
        }
        Ok(shaped)
    }
}

/// Font outlines have y pointing up; flip them into device orientation.
fn outline_path(commands: &[Command]) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    for cmd in commands {
        match cmd {
            Command::MoveTo(p) => pb.move_to(p.x, -p.y),
            Command::LineTo(p) => pb.line_to(p.x, -p.y),
            Command::QuadTo(ctrl, end) => pb.quad_to(ctrl.x, -ctrl.y, end.x, -end.y),
            Command::CurveTo(c1, c2, end) => pb.cubic_to(c1.x, -c1.y, c2.x, -c2.y, end.x, -end.y),
            Command::Close => pb.close(),
        }
    }
    pb.finish()
}

/// Family name to shape `font` with, loading font files on first use.
fn resolve_family(
    font_system: &mut FontSystem,
    loaded_files: &mut HashMap<PathBuf, String>,
    font: &FontRef,
) -> RenderResult<String> {
    let path = match font {
        FontRef::Family(name) => return Ok(name.clone()),
        FontRef::File(path) => path,
    };
    if let Some(name) = loaded_files.get(path) {
        return Ok(name.clone());
    }

    let db = font_system.db_mut();
    let known: HashSet<fontdb::ID> = db.faces().map(|face| face.id).collect();
    db.load_font_file(path).map_err(|err| {
        RenderError::ResourceInit(format!("Failed to load font {}: {}", path.display(), err))
    })?;
    let name = db
        .faces()
        .filter(|face| !known.contains(&face.id))
        .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
        .ok_or_else(|| {
            RenderError::ResourceInit(format!("No usable font face in {}", path.display()))
        })?;

    log::debug!(target: "render", "loaded font {} as {:?}", path.display(), name);
    loaded_files.insert(path.clone(), name.clone());
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rgba;
    use crate::surface::{Canvas, Surface};

    fn shaper() -> Shaper {
        Shaper::new(FontConfig::empty(), ShapingMode::Advanced)
    }

    #[test]
    fn test_missing_font_file_is_resource_error() {
        let mut shaper = shaper();
        let props = FontProps::new(FontRef::File("/nonexistent/font.ttf".into()), 12.0);
        let result = shaper.shape("abc", &props, 72.0);
        assert!(matches!(result, Err(RenderError::ResourceInit(_))));
    }

    #[test]
    fn test_empty_text_needs_no_font() {
        let mut shaper = shaper();
        let props = FontProps::new(FontRef::File("/nonexistent/font.ttf".into()), 12.0);
        let shaped = shaper.shape("", &props, 72.0).unwrap();
        assert_eq!(shaped.glyph_count(), 0);
        assert_eq!(shaped.width_height_descent(), (0.0, 0.0, 0.0));
        assert!(shaper.font_system.is_none());
    }

    #[test]
    fn test_size_px() {
        let props = FontProps::new(FontRef::Family("DejaVu Sans".into()), 12.0);
        assert_eq!(props.size_px(144.0), 24.0);
        assert_eq!(props.weight, 400);
        assert!(props.with_italic(true).italic);
    }

    #[test]
    fn test_metrics_of_outlines() {
        let glyph = tiny_skia::PathBuilder::from_rect(
            tiny_skia::Rect::from_ltrb(1.0, -7.0, 5.0, 2.0).unwrap(),
        );
        let shaped = ShapedText {
            glyphs: vec![glyph],
            advance: 6.0,
        };
        assert_eq!(shaped.width_height_descent(), (4.0, 9.0, 2.0));
    }

    #[test]
    fn test_overlapping_glyphs_paint_once() {
        let rect = |left, right| {
            let rect = tiny_skia::Rect::from_ltrb(left, -6.0, right, 0.0).unwrap();
            tiny_skia::PathBuilder::from_rect(rect)
        };
        let shaped = ShapedText {
            glyphs: vec![rect(0.0, 6.0), rect(3.0, 9.0)],
            advance: 9.0,
        };
        let outline = shaped.outline().unwrap();
        assert_eq!(outline.bounds().width(), 9.0);

        let mut canvas = Canvas::new(Surface::raster(10, 10).unwrap());
        canvas.set_source_rgba(Rgba::new(1.0, 0.0, 0.0, 0.5));
        let below_top = Transform::from_translate(0.0, 8.0);
        canvas
            .fill(&outline, tiny_skia::FillRule::Winding, below_top)
            .unwrap();
        let pixmap = canvas.pixmap().unwrap();
        let single = pixmap.pixel(1, 4).unwrap();
        let overlap = pixmap.pixel(4, 4).unwrap();
        assert!(single.alpha() > 0);
        assert_eq!(overlap, single);
    }

    #[test]
    fn test_blank_text_has_no_outline() {
        assert!(ShapedText::default().outline().is_none());
    }
}
