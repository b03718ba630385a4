//! Vector targets: command lists that are kept instead of rasterized.

use super::{check_dimensions, Canvas, OwnedCommand, Source, Style, Surface};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{Bbox, Rgba};
use crate::style::Antialias;
use tiny_skia::{FillRule, Pixmap, Transform};

/// A drawing command together with the paint, antialias mode and clip that
/// were active when it was issued.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCommand {
    pub(crate) command: OwnedCommand,
    pub(crate) style: Style,
}

/// A standalone command list, such as a laid out math expression.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    commands: Vec<RecordedCommand>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a solid black fill of a device-space path.
    pub(crate) fn fill(&mut self, path: tiny_skia::Path, rule: FillRule) {
        self.commands.push(RecordedCommand {
            command: OwnedCommand::Fill {
                path,
                rule,
                transform: Transform::identity(),
            },
            style: Style {
                source: Source::Solid(Rgba::BLACK),
                antialias: Antialias::Default,
                clip: Default::default(),
            },
        });
    }

    pub(crate) fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Union of the bounds of all recorded geometry.
    pub fn bounds(&self) -> Option<Bbox> {
        self.commands
            .iter()
            .filter_map(|c| c.command.bounds())
            .reduce(|a, b| a.union(&b))
    }
}

/// One page of a vector surface.
#[derive(Debug, Clone)]
pub struct Page {
    width: u32,
    height: u32,
    commands: Vec<RecordedCommand>,
}

impl Page {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of recorded drawing commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Play the page back onto a fresh pixel buffer of the page size.
    pub fn render(&self) -> RenderResult<Pixmap> {
        rasterize(&self.commands, self.width, self.height)
    }
}

/// A multi-page command recording.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    done: Vec<Page>,
    current: Page,
    finished: bool,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            done: Vec::new(),
            current: Page::new(width, height),
            finished: false,
        })
    }

    /// All pages, including the one currently being drawn.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.done.iter().chain(std::iter::once(&self.current))
    }

    pub fn page_count(&self) -> usize {
        self.done.len() + 1
    }

    pub fn current_page(&self) -> &Page {
        &self.current
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.current.width, self.current.height)
    }

    fn check_open(&self) -> RenderResult<()> {
        if self.finished {
            Err(RenderError::SurfaceFinished)
        } else {
            Ok(())
        }
    }

    pub(crate) fn current_commands_mut(&mut self) -> RenderResult<&mut Vec<RecordedCommand>> {
        self.check_open()?;
        Ok(&mut self.current.commands)
    }

    /// Close the current page and start an empty one of the same size.
    pub(crate) fn show_page(&mut self) -> RenderResult<()> {
        self.check_open()?;
        let next = Page::new(self.current.width, self.current.height);
        self.done.push(std::mem::replace(&mut self.current, next));
        Ok(())
    }

    /// Resize the current page.
    pub(crate) fn set_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.check_open()?;
        check_dimensions(width, height)?;
        self.current.width = width;
        self.current.height = height;
        Ok(())
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }
}

/// Replay `commands` onto a new transparent pixel buffer.
pub(crate) fn rasterize(
    commands: &[RecordedCommand],
    width: u32,
    height: u32,
) -> RenderResult<Pixmap> {
    let mut canvas = Canvas::new(Surface::raster(width, height)?);
    canvas.replay(commands, Transform::identity(), None)?;
    canvas
        .into_pixmap()
        .ok_or_else(|| RenderError::unsupported("Expected a raster surface"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, size: f32) -> tiny_skia::Path {
        tiny_skia::PathBuilder::from_rect(tiny_skia::Rect::from_xywh(x, y, size, size).unwrap())
    }

    #[test]
    fn test_recording_bounds() {
        let mut recording = Recording::new();
        assert!(recording.bounds().is_none());
        recording.fill(square(1.0, 2.0, 3.0), FillRule::Winding);
        recording.fill(square(10.0, 10.0, 1.0), FillRule::Winding);
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.bounds(), Some(Bbox::new(1.0, 2.0, 11.0, 11.0)));
    }

    #[test]
    fn test_pages_and_finish() {
        let mut surface = RecordingSurface::new(10, 20).unwrap();
        surface.show_page().unwrap();
        surface.set_size(30, 40).unwrap();
        assert_eq!(surface.page_count(), 2);
        let sizes: Vec<_> = surface.pages().map(|p| (p.width(), p.height())).collect();
        assert_eq!(sizes, vec![(10, 20), (30, 40)]);

        surface.finish();
        assert!(matches!(surface.show_page(), Err(RenderError::SurfaceFinished)));
        assert!(matches!(
            surface.current_commands_mut(),
            Err(RenderError::SurfaceFinished)
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            RecordingSurface::new(0, 5),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_rasterize_recorded_fill() {
        let mut recording = Recording::new();
        recording.fill(square(2.0, 2.0, 4.0), FillRule::Winding);
        let pixmap = rasterize(recording.commands(), 8, 8).unwrap();
        let alpha = |x: u32, y: u32| pixmap.data()[((y * 8 + x) * 4 + 3) as usize];
        assert_eq!(alpha(3, 3), 255);
        assert_eq!(alpha(0, 0), 0);
        assert_eq!(alpha(7, 7), 0);
    }
}
