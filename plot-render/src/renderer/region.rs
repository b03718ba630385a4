//! Pixel regions and filter groups.

use super::Renderer;
use crate::error::{RenderError, RenderResult};
use crate::geometry::{Bbox, IntRect, RgbaImage};
use crate::state::AdditionalState;

/// Pixels copied out of a raster surface, rows packed without padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    rect: IntRect,
    data: Vec<u8>,
}

impl Region {
    /// Device rectangle the pixels came from.
    pub fn rect(&self) -> IntRect {
        self.rect
    }

    /// Premultiplied RGBA bytes, `rect.width * 4` per row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Renderer {
    /// Copy the pixels under `bbox`, given in user space. The box is grown
    /// outwards to whole pixels and must lie within the surface.
    pub fn copy_from_bbox(&self, bbox: &Bbox) -> RenderResult<Region> {
        let pixmap = self
            .canvas
            .pixmap()
            .ok_or_else(|| RenderError::unsupported("Region capture needs a raster surface"))?;
        let (width, height) = (pixmap.width() as f64, pixmap.height() as f64);
        let x0 = bbox.x0.floor();
        let x1 = bbox.x1.ceil();
        let y0 = height - bbox.y1.ceil();
        let y1 = height - bbox.y0.floor();
        if !(0.0 <= x0 && x0 <= x1 && x1 <= width && 0.0 <= y0 && y0 <= y1 && y1 <= height) {
            return Err(RenderError::invalid(format!(
                "Invalid bbox: ({}, {}, {}, {})",
                bbox.x0, bbox.y0, bbox.x1, bbox.y1
            )));
        }

        let rect = IntRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        };
        let stride = pixmap.width() as usize * 4;
        let row = rect.width as usize * 4;
        let mut data = Vec::with_capacity(row * rect.height as usize);
        for y in rect.y..rect.y + rect.height {
            let start = y as usize * stride + rect.x as usize * 4;
            data.extend_from_slice(&pixmap.data()[start..start + row]);
        }
        log::debug!(target: "render", "copy_from_bbox {:?}", rect);
        Ok(Region { rect, data })
    }

    /// Write a captured region back where it came from and mark it dirty.
    pub fn restore_region(&mut self, region: &Region) -> RenderResult<()> {
        let pixmap = self
            .canvas
            .pixmap_mut()
            .ok_or_else(|| RenderError::unsupported("Region restore needs a raster surface"))?;
        let rect = region.rect;
        if rect.x + rect.width > pixmap.width() || rect.y + rect.height > pixmap.height() {
            return Err(RenderError::invalid("Region does not fit the surface"));
        }
        if rect.width == 0 || rect.height == 0 {
            return Ok(());
        }

        let stride = pixmap.width() as usize * 4;
        let row = rect.width as usize * 4;
        let data = pixmap.data_mut();
        for (i, src) in region.data.chunks_exact(row).enumerate() {
            let start = (rect.y as usize + i) * stride + rect.x as usize * 4;
            data[start..start + row].copy_from_slice(src);
        }
        log::debug!(target: "render", "restore_region {:?}", rect);
        self.canvas.mark_dirty(rect);
        Ok(())
    }

    /// Redirect drawing into an isolated buffer with a fresh state.
    pub fn start_filter(&mut self) -> RenderResult<()> {
        self.canvas.push_group()?;
        self.states.push();
        *self.states.current_mut() =
            AdditionalState::new(self.config.hatch_color, self.config.hatch_linewidth);
        log::debug!(target: "render", "start_filter");
        Ok(())
    }

    /// End the innermost filter and return what was drawn into it as
    /// premultiplied RGBA.
    pub fn stop_filter(&mut self) -> RenderResult<RgbaImage> {
        let group = self.canvas.pop_group()?;
        self.states.pop()?;
        let (width, height) = self.canvas.size();
        let pixmap = group.into_pixmap(width, height)?;
        log::debug!(target: "render", "stop_filter");
        RgbaImage::new(pixmap.take(), width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::font_config::FontConfig;
    use crate::geometry::Rgba;
    use crate::path::Path;
    use crate::transform::Transform2D;

    fn renderer() -> Renderer {
        let config = RendererConfig::default().with_font_config(FontConfig::empty());
        Renderer::new_raster(10, 10, config).unwrap()
    }

    #[test]
    fn test_bbox_is_flipped_and_grown() {
        let r = renderer();
        let region = r.copy_from_bbox(&Bbox::new(1.5, 2.0, 3.2, 4.0)).unwrap();
        assert_eq!(
            region.rect(),
            IntRect {
                x: 1,
                y: 6,
                width: 3,
                height: 2
            }
        );
        assert_eq!(region.data().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_out_of_bounds_bbox_rejected() {
        let r = renderer();
        for bbox in [
            Bbox::new(-1.0, 0.0, 5.0, 5.0),
            Bbox::new(0.0, 0.0, 11.0, 5.0),
            Bbox::new(5.0, 0.0, 4.0, 5.0),
            Bbox::new(f64::NAN, 0.0, 4.0, 5.0),
        ] {
            assert!(matches!(
                r.copy_from_bbox(&bbox),
                Err(RenderError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_filter_returns_isolated_pixels() {
        let mut r = renderer();
        let gc = r.gc();
        r.set_alpha(Some(0.5));
        r.start_filter().unwrap();
        assert_eq!(r.state_depth(), 2);
        assert_eq!(r.get_alpha(), 1.0);
        r.set_linewidth(0.0);
        r.draw_path(
            gc,
            &Path::rectangle(0.0, 0.0, 10.0, 10.0),
            &Transform2D::identity(),
            Some(Rgba::rgb(0.0, 0.0, 1.0)),
        )
        .unwrap();
        let image = r.stop_filter().unwrap();
        assert_eq!(image.width, 10);
        assert_eq!(&image.data[0..4], &[0, 0, 255, 255]);
        assert!(r.get_buffer().unwrap().iter().all(|&b| b == 0));
        assert_eq!(r.get_alpha(), 0.5);
        assert_eq!(r.get_linewidth(), 1.0);
        assert!(r.stop_filter().is_err());
    }
}
