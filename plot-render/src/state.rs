//! Graphics state stack.
//!
//! Attributes that the surface cannot hold directly (alpha override, the
//! antialias policy, clip settings, hatch, sketch, snap) live in frames of a
//! stack that is pushed and popped together with the surface's own
//! save/restore. Setters only touch the top frame; the values are applied
//! when a drawing call opens its scoped context.

use crate::error::{RenderError, RenderResult};
use crate::geometry::{ClipRect, Rgba};
use crate::path::SketchParams;
use crate::style::AntialiasSetting;
use std::sync::Arc;

/// A clip path already loaded into device space.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPath {
    path: Arc<tiny_skia::Path>,
}

impl ClipPath {
    pub(crate) fn new(path: tiny_skia::Path) -> Self {
        Self {
            path: Arc::new(path),
        }
    }

    pub fn path(&self) -> &tiny_skia::Path {
        &self.path
    }
}

/// One frame of the state stack.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditionalState {
    /// Replaces the alpha of every color drawn while set.
    pub alpha: Option<f64>,
    pub antialias: AntialiasSetting,
    /// Clip rectangle in user space.
    pub clip_rectangle: Option<ClipRect>,
    pub clip_path: Option<ClipPath>,
    pub hatch: Option<String>,
    pub hatch_color: Rgba,
    /// Hatch line width in points.
    pub hatch_linewidth: f64,
    pub sketch: Option<SketchParams>,
    pub snap: bool,
}

impl AdditionalState {
    pub(crate) fn new(hatch_color: Rgba, hatch_linewidth: f64) -> Self {
        Self {
            alpha: None,
            antialias: AntialiasSetting::default(),
            clip_rectangle: None,
            clip_path: None,
            hatch: None,
            hatch_color,
            hatch_linewidth,
            sketch: None,
            snap: true,
        }
    }
}

/// LIFO stack of [`AdditionalState`] frames; the base frame is never popped.
#[derive(Debug, Clone)]
pub struct StateStack {
    top: AdditionalState,
    below: Vec<AdditionalState>,
}

impl StateStack {
    pub fn new(base: AdditionalState) -> Self {
        Self {
            top: base,
            below: Vec::new(),
        }
    }

    /// Push a copy of the current frame.
    pub fn push(&mut self) {
        self.below.push(self.top.clone());
    }

    /// Drop the current frame and return it.
    pub fn pop(&mut self) -> RenderResult<AdditionalState> {
        let previous = self.below.pop().ok_or(RenderError::StateStackUnderflow)?;
        Ok(std::mem::replace(&mut self.top, previous))
    }

    pub fn current(&self) -> &AdditionalState {
        &self.top
    }

    pub fn current_mut(&mut self) -> &mut AdditionalState {
        &mut self.top
    }

    /// Number of frames, including the base frame.
    pub fn depth(&self) -> usize {
        self.below.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> StateStack {
        StateStack::new(AdditionalState::new(Rgba::BLACK, 1.0))
    }

    #[test]
    fn test_push_copies_top() {
        let mut stack = stack();
        stack.current_mut().alpha = Some(0.25);
        stack.push();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.current().alpha, Some(0.25));
        stack.current_mut().alpha = Some(0.75);
        stack.current_mut().hatch = Some("//".into());
        let popped = stack.pop().unwrap();
        assert_eq!(popped.alpha, Some(0.75));
        assert_eq!(stack.current().alpha, Some(0.25));
        assert!(stack.current().hatch.is_none());
    }

    #[test]
    fn test_base_frame_is_never_popped() {
        let mut stack = stack();
        assert!(matches!(stack.pop(), Err(RenderError::StateStackUnderflow)));
        assert_eq!(stack.depth(), 1);
        assert!(stack.current().snap);
    }
}
