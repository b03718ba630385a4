//! Error types for plot-render.

use thiserror::Error;

/// Result type alias using RenderError.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed input: shape mismatches, non-affine transforms, unknown style
    /// names, out-of-bounds rectangles and the like.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not available on this kind of surface.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A font or the text shaping engine could not be set up.
    #[error("Resource initialization failed: {0}")]
    ResourceInit(String),

    /// Invalid surface dimensions (must be positive and within limits).
    #[error("Invalid dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// `restore` was called on the base graphics state.
    #[error("Cannot restore the base graphics state")]
    StateStackUnderflow,

    /// The surface was finished and accepts no further output.
    #[error("Surface already finished")]
    SurfaceFinished,
}

impl RenderError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        RenderError::InvalidArgument(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        RenderError::Unsupported(msg.into())
    }
}
