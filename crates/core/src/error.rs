use std::path::PathBuf;

use crate::assembly::FrameSize;

/// Result alias that carries the custom [`AnimatorError`] type.
pub type Result<T> = std::result::Result<T, AnimatorError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AnimatorError {
    /// The animation request was rejected before any frame was rendered.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The host model refused the interpolated values for a frame.
    #[error("failed to apply parameters for frame {frame}: {reason}")]
    Apply { frame: u32, reason: String },
    /// The external renderer failed to produce a frame image.
    #[error("failed to render frame {frame}: {reason}")]
    Render { frame: u32, reason: String },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl AnimatorError {
    /// Creates an [`AnimatorError::InvalidInput`] from the provided message.
    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an [`AnimatorError::Render`] for the given frame.
    pub fn render<T: Into<String>>(frame: u32, reason: T) -> Self {
        Self::Render {
            frame,
            reason: reason.into(),
        }
    }

    /// Creates an [`AnimatorError::Apply`] for the given frame.
    pub fn apply<T: Into<String>>(frame: u32, reason: T) -> Self {
        Self::Apply {
            frame,
            reason: reason.into(),
        }
    }
}

/// Failures raised while turning frame images into a GIF container.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no frame images to assemble")]
    Empty,
    #[error("frame {index} is {found} but the first frame is {expected}; all frames must share one size")]
    SizeMismatch {
        index: usize,
        expected: FrameSize,
        found: FrameSize,
    },
    #[error("failed to decode frame {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("gif encoding failed after {attempts} attempt(s): {source}")]
    EncodeFailed {
        attempts: u32,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write gif to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssemblyError {
    /// Returns true for failures that a fresh encode attempt may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::EncodeFailed { .. })
    }
}

/// Failures raised while inserting the loop extension into container bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("buffer does not start with a GIF header")]
    NotGif,
    #[error("loop extension offset {offset} lies beyond the {len}-byte buffer")]
    Truncated { offset: usize, len: usize },
}
