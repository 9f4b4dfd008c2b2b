//! Error types for lift3d_io operations.

use core::fmt;

use lift3d_core::CoreError;

/// Errors that can occur while writing images and sequences.
#[derive(Debug)]
pub enum Lift3dIoError {
    /// An image grid was requested with no panels.
    EmptyGrid,

    /// Panels in one grid row have different heights.
    HeightMismatch {
        /// Height of the first panel.
        expected: usize,
        /// Height of the offending panel.
        got: usize,
    },

    /// A panel failed validation.
    InvalidPanel(CoreError),

    /// No frames matched the sequence pattern.
    EmptySequence {
        /// Directory that was scanned.
        dir: String,
    },

    /// The frame-matching pattern is not a valid regex or has no capture group.
    InvalidPattern {
        /// Description of the problem.
        message: String,
    },

    /// An external encoder could not be run or failed.
    Encoder {
        /// Description of the failure.
        message: String,
    },

    /// Image encoding or decoding failed.
    Image(image::ImageError),

    /// Filesystem error.
    Io(std::io::Error),
}

impl fmt::Display for Lift3dIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lift3dIoError::EmptyGrid => write!(f, "image grid has no panels"),
            Lift3dIoError::HeightMismatch { expected, got } => {
                write!(f, "panel height {} does not match row height {}", got, expected)
            }
            Lift3dIoError::InvalidPanel(e) => write!(f, "invalid panel: {}", e),
            Lift3dIoError::EmptySequence { dir } => {
                write!(f, "no frames matched in {}", dir)
            }
            Lift3dIoError::InvalidPattern { message } => {
                write!(f, "invalid frame pattern: {}", message)
            }
            Lift3dIoError::Encoder { message } => write!(f, "encoder failed: {}", message),
            Lift3dIoError::Image(e) => write!(f, "image error: {}", e),
            Lift3dIoError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Lift3dIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Lift3dIoError::InvalidPanel(e) => Some(e),
            Lift3dIoError::Image(e) => Some(e),
            Lift3dIoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for Lift3dIoError {
    fn from(e: CoreError) -> Self {
        Lift3dIoError::InvalidPanel(e)
    }
}

impl From<image::ImageError> for Lift3dIoError {
    fn from(e: image::ImageError) -> Self {
        Lift3dIoError::Image(e)
    }
}

impl From<std::io::Error> for Lift3dIoError {
    fn from(e: std::io::Error) -> Self {
        Lift3dIoError::Io(e)
    }
}

/// Result type for lift3d_io operations.
pub type Result<T> = std::result::Result<T, Lift3dIoError>;
