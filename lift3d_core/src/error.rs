//! Error types for lift3d_core operations.

use core::fmt;

/// Errors that can occur in lift3d_core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A schedule spec had the wrong number of elements.
    InvalidSchedule {
        /// Number of elements found.
        len: usize,
    },
    /// A schedule ramp has a non-positive duration.
    DegenerateSchedule {
        /// Start of the ramp.
        start: f64,
        /// End of the ramp.
        end: f64,
    },
    /// A loss weight referenced by name is not configured.
    MissingWeight {
        /// Name of the missing weight.
        name: String,
    },
    /// Panel pixel data does not match its declared dimensions.
    PanelSizeMismatch {
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        got: usize,
    },
    /// A value range is empty or inverted.
    InvalidRange {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
    /// A noise schedule or camera parameter is out of its valid domain.
    InvalidParameter {
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidSchedule { len } => {
                write!(
                    f,
                    "schedule must be a number or a list of 3 or 4 numbers, got {} elements",
                    len
                )
            }
            CoreError::DegenerateSchedule { start, end } => {
                write!(f, "schedule ramp from {} to {} has no duration", start, end)
            }
            CoreError::MissingWeight { name } => {
                write!(f, "loss weight '{}' is not configured", name)
            }
            CoreError::PanelSizeMismatch { expected, got } => {
                write!(f, "panel expects {} values, got {}", expected, got)
            }
            CoreError::InvalidRange { min, max } => {
                write!(f, "invalid value range ({}, {})", min, max)
            }
            CoreError::InvalidParameter { message } => write!(f, "invalid parameter: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type for lift3d_core operations.
pub type Result<T> = core::result::Result<T, CoreError>;
