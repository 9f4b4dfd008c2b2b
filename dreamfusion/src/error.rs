//! Error types for dreamfusion.

use thiserror::Error;

use lift3d_core::CoreError;
use lift3d_io::Lift3dIoError;

/// Errors that can occur while building or training a text-to-3D system.
#[derive(Error, Debug)]
pub enum DreamFusionError {
    /// Orientation loss was requested but the renderer produced no normals.
    #[error("normal is required for orientation loss, no normal is found in the output")]
    MissingNormal,

    /// A render output field required by a loss term is absent.
    #[error("render output has no '{field}' field")]
    MissingRenderField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A `loss_*` term or regularizer has no matching `lambda_*` weight.
    #[error("no loss weight '{name}' is configured")]
    MissingLossWeight {
        /// Name of the missing weight.
        name: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A component was used before `on_fit_start` created it.
    #[error("{component} is not initialized; call on_fit_start first")]
    ComponentNotReady {
        /// Which component.
        component: &'static str,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Tensor data could not be read back to the host.
    #[error("invalid tensor data: {message}")]
    InvalidData {
        /// Description of the problem.
        message: String,
    },

    /// Error from the math layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error writing images or videos.
    #[error(transparent)]
    Output(#[from] Lift3dIoError),

    /// Model record save/load error.
    #[error("record error: {0}")]
    Record(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for dreamfusion operations.
pub type Result<T> = std::result::Result<T, DreamFusionError>;
