//! Regularization terms added to the guidance loss.
//!
//! - Orientation: visible normals should not face away from the camera
//! - Sparsity: opacity should be small
//! - Opaque: opacity should be close to 0 or 1

mod orientation;
mod regularization;

pub use orientation::orientation_loss;
pub use regularization::{opaque_loss, sparsity_loss, OPACITY_CLAMP, SPARSITY_EPS};
