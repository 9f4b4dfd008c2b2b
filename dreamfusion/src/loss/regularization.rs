//! Opacity regularizers.

use burn::prelude::*;

/// Smoothing term inside the sparsity square root.
pub const SPARSITY_EPS: f32 = 0.01;

/// Opacity is clamped to `[OPACITY_CLAMP, 1 - OPACITY_CLAMP]` before the
/// entropy term.
pub const OPACITY_CLAMP: f32 = 1e-3;

/// Mean of `sqrt(opacity² + 0.01)`, pulling opacity toward 0.
pub fn sparsity_loss<B: Backend, const D: usize>(opacity: Tensor<B, D>) -> Tensor<B, 1> {
    (opacity.powf_scalar(2.0) + SPARSITY_EPS).sqrt().mean()
}

/// Binary cross entropy of the clamped opacity against itself.
///
/// This is the binary entropy `-(p ln p + (1 - p) ln(1 - p))`, lowest when
/// every opacity is 0 or 1.
pub fn opaque_loss<B: Backend, const D: usize>(opacity: Tensor<B, D>) -> Tensor<B, 1> {
    let p = opacity.clamp(OPACITY_CLAMP, 1.0 - OPACITY_CLAMP);
    let q = p.clone().neg() + 1.0;
    let entropy = p.clone() * p.log() + q.clone() * q.log();
    entropy.mean().neg()
}
