//! Normal orientation loss.

use burn::prelude::*;

/// Penalize normals that point along the viewing direction.
///
/// Sums `weight * max(normal · dir, 0)²` over all samples, with weights
/// detached, and divides by the number of pixels with positive opacity.
/// Evaluates to 0 when no pixel has positive opacity.
///
/// Inputs:
/// - weights: [samples, 1]
/// - normal: [samples, 3]
/// - t_dirs: [samples, 3]
/// - opacity: any shape
///
/// Output: [1]
pub fn orientation_loss<B: Backend, const D: usize>(
    weights: Tensor<B, 2>,
    normal: Tensor<B, 2>,
    t_dirs: Tensor<B, 2>,
    opacity: Tensor<B, D>,
) -> Tensor<B, 1> {
    let facing = (normal * t_dirs).sum_dim(1).clamp_min(0.0);
    let total = (weights.detach() * facing.powf_scalar(2.0)).sum();

    let count = opacity.detach().greater_elem(0.0).float().sum();
    // 1 when any pixel is visible, else 0; the divisor never drops below 1.
    let any = count.clone().clamp_max(1.0);
    total * any / count.clamp_min(1.0)
}
