//! Renderers: turn a camera batch into images.

mod volume;

use burn::prelude::*;
use lift3d_core::RandPair;

use crate::data::CameraBatch;
use crate::error::Result;

pub use volume::VolumeRenderer;

/// Images and per-sample quantities produced by one render call.
#[derive(Debug, Clone)]
pub struct RenderOutput<B: Backend> {
    /// Composited color, shape [batch, height, width, 3].
    pub comp_rgb: Tensor<B, 4>,
    /// Accumulated opacity, shape [batch, height, width, 1].
    pub opacity: Tensor<B, 4>,
    /// Composited normals mapped to `[0, 1]`, shape [batch, height, width, 3].
    pub comp_normal: Option<Tensor<B, 4>>,
    /// Per-sample compositing weights, shape [samples, 1].
    pub weights: Option<Tensor<B, 2>>,
    /// Per-sample unit normals, shape [samples, 3].
    pub normal: Option<Tensor<B, 2>>,
    /// Per-sample ray directions, shape [samples, 3].
    pub t_dirs: Option<Tensor<B, 2>>,
}

impl<B: Backend> RenderOutput<B> {
    /// Output with only the required images.
    pub fn new(comp_rgb: Tensor<B, 4>, opacity: Tensor<B, 4>) -> Self {
        Self {
            comp_rgb,
            opacity,
            comp_normal: None,
            weights: None,
            normal: None,
            t_dirs: None,
        }
    }
}

/// Something that renders a camera batch.
///
/// `rand` fixes the stochastic parts of the render (sample jitter,
/// background). Training passes the same pair to every inner iteration of a
/// step; evaluation passes `None` for a deterministic render.
pub trait Renderer<B: Backend> {
    /// Render every view in the batch.
    fn render(&self, batch: &CameraBatch<B>, rand: Option<RandPair>) -> Result<RenderOutput<B>>;
}
