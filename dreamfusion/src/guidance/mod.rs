//! Guidance: gradient signal from a 2D diffusion prior.

mod sds;

use burn::prelude::*;

use crate::data::CameraBatch;
use crate::error::Result;
use crate::prompt::PromptContext;

pub use sds::SdsGuidance;

/// Per-call switches for [`Guidance::compute_guidance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuidanceFlags {
    /// Treat the input as latents instead of an RGB image.
    pub rgb_as_latents: bool,
    /// Reuse the noise and timesteps cached by the previous call.
    pub restore_latents: bool,
}

/// Named scalar outputs of one guidance call, in insertion order.
///
/// Entries named `loss_*` are training terms; everything else is logged only.
#[derive(Debug, Clone)]
pub struct GuidanceOutput<B: Backend> {
    entries: Vec<(String, Tensor<B, 1>)>,
}

impl<B: Backend> Default for GuidanceOutput<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> GuidanceOutput<B> {
    /// An empty output.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: Tensor<B, 1>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: Tensor<B, 1>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&Tensor<B, 1>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor<B, 1>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Something that scores rendered images against a prompt.
pub trait Guidance<B: Backend> {
    /// Compute loss terms for a rendered batch.
    ///
    /// `rgb` has shape [batch, height, width, 3]. Gradients of the returned
    /// `loss_*` entries flow back into `rgb`.
    fn compute_guidance(
        &mut self,
        rgb: Tensor<B, 4>,
        prompt: &PromptContext<B>,
        batch: &CameraBatch<B>,
        flags: GuidanceFlags,
    ) -> Result<GuidanceOutput<B>>;

    /// Refresh step-dependent settings before a training batch.
    fn update_step(&mut self, _epoch: usize, _global_step: usize) -> Result<()> {
        Ok(())
    }
}
