//! Prompt processors: turn a text prompt into embeddings for guidance.

mod hashed;

use burn::prelude::*;

use crate::data::CameraBatch;
use crate::error::Result;
use crate::host::from_vec;

pub use hashed::HashedPromptProcessor;

/// View bucket for view-dependent prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDirection {
    /// Default bucket.
    Side,
    /// Azimuth near 0.
    Front,
    /// Azimuth near ±180.
    Back,
    /// High elevation.
    Overhead,
}

impl ViewDirection {
    /// All buckets, in embedding order.
    pub const ALL: [ViewDirection; 4] = [
        ViewDirection::Side,
        ViewDirection::Front,
        ViewDirection::Back,
        ViewDirection::Overhead,
    ];

    /// Prompt suffix for this bucket.
    pub fn suffix(&self) -> &'static str {
        match self {
            ViewDirection::Side => "side view",
            ViewDirection::Front => "front view",
            ViewDirection::Back => "back view",
            ViewDirection::Overhead => "overhead view",
        }
    }

    /// Position in [`ViewDirection::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Angular thresholds (degrees) separating the view buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewThresholds {
    /// `|azimuth| < front` is front.
    pub front: f32,
    /// `|azimuth| > 180 - back` is back.
    pub back: f32,
    /// `elevation > overhead` is overhead, regardless of azimuth.
    pub overhead: f32,
}

impl ViewThresholds {
    /// Bucket of a camera.
    pub fn classify(&self, elevation_deg: f32, azimuth_deg: f32) -> ViewDirection {
        let azimuth = lift3d_core::wrap_azimuth(azimuth_deg).abs();
        if elevation_deg > self.overhead {
            ViewDirection::Overhead
        } else if azimuth < self.front {
            ViewDirection::Front
        } else if azimuth > 180.0 - self.back {
            ViewDirection::Back
        } else {
            ViewDirection::Side
        }
    }
}

/// Encoded prompt handed to guidance.
#[derive(Debug, Clone)]
pub struct PromptContext<B: Backend> {
    /// The base prompt.
    pub prompt: String,
    /// One prompt per view bucket (all equal when not view-dependent).
    pub direction_prompts: Vec<String>,
    /// Conditional embeddings per bucket, shape [4, tokens, dim].
    pub text_embeddings: Tensor<B, 3>,
    /// Unconditional embedding, shape [tokens, dim].
    pub uncond_text_embeddings: Tensor<B, 2>,
    /// Whether per-camera buckets are used.
    pub view_dependent: bool,
    /// Bucket thresholds.
    pub thresholds: ViewThresholds,
}

impl<B: Backend> PromptContext<B> {
    /// Bucket of each camera in the batch.
    pub fn directions_for(&self, batch: &CameraBatch<B>) -> Vec<ViewDirection> {
        batch
            .elevation_deg
            .iter()
            .zip(&batch.azimuth_deg)
            .map(|(&elevation, &azimuth)| {
                if self.view_dependent {
                    self.thresholds.classify(elevation, azimuth)
                } else {
                    ViewDirection::Side
                }
            })
            .collect()
    }

    /// Conditional embeddings for each camera followed by the unconditional
    /// embedding repeated per camera: shape [2 * batch, tokens, dim].
    pub fn text_embeddings_for(&self, batch: &CameraBatch<B>) -> Result<Tensor<B, 3>> {
        let device = self.text_embeddings.device();
        let directions = self.directions_for(batch);
        let count = directions.len();

        let [_, tokens, dim] = self.text_embeddings.dims();
        let rows: Vec<f32> = directions
            .iter()
            .flat_map(|d| {
                let mut one_hot = [0.0f32; 4];
                one_hot[d.index()] = 1.0;
                one_hot
            })
            .collect();
        // [count, 4] x [4, tokens * dim] selects each camera's bucket.
        let select = from_vec(rows, [count, ViewDirection::ALL.len()], &device)?;
        let cond = select
            .matmul(self.text_embeddings.clone().reshape([ViewDirection::ALL.len(), tokens * dim]))
            .reshape([count, tokens, dim]);

        let uncond = self
            .uncond_text_embeddings
            .clone()
            .reshape([1, tokens, dim])
            .repeat_dim(0, count);

        Ok(Tensor::cat(vec![cond, uncond], 0))
    }
}

/// Something that encodes the configured prompt.
pub trait PromptProcessor<B: Backend> {
    /// Encode the prompt; the processor is not mutated.
    fn encode_prompt(&self) -> PromptContext<B>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ViewThresholds {
        ViewThresholds {
            front: 45.0,
            back: 45.0,
            overhead: 60.0,
        }
    }

    #[test]
    fn test_classify() {
        let t = thresholds();
        assert_eq!(t.classify(0.0, 0.0), ViewDirection::Front);
        assert_eq!(t.classify(0.0, -30.0), ViewDirection::Front);
        assert_eq!(t.classify(0.0, 90.0), ViewDirection::Side);
        assert_eq!(t.classify(0.0, 170.0), ViewDirection::Back);
        assert_eq!(t.classify(0.0, -180.0), ViewDirection::Back);
        assert_eq!(t.classify(75.0, 0.0), ViewDirection::Overhead);
    }

    #[test]
    fn test_suffix_order() {
        let suffixes: Vec<&str> = ViewDirection::ALL.iter().map(|d| d.suffix()).collect();
        assert_eq!(suffixes, vec!["side view", "front view", "back view", "overhead view"]);
        assert_eq!(ViewDirection::Overhead.index(), 3);
    }
}
