//! Loss weight configuration.

use lift3d_core::{CoreError, LossWeights, ScheduleSpec};
use serde::{Deserialize, Serialize};

use crate::error::{DreamFusionError, Result};
use crate::training::TrainingProgress;

/// Weight of the score-distillation term.
pub const LAMBDA_SDS: &str = "lambda_sds";
/// Weight of the normal-orientation regularizer.
pub const LAMBDA_ORIENT: &str = "lambda_orient";
/// Weight of the opacity sparsity regularizer.
pub const LAMBDA_SPARSITY: &str = "lambda_sparsity";
/// Weight of the binary-opacity regularizer.
pub const LAMBDA_OPAQUE: &str = "lambda_opaque";

/// Named loss weights, each resolved per step.
///
/// Serializes as a flat JSON object, e.g.
/// `{"lambda_sds": 1.0, "lambda_orient": [0, 10.0, 1000.0, 5000]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LossConfig {
    weights: LossWeights,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self::empty()
            .with(LAMBDA_SDS, 1.0)
            .with(LAMBDA_ORIENT, ScheduleSpec::linear_steps(0, 10.0, 1000.0, 5000))
            .with(LAMBDA_SPARSITY, 1.0)
            .with(LAMBDA_OPAQUE, 0.0)
    }
}

impl LossConfig {
    /// A table with no weights.
    pub fn empty() -> Self {
        Self {
            weights: LossWeights::new(),
        }
    }

    /// Set a weight.
    pub fn with(mut self, name: impl Into<String>, spec: impl Into<ScheduleSpec>) -> Self {
        self.weights.insert(name, spec);
        self
    }

    /// Underlying weight table.
    pub fn weights(&self) -> &LossWeights {
        &self.weights
    }

    /// Resolve a weight at the current training position (`C`).
    pub fn resolve(&self, name: &str, progress: &TrainingProgress) -> Result<f32> {
        self.weights
            .resolve(name, progress.epoch, progress.global_step)
            .map_err(|e| match e {
                CoreError::MissingWeight { name } => DreamFusionError::MissingLossWeight { name },
                other => DreamFusionError::Core(other),
            })
    }

    /// Resolve every weight, in name order.
    pub fn resolve_all(&self, progress: &TrainingProgress) -> Result<Vec<(String, f32)>> {
        self.weights
            .iter()
            .map(|(name, _)| Ok((name.to_string(), self.resolve(name, progress)?)))
            .collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for name in [LAMBDA_ORIENT, LAMBDA_SPARSITY, LAMBDA_OPAQUE] {
            if !self.weights.contains(name) {
                return Err(format!("loss.{} is required", name));
            }
        }
        self.weights.validate().map_err(|e| format!("loss: {}", e))
    }
}
