//! Prompt processor and guidance configuration.
//!
//! Components are chosen by a `type` key in the config file and built into
//! trait objects when training starts:
//!
//! ```json
//! "prompt_processor": { "type": "hashed", "prompt": "a hamburger" },
//! "guidance": { "type": "sds", "guidance_scale": 100.0 }
//! ```

use burn::config::Config;
use burn::prelude::*;
use lift3d_core::ScheduleSpec;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::defaults::{from_defaults, split_tagged};
use crate::guidance::{Guidance, SdsGuidance};
use crate::prompt::{HashedPromptProcessor, PromptProcessor};

/// Configuration for [`HashedPromptProcessor`].
#[derive(Config, Debug)]
pub struct HashedPromptProcessorConfig {
    /// The text prompt.
    pub prompt: String,

    /// Prompt for the unconditional embedding.
    #[config(default = "String::new()")]
    pub negative_prompt: String,

    /// Embedding width per token.
    #[config(default = 32)]
    pub embed_dim: usize,

    /// Tokens per prompt after padding/truncation.
    #[config(default = 16)]
    pub max_tokens: usize,

    /// Append a view suffix ("front view", ...) per camera.
    #[config(default = true)]
    pub view_dependent_prompting: bool,

    /// Half-width in degrees of the azimuth band called "front".
    #[config(default = 45.0)]
    pub front_threshold: f32,

    /// Half-width in degrees of the azimuth band called "back".
    #[config(default = 45.0)]
    pub back_threshold: f32,

    /// Elevation in degrees above which a view is "overhead".
    #[config(default = 60.0)]
    pub overhead_threshold: f32,

    /// Salt for the token hash.
    #[config(default = 0)]
    pub seed: u64,
}

impl HashedPromptProcessorConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt_processor.prompt must not be empty".to_string());
        }
        if self.embed_dim == 0 || self.max_tokens == 0 {
            return Err("prompt_processor.embed_dim and max_tokens must be positive".to_string());
        }
        if self.front_threshold + self.back_threshold > 180.0 {
            return Err("prompt_processor front and back thresholds overlap".to_string());
        }
        Ok(())
    }
}

/// Configuration for [`SdsGuidance`].
#[derive(Config, Debug)]
pub struct SdsGuidanceConfig {
    /// Classifier-free guidance scale.
    #[config(default = 100.0)]
    pub guidance_scale: f32,

    /// Lower timestep bound as a fraction of the schedule.
    #[config(default = "ScheduleSpec::constant(0.02)")]
    pub min_step_percent: ScheduleSpec,

    /// Upper timestep bound as a fraction of the schedule.
    #[config(default = "ScheduleSpec::constant(0.98)")]
    pub max_step_percent: ScheduleSpec,

    /// Clip the score gradient elementwise to this magnitude.
    pub grad_clip: Option<f32>,

    /// Diffusion timesteps.
    #[config(default = 1000)]
    pub num_train_timesteps: usize,

    /// First beta of the scaled-linear schedule.
    #[config(default = 0.00085)]
    pub beta_start: f32,

    /// Last beta of the scaled-linear schedule.
    #[config(default = 0.012)]
    pub beta_end: f32,

    /// Seed for noise and timestep sampling.
    #[config(default = 0)]
    pub seed: u64,
}

impl Default for SdsGuidanceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SdsGuidanceConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.guidance_scale < 0.0 {
            return Err("guidance.guidance_scale must not be negative".to_string());
        }
        if let Some(clip) = self.grad_clip {
            if clip <= 0.0 {
                return Err("guidance.grad_clip must be positive".to_string());
            }
        }
        self.min_step_percent
            .validate()
            .map_err(|e| format!("guidance.min_step_percent: {}", e))?;
        self.max_step_percent
            .validate()
            .map_err(|e| format!("guidance.max_step_percent: {}", e))?;
        Ok(())
    }
}

/// Which prompt processor to build.
///
/// Fields left out of the JSON take their configured defaults; only
/// `prompt` is required.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PromptProcessorSpec {
    /// Deterministic hashed token embeddings.
    Hashed(HashedPromptProcessorConfig),
}

impl<'de> Deserialize<'de> for PromptProcessorSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, fields) = split_tagged(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        match kind.as_str() {
            "hashed" => {
                let mut defaults = serde_json::to_value(HashedPromptProcessorConfig::new(String::new()))
                    .map_err(D::Error::custom)?;
                if let Value::Object(map) = &mut defaults {
                    map.remove("prompt");
                }
                from_defaults(defaults, fields)
                    .map(PromptProcessorSpec::Hashed)
                    .map_err(D::Error::custom)
            }
            other => Err(D::Error::unknown_variant(other, &["hashed"])),
        }
    }
}

impl PromptProcessorSpec {
    /// Shorthand for a hashed processor with default settings.
    pub fn hashed(prompt: impl Into<String>) -> Self {
        PromptProcessorSpec::Hashed(HashedPromptProcessorConfig::new(prompt.into()))
    }

    /// The text prompt.
    pub fn prompt(&self) -> &str {
        match self {
            PromptProcessorSpec::Hashed(config) => &config.prompt,
        }
    }

    /// Validate the selected configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            PromptProcessorSpec::Hashed(config) => config.validate(),
        }
    }

    /// Build the processor.
    pub fn build<B: Backend>(&self, device: &B::Device) -> crate::error::Result<Box<dyn PromptProcessor<B>>> {
        match self {
            PromptProcessorSpec::Hashed(config) => {
                Ok(Box::new(HashedPromptProcessor::new(config.clone(), device)?))
            }
        }
    }
}

/// Which guidance to build.
///
/// Fields left out of the JSON take their configured defaults.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GuidanceSpec {
    /// Score distillation against an analytic diffusion prior.
    Sds(SdsGuidanceConfig),
}

impl<'de> Deserialize<'de> for GuidanceSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, fields) = split_tagged(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        match kind.as_str() {
            "sds" => {
                let defaults = serde_json::to_value(SdsGuidanceConfig::new()).map_err(D::Error::custom)?;
                from_defaults(defaults, fields)
                    .map(GuidanceSpec::Sds)
                    .map_err(D::Error::custom)
            }
            other => Err(D::Error::unknown_variant(other, &["sds"])),
        }
    }
}

impl Default for GuidanceSpec {
    fn default() -> Self {
        GuidanceSpec::Sds(SdsGuidanceConfig::new())
    }
}

impl GuidanceSpec {
    /// Validate the selected configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            GuidanceSpec::Sds(config) => config.validate(),
        }
    }

    /// Build the guidance.
    pub fn build<B: Backend>(&self, device: &B::Device) -> crate::error::Result<Box<dyn Guidance<B>>> {
        match self {
            GuidanceSpec::Sds(config) => Ok(Box::new(SdsGuidance::new(config.clone(), device)?)),
        }
    }
}
