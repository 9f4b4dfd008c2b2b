//! Training configuration types.

use std::path::Path;

use burn::config::Config;
use lift3d_core::ViewRanges;
use lift3d_io::VideoFormat;
use serde_json::Value;

use super::defaults::merge;
use super::{GuidanceSpec, LossConfig, PromptProcessorSpec, VolumeRendererConfig};
use crate::training::OptimizerConfig;

/// Configuration for the text-to-3D system.
#[derive(Config, Debug)]
pub struct SystemConfig {
    /// Prompt processor type and settings.
    pub prompt_processor: PromptProcessorSpec,

    /// Guidance type and settings.
    pub guidance: GuidanceSpec,

    /// Optimization iterations per training batch.
    #[config(default = 1)]
    pub steps: usize,

    /// Loss weights.
    #[config(default = "LossConfig::default()")]
    pub loss: LossConfig,

    /// Renderer settings.
    #[config(default = "VolumeRendererConfig::new()")]
    pub renderer: VolumeRendererConfig,

    /// Optimizer settings.
    #[config(default = "OptimizerConfig::new()")]
    pub optimizer: OptimizerConfig,

    /// Container for the test-pass video.
    #[config(default = "VideoFormat::Mp4")]
    pub test_video_format: VideoFormat,

    /// Frame rate of the test-pass video.
    #[config(default = 30)]
    pub test_video_fps: u32,

    /// Seed for the per-step randomness.
    #[config(default = 0)]
    pub seed: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::new(PromptProcessorSpec::hashed("a hamburger"), GuidanceSpec::default())
    }
}

impl SystemConfig {
    /// Default system for a prompt.
    pub fn for_prompt(prompt: impl Into<String>) -> Self {
        Self::new(PromptProcessorSpec::hashed(prompt), GuidanceSpec::default())
    }

    /// Replace the prompt processor.
    pub fn with_prompt_processor(mut self, prompt_processor: PromptProcessorSpec) -> Self {
        self.prompt_processor = prompt_processor;
        self
    }

    /// Replace the guidance.
    pub fn with_guidance(mut self, guidance: GuidanceSpec) -> Self {
        self.guidance = guidance;
        self
    }

    /// Parse JSON where every field except `prompt_processor` may be left
    /// out and takes its default.
    ///
    /// ```json
    /// {"prompt_processor": {"type": "hashed", "prompt": "a red apple"}, "steps": 3}
    /// ```
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let overrides: Value = serde_json::from_str(json)?;
        let mut defaults = serde_json::to_value(Self::default())?;
        if let Value::Object(map) = &mut defaults {
            map.remove("prompt_processor");
        }
        Ok(serde_json::from_value(merge(defaults, overrides))?)
    }

    /// Read a JSON file with [`from_json`](Self::from_json).
    ///
    /// Files written by `Config::save` load unchanged.
    pub fn load_json(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps == 0 {
            return Err("steps must be positive".to_string());
        }
        if self.test_video_fps == 0 {
            return Err("test_video_fps must be positive".to_string());
        }
        self.loss.validate()?;
        self.renderer.validate()?;
        self.optimizer.validate()?;
        self.prompt_processor.validate()?;
        self.guidance.validate()?;
        Ok(())
    }
}

/// Configuration for training and evaluation cameras.
#[derive(Config, Debug)]
pub struct CameraSamplerConfig {
    /// Training image height.
    #[config(default = 64)]
    pub height: usize,

    /// Training image width.
    #[config(default = 64)]
    pub width: usize,

    /// Cameras per training batch.
    #[config(default = 1)]
    pub batch_size: usize,

    /// Random view ranges for training.
    #[config(default = "ViewRanges::default()")]
    pub ranges: ViewRanges,

    /// Evaluation image height.
    #[config(default = 64)]
    pub eval_height: usize,

    /// Evaluation image width.
    #[config(default = 64)]
    pub eval_width: usize,

    /// Evaluation elevation in degrees.
    #[config(default = 15.0)]
    pub eval_elevation_deg: f32,

    /// Evaluation camera distance.
    #[config(default = 1.5)]
    pub eval_camera_distance: f32,

    /// Evaluation field of view in degrees.
    #[config(default = 70.0)]
    pub eval_fovy_deg: f32,

    /// Views per validation pass.
    #[config(default = 4)]
    pub n_val_views: usize,

    /// Views in the test orbit.
    #[config(default = 30)]
    pub n_test_views: usize,

    /// Seed for training views.
    #[config(default = 0)]
    pub seed: u64,
}

impl Default for CameraSamplerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSamplerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.height == 0 || self.width == 0 || self.eval_height == 0 || self.eval_width == 0 {
            return Err("camera image sizes must be positive".to_string());
        }
        if self.batch_size == 0 {
            return Err("camera batch_size must be positive".to_string());
        }
        if self.eval_camera_distance <= 0.0 {
            return Err("eval_camera_distance must be positive".to_string());
        }
        self.ranges.validate().map_err(|e| format!("camera ranges: {}", e))
    }
}

/// Configuration for the outer fit loop.
#[derive(Config, Debug)]
pub struct FitConfig {
    /// Stop after this many optimizer updates.
    #[config(default = 1000)]
    pub max_steps: usize,

    /// Run validation every N training batches (0 = never).
    #[config(default = 200)]
    pub val_check_interval: usize,

    /// Training batches per epoch (0 = a single endless epoch).
    #[config(default = 0)]
    pub batches_per_epoch: usize,

    /// Log a progress line every N training batches.
    #[config(default = 10)]
    pub log_interval: usize,

    /// Save a checkpoint every N training batches (0 = never).
    #[config(default = 0)]
    pub checkpoint_interval: usize,

    /// Directory for checkpoints.
    pub checkpoint_dir: Option<String>,

    /// Run the test orbit and assemble a video at the end.
    #[config(default = true)]
    pub run_test: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FitConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be positive".to_string());
        }
        if self.checkpoint_interval > 0 && self.checkpoint_dir.is_none() {
            return Err("checkpoint_interval needs checkpoint_dir".to_string());
        }
        Ok(())
    }
}
