//! # dreamfusion
//!
//! Text-to-3D training with score distillation, built on Burn.
//!
//! A volume renderer is optimized so that its images, scored by a
//! prompt-conditioned diffusion prior, match a text prompt. Each training
//! batch runs a fixed number of manual backward/update cycles with the
//! rendering randomness frozen for the whole batch.
//!
//! ## Features
//!
//! - **Renderer**: `VolumeRenderer`, a Fourier-encoded MLP field with
//!   alpha compositing and finite-difference normals
//! - **Prompt processor**: deterministic hashed token embeddings with
//!   view-dependent prompts
//! - **Guidance**: score distillation with classifier-free guidance and a
//!   latent cache
//! - **Losses**: weighted guidance terms plus orientation, sparsity and
//!   opacity-entropy regularizers, each with a step-dependent weight
//! - **Training**: `DreamFusionSystem`, the `fit` loop, checkpoints, image
//!   grids and test videos through `lift3d_io`
//!
//! ## Quick Start
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use dreamfusion::prelude::*;
//! use lift3d_io::DiskImageSink;
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let config = SystemConfig::for_prompt("a DSLR photo of a hamburger").with_steps(2);
//! let mut system = build_system::<MyBackend>(config, &device)?;
//!
//! let mut sampler = CameraSampler::new(CameraSamplerConfig::new())?;
//! let mut logger = LogMetricsLogger;
//! let mut sink = DiskImageSink::new("outputs/hamburger");
//!
//! let report = fit(&mut system, &mut sampler, &FitConfig::new(), &mut logger, &mut sink)?;
//! println!("final loss {:?}", report.final_loss());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! lift3d_core (pure math: cameras, schedules, noise, panels)
//!     │
//!     ├──────────────────┐
//!     ▼                  ▼
//! lift3d_io          dreamfusion
//! (images, video) ◄── (burn training)
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod error;
pub mod guidance;
pub mod host;
pub mod loss;
pub mod nn;
pub mod prompt;
pub mod render;
pub mod training;

// Re-export key types for convenience
pub use config::{FitConfig, LossConfig, SystemConfig};
pub use error::{DreamFusionError, Result};
pub use render::{RenderOutput, Renderer, VolumeRenderer};
pub use training::{build_system, fit, DreamFusionSystem, FitReport};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        CameraSamplerConfig, DensityActivation, FitConfig, GuidanceSpec,
        HashedPromptProcessorConfig, LossConfig, PromptProcessorSpec, SdsGuidanceConfig,
        SystemConfig, VolumeRendererConfig,
    };
    pub use crate::data::{orbit_cameras, CameraBatch, CameraSampler};
    pub use crate::error::{DreamFusionError, Result};
    pub use crate::guidance::{Guidance, GuidanceFlags, GuidanceOutput, SdsGuidance};
    pub use crate::loss::{opaque_loss, orientation_loss, sparsity_loss};
    pub use crate::prompt::{HashedPromptProcessor, PromptContext, PromptProcessor, ViewDirection};
    pub use crate::render::{RenderOutput, Renderer, VolumeRenderer};
    pub use crate::training::{
        build_optimizer, build_system, checkpoint_exists, find_latest_checkpoint, fit,
        load_checkpoint, save_checkpoint, BurnOptimizer, CheckpointMetadata, DreamFusionSystem,
        FitReport, LogMetricsLogger, ManualOptimizer, MetricsHistory, MetricsLogger,
        OptimizerConfig, TeeLogger, TrainStepOutput, TrainingProgress,
    };

    pub use lift3d_core::{RandPair, ScheduleSpec};
}
