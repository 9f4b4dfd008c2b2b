//! Configuration types for dreamfusion.
//!
//! Burn-style configuration structs for the renderer, prompt processor,
//! guidance, loss weights, cameras and the training loop. Everything
//! round-trips through JSON with `Config::save` / `Config::load`;
//! `SystemConfig::load_json` also accepts files that leave out defaulted
//! fields.

mod components;
mod defaults;
mod loss;
mod network;
mod training;

pub use components::{
    GuidanceSpec, HashedPromptProcessorConfig, PromptProcessorSpec, SdsGuidanceConfig,
};
pub use loss::{LossConfig, LAMBDA_OPAQUE, LAMBDA_ORIENT, LAMBDA_SDS, LAMBDA_SPARSITY};
pub use network::{DensityActivation, VolumeRendererConfig};
pub use training::{CameraSamplerConfig, FitConfig, SystemConfig};
