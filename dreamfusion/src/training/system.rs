//! The text-to-3D training system.
//!
//! [`DreamFusionSystem`] owns the renderer being optimized, the prompt
//! processor, the guidance and the optimizer, and drives several manual
//! backward/update cycles per training batch.

use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use lift3d_core::{ImagePanel, LossWeights, RandPair};
use lift3d_io::{ImageSink, SequenceRequest};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::checkpoint::{checkpoint_dir_name, load_checkpoint, CheckpointMetadata};
use super::metrics::MetricsLogger;
use super::optimizer::{build_optimizer, ManualOptimizer};
use super::progress::TrainingProgress;
use crate::config::{SystemConfig, LAMBDA_OPAQUE, LAMBDA_ORIENT, LAMBDA_SPARSITY};
use crate::data::CameraBatch;
use crate::error::{DreamFusionError, Result};
use crate::guidance::{Guidance, GuidanceFlags};
use crate::host::{to_scalar, to_vec};
use crate::loss::{opaque_loss, orientation_loss, sparsity_loss};
use crate::prompt::PromptProcessor;
use crate::render::{RenderOutput, Renderer, VolumeRenderer};

/// What one call to [`DreamFusionSystem::training_step`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainStepOutput {
    /// Total loss of each inner iteration.
    pub losses: Vec<f32>,
    /// Randomness shared by every render of the call.
    pub rand: RandPair,
}

/// Text-to-3D system optimizing a renderer with score distillation.
pub struct DreamFusionSystem<B, R, O>
where
    B: AutodiffBackend,
    R: Renderer<B> + AutodiffModule<B>,
    O: ManualOptimizer<R, B>,
{
    config: SystemConfig,
    renderer: R,
    optimizer: O,
    prompt_processor: Option<Box<dyn PromptProcessor<B>>>,
    guidance: Option<Box<dyn Guidance<B>>>,
    progress: TrainingProgress,
    rng: StdRng,
    device: B::Device,
}

/// Build a system with a [`VolumeRenderer`] and Adam from configuration.
pub fn build_system<B: AutodiffBackend>(
    config: SystemConfig,
    device: &B::Device,
) -> Result<DreamFusionSystem<B, VolumeRenderer<B>, impl ManualOptimizer<VolumeRenderer<B>, B>>> {
    let renderer = config.renderer.init::<B>(device);
    let optimizer = build_optimizer::<B, VolumeRenderer<B>>(&config.optimizer);
    DreamFusionSystem::new(config, renderer, optimizer, device)
}

impl<B, R, O> DreamFusionSystem<B, R, O>
where
    B: AutodiffBackend,
    R: Renderer<B> + AutodiffModule<B>,
    O: ManualOptimizer<R, B>,
{
    /// Create a system; the config is validated here.
    ///
    /// Prompt processor and guidance are built by [`on_fit_start`](Self::on_fit_start)
    /// unless set beforehand.
    pub fn new(config: SystemConfig, renderer: R, optimizer: O, device: &B::Device) -> Result<Self> {
        config
            .validate()
            .map_err(|message| DreamFusionError::InvalidConfig { message })?;

        Ok(Self {
            rng: step_rng(config.seed, 0),
            config,
            renderer,
            optimizer,
            prompt_processor: None,
            guidance: None,
            progress: TrainingProgress::new(),
            device: device.clone(),
        })
    }

    /// Use this prompt processor instead of the configured one.
    pub fn set_prompt_processor(&mut self, processor: Box<dyn PromptProcessor<B>>) {
        self.prompt_processor = Some(processor);
    }

    /// Use this guidance instead of the configured one.
    pub fn set_guidance(&mut self, guidance: Box<dyn Guidance<B>>) {
        self.guidance = Some(guidance);
    }

    /// System configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The renderer being optimized.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Consume the system, keeping the trained renderer.
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// The optimizer.
    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Training position.
    pub fn progress(&self) -> &TrainingProgress {
        &self.progress
    }

    /// Optimizer updates so far.
    pub fn global_step(&self) -> usize {
        self.progress.global_step
    }

    /// Device tensors are created on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Build any component that was not set explicitly.
    pub fn on_fit_start(&mut self) -> Result<()> {
        if self.prompt_processor.is_none() {
            self.prompt_processor = Some(self.config.prompt_processor.build::<B>(&self.device)?);
        }
        if self.guidance.is_none() {
            self.guidance = Some(self.config.guidance.build::<B>(&self.device)?);
        }
        log::info!(
            "Fit start: {} optimization steps per batch, global step {}",
            self.config.steps,
            self.progress.global_step
        );
        Ok(())
    }

    /// Refresh step-dependent guidance settings.
    pub fn on_train_batch_start(&mut self, batch_idx: usize) -> Result<()> {
        let guidance = self
            .guidance
            .as_mut()
            .ok_or(DreamFusionError::ComponentNotReady { component: "guidance" })?;
        log::trace!("batch {} start at global step {}", batch_idx, self.progress.global_step);
        guidance.update_step(self.progress.epoch, self.progress.global_step)
    }

    /// Mark the end of an epoch.
    pub fn on_train_epoch_end(&mut self) {
        self.progress.on_epoch();
    }

    /// Run `steps` optimization iterations on one batch.
    ///
    /// One randomness pair is drawn per call and reused by every render.
    /// Guidance reuses its cached latents on every iteration but the first.
    pub fn training_step(
        &mut self,
        batch: &CameraBatch<B>,
        batch_idx: usize,
        logger: &mut dyn MetricsLogger,
    ) -> Result<TrainStepOutput> {
        let prompt_processor = self
            .prompt_processor
            .as_ref()
            .ok_or(DreamFusionError::ComponentNotReady { component: "prompt_processor" })?;
        let guidance = self
            .guidance
            .as_mut()
            .ok_or(DreamFusionError::ComponentNotReady { component: "guidance" })?;

        let rand = RandPair::draw(&mut self.rng);
        let mut losses = Vec::with_capacity(self.config.steps);

        for i in 1..=self.config.steps {
            let out = self.renderer.render(batch, Some(rand))?;
            self.optimizer.zero_grad();

            let prompt = prompt_processor.encode_prompt();
            let guidance_out = guidance.compute_guidance(
                out.comp_rgb.clone(),
                &prompt,
                batch,
                GuidanceFlags {
                    rgb_as_latents: false,
                    restore_latents: i != 1,
                },
            )?;

            let step = self.progress.global_step;
            let loss_config = &self.config.loss;
            let progress = &self.progress;

            let mut loss = Tensor::<B, 1>::zeros([1], &self.device);
            for (name, value) in guidance_out.iter() {
                logger.log_scalar(&format!("train/{}", name), to_scalar(value.clone())?, step);
                if let Some(weight) = LossWeights::weight_name_for(name) {
                    loss = loss + value.clone() * loss_config.resolve(&weight, progress)?;
                }
            }

            let lambda_orient = loss_config.resolve(LAMBDA_ORIENT, progress)?;
            if lambda_orient > 0.0 {
                let normal = out.normal.clone().ok_or(DreamFusionError::MissingNormal)?;
                let weights = out
                    .weights
                    .clone()
                    .ok_or(DreamFusionError::MissingRenderField { field: "weights" })?;
                let t_dirs = out
                    .t_dirs
                    .clone()
                    .ok_or(DreamFusionError::MissingRenderField { field: "t_dirs" })?;
                let loss_orient = orientation_loss(weights, normal, t_dirs, out.opacity.clone());
                logger.log_scalar("train/loss_orient", to_scalar(loss_orient.clone())?, step);
                loss = loss + loss_orient * lambda_orient;
            }

            let loss_sparsity = sparsity_loss(out.opacity.clone());
            logger.log_scalar("train/loss_sparsity", to_scalar(loss_sparsity.clone())?, step);
            loss = loss + loss_sparsity * loss_config.resolve(LAMBDA_SPARSITY, progress)?;

            let loss_opaque = opaque_loss(out.opacity);
            logger.log_scalar("train/loss_opaque", to_scalar(loss_opaque.clone())?, step);
            loss = loss + loss_opaque * loss_config.resolve(LAMBDA_OPAQUE, progress)?;

            for (name, value) in loss_config.resolve_all(progress)? {
                logger.log_scalar(&format!("train_params/{}", name), value, step);
            }

            let loss_value = to_scalar(loss.clone())?;
            logger.log_scalar("train/loss", loss_value, step);
            log::debug!("batch {} iter {}/{}: loss {:.6}", batch_idx, i, self.config.steps, loss_value);

            self.optimizer.backward(loss, &self.renderer);
            self.renderer = self.optimizer.step(self.renderer.clone());
            self.progress.on_step(loss_value);
            losses.push(loss_value);
        }

        Ok(TrainStepOutput { losses, rand })
    }

    /// Render a validation batch and save `it{step}-{index}.png`.
    pub fn validation_step(
        &self,
        batch: &CameraBatch<B>,
        batch_idx: usize,
        sink: &mut dyn ImageSink,
    ) -> Result<PathBuf> {
        let index = first_index(batch)?;
        let filename = format!("it{}-{}.png", self.progress.global_step, index);
        self.render_and_save(batch, batch_idx, &filename, "validation_step", sink)
    }

    /// End of a validation pass.
    pub fn on_validation_epoch_end(&self) {
        log::info!("Validation done at global step {}", self.progress.global_step);
    }

    /// Render a test batch and save `it{step}-test/{index}.png`.
    pub fn test_step(
        &self,
        batch: &CameraBatch<B>,
        batch_idx: usize,
        sink: &mut dyn ImageSink,
    ) -> Result<PathBuf> {
        let index = first_index(batch)?;
        let filename = format!("it{}-test/{}.png", self.progress.global_step, index);
        self.render_and_save(batch, batch_idx, &filename, "test_step", sink)
    }

    /// Assemble the test frames of the current step into a video.
    pub fn on_test_epoch_end(&self, sink: &mut dyn ImageSink) -> Result<PathBuf> {
        let step = self.progress.global_step;
        let dir = format!("it{}-test", step);
        let request = SequenceRequest::new(dir.clone(), dir)
            .with_pattern(r"(\d+)\.png")
            .with_format(self.config.test_video_format)
            .with_fps(self.config.test_video_fps)
            .with_tag("test", step as u64);
        Ok(sink.save_img_sequence(&request)?)
    }

    /// Save a `step_N` checkpoint under `base_dir` and return its directory.
    pub fn save_checkpoint(&self, base_dir: &Path) -> Result<PathBuf> {
        let dir = base_dir.join(checkpoint_dir_name(self.progress.global_step));
        super::checkpoint::save_checkpoint::<B, R>(&dir, &self.renderer, &self.config, &self.progress)?;
        Ok(dir)
    }

    /// Restore renderer weights and progress from a checkpoint directory.
    pub fn restore_checkpoint(&mut self, dir: &Path) -> Result<CheckpointMetadata> {
        let (renderer, _, metadata) = load_checkpoint::<B, R>(dir, self.renderer.clone(), &self.device)?;
        self.renderer = renderer;
        self.progress = metadata.progress();
        self.rng = step_rng(self.config.seed, self.progress.global_step);
        log::info!(
            "Resumed at epoch {}, global step {}",
            self.progress.epoch,
            self.progress.global_step
        );
        Ok(metadata)
    }

    fn render_and_save(
        &self,
        batch: &CameraBatch<B>,
        batch_idx: usize,
        filename: &str,
        name: &str,
        sink: &mut dyn ImageSink,
    ) -> Result<PathBuf> {
        let out = self.renderer.render(batch, None)?;
        let panels = eval_panels(&out)?;
        log::debug!("{} {}: {} panels", name, batch_idx, panels.len());
        Ok(sink.save_image_grid(filename, &panels, name, self.progress.global_step as u64)?)
    }
}

/// Randomness source for a run starting at `global_step`.
///
/// Step 0 is seeded with `seed` itself; later steps mix the step in, so a
/// resumed run does not replay the pairs drawn from the start.
fn step_rng(seed: u64, global_step: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (global_step as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn first_index<B: Backend>(batch: &CameraBatch<B>) -> Result<usize> {
    batch
        .index
        .first()
        .copied()
        .ok_or_else(|| DreamFusionError::InvalidData {
            message: "camera batch has no index".to_string(),
        })
}

/// RGB, optional normal and grayscale opacity panels of the first view.
pub fn eval_panels<B: Backend>(out: &RenderOutput<B>) -> Result<Vec<ImagePanel>> {
    let [_, h, w, _] = out.comp_rgb.dims();
    let first = |t: Tensor<B, 4>, c: usize| to_vec(t.slice([0..1, 0..h, 0..w, 0..c]));

    let mut panels = vec![ImagePanel::rgb(h, w, first(out.comp_rgb.clone(), 3)?)];
    if let Some(normal) = &out.comp_normal {
        panels.push(ImagePanel::rgb(h, w, first(normal.clone(), 3)?));
    }
    panels.push(ImagePanel::grayscale(h, w, first(out.opacity.clone(), 1)?));
    Ok(panels)
}
