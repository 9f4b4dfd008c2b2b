//! Outer training loop.

use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use lift3d_io::ImageSink;

use super::metrics::MetricsLogger;
use super::optimizer::ManualOptimizer;
use super::system::DreamFusionSystem;
use crate::config::FitConfig;
use crate::data::CameraSampler;
use crate::error::{DreamFusionError, Result};
use crate::render::Renderer;

/// What [`fit`] produced.
#[derive(Debug, Clone, Default)]
pub struct FitReport {
    /// Total loss of every optimizer update, in order.
    pub losses: Vec<f32>,
    /// Training batches run.
    pub batches: usize,
    /// Global step at the end.
    pub global_step: usize,
    /// Saved validation grids.
    pub validation_images: Vec<PathBuf>,
    /// Saved test frames.
    pub test_images: Vec<PathBuf>,
    /// Assembled test video.
    pub video: Option<PathBuf>,
    /// Saved checkpoint directories.
    pub checkpoints: Vec<PathBuf>,
}

impl FitReport {
    /// Loss of the last update.
    pub fn final_loss(&self) -> Option<f32> {
        self.losses.last().copied()
    }
}

/// Train until `max_steps` optimizer updates, validating, checkpointing and
/// finally testing as configured.
pub fn fit<B, R, O>(
    system: &mut DreamFusionSystem<B, R, O>,
    sampler: &mut CameraSampler,
    config: &FitConfig,
    logger: &mut dyn MetricsLogger,
    sink: &mut dyn ImageSink,
) -> Result<FitReport>
where
    B: AutodiffBackend,
    R: Renderer<B> + AutodiffModule<B>,
    O: ManualOptimizer<R, B>,
{
    config
        .validate()
        .map_err(|message| DreamFusionError::InvalidConfig { message })?;

    let device = system.device().clone();
    system.on_fit_start()?;
    let val_cameras = sampler.validation_cameras::<B>(&device)?;

    let mut report = FitReport::default();
    log::info!(
        "Training '{}' for {} steps ({} views per batch)",
        system.config().prompt_processor.prompt(),
        config.max_steps,
        sampler.config().batch_size
    );

    while system.global_step() < config.max_steps {
        let batch_idx = report.batches;
        let batch = sampler.sample::<B>(&device)?;
        system.on_train_batch_start(batch_idx)?;
        let out = system.training_step(&batch, batch_idx, logger)?;
        report.losses.extend(out.losses);
        report.batches += 1;
        let done = report.batches;

        if config.log_interval > 0 && done % config.log_interval == 0 {
            log::info!(
                "Step {}/{}: loss = {:.6} (avg {:.6})",
                system.global_step(),
                config.max_steps,
                report.final_loss().unwrap_or(f32::NAN),
                system.progress().avg_loss
            );
        }

        if config.batches_per_epoch > 0 && done % config.batches_per_epoch == 0 {
            system.on_train_epoch_end();
        }

        if config.val_check_interval > 0 && done % config.val_check_interval == 0 {
            for (i, cameras) in val_cameras.iter().enumerate() {
                report.validation_images.push(system.validation_step(cameras, i, sink)?);
            }
            system.on_validation_epoch_end();
        }

        if let Some(dir) = &config.checkpoint_dir {
            if config.checkpoint_interval > 0 && done % config.checkpoint_interval == 0 {
                report.checkpoints.push(system.save_checkpoint(Path::new(dir))?);
            }
        }
    }

    if config.run_test {
        for (i, cameras) in sampler.test_cameras::<B>(&device)?.iter().enumerate() {
            report.test_images.push(system.test_step(cameras, i, sink)?);
        }
        report.video = Some(system.on_test_epoch_end(sink)?);
    }

    report.global_step = system.global_step();
    log::info!(
        "Training done: {} batches, {} steps, final loss {:.6}",
        report.batches,
        report.global_step,
        report.final_loss().unwrap_or(f32::NAN)
    );
    Ok(report)
}
