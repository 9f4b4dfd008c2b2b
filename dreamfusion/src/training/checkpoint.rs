//! Checkpoint save/load for training resumption.
//!
//! A checkpoint is a directory holding:
//! - `model.mpk`: renderer weights (burn named MessagePack record)
//! - `config.json`: the system configuration
//! - `metadata.json`: training progress

use std::fs;
use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use super::progress::TrainingProgress;
use crate::config::SystemConfig;
use crate::error::{DreamFusionError, Result};

const MODEL_FILE: &str = "model";
const CONFIG_FILE: &str = "config.json";
const METADATA_FILE: &str = "metadata.json";
const CHECKPOINT_PREFIX: &str = "step_";
const CHECKPOINT_VERSION: u32 = 1;

/// Training progress stored next to the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Format version.
    pub version: u32,
    /// Completed epochs.
    pub epoch: usize,
    /// Optimizer updates.
    pub global_step: usize,
    /// Lowest loss seen, if any step ran.
    pub best_loss: Option<f32>,
    /// Moving-average loss.
    pub avg_loss: f32,
}

impl CheckpointMetadata {
    /// Metadata for the given progress.
    pub fn from_progress(progress: &TrainingProgress) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            epoch: progress.epoch,
            global_step: progress.global_step,
            best_loss: progress.best_loss.is_finite().then_some(progress.best_loss),
            avg_loss: progress.avg_loss,
        }
    }

    /// Progress to resume from.
    pub fn progress(&self) -> TrainingProgress {
        let mut progress = TrainingProgress::at(self.epoch, self.global_step);
        progress.best_loss = self.best_loss.unwrap_or(f32::INFINITY);
        progress.avg_loss = self.avg_loss;
        progress
    }
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Directory name of the checkpoint at `global_step`.
pub fn checkpoint_dir_name(global_step: usize) -> String {
    format!("{}{}", CHECKPOINT_PREFIX, global_step)
}

/// Save `model`, `config` and `progress` into `dir`.
pub fn save_checkpoint<B: Backend, M: Module<B>>(
    dir: &Path,
    model: &M,
    config: &SystemConfig,
    progress: &TrainingProgress,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    model
        .clone()
        .save_file(dir.join(MODEL_FILE), &recorder())
        .map_err(|e| DreamFusionError::Record(format!("{:?}", e)))?;
    config.save(dir.join(CONFIG_FILE))?;

    let metadata = CheckpointMetadata::from_progress(progress);
    fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(&metadata)?)?;

    log::info!(
        "Saved checkpoint to {:?} (epoch {}, step {})",
        dir,
        metadata.epoch,
        metadata.global_step
    );
    Ok(())
}

/// Load weights into `model` and read the config and metadata from `dir`.
pub fn load_checkpoint<B: Backend, M: Module<B>>(
    dir: &Path,
    model: M,
    device: &B::Device,
) -> Result<(M, SystemConfig, CheckpointMetadata)> {
    let metadata: CheckpointMetadata = serde_json::from_str(&fs::read_to_string(dir.join(METADATA_FILE))?)?;
    if metadata.version > CHECKPOINT_VERSION {
        return Err(DreamFusionError::InvalidData {
            message: format!(
                "checkpoint version {} is newer than supported {}",
                metadata.version, CHECKPOINT_VERSION
            ),
        });
    }

    let config = SystemConfig::load_json(dir.join(CONFIG_FILE))?;

    let model = model
        .load_file(dir.join(MODEL_FILE), &recorder(), device)
        .map_err(|e| DreamFusionError::Record(format!("{:?}", e)))?;

    log::info!(
        "Loaded checkpoint from {:?} (epoch {}, step {})",
        dir,
        metadata.epoch,
        metadata.global_step
    );
    Ok((model, config, metadata))
}

/// Whether `dir` holds a complete checkpoint.
pub fn checkpoint_exists(dir: &Path) -> bool {
    dir.join(METADATA_FILE).exists()
        && dir.join(CONFIG_FILE).exists()
        && dir.join(format!("{}.mpk", MODEL_FILE)).exists()
}

/// The complete `step_N` checkpoint with the largest N under `base_dir`.
pub fn find_latest_checkpoint(base_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(base_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && checkpoint_exists(path))
        .filter_map(|path| {
            let step = path
                .file_name()?
                .to_str()?
                .strip_prefix(CHECKPOINT_PREFIX)?
                .parse::<usize>()
                .ok()?;
            Some((step, path))
        })
        .max_by_key(|(step, _)| *step)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VolumeRendererConfig;
    use crate::host::to_vec;
    use crate::render::VolumeRenderer;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn tiny_renderer(device: &<TestBackend as Backend>::Device) -> VolumeRenderer<TestBackend> {
        VolumeRendererConfig::new()
            .with_hidden_dims(vec![8])
            .with_num_bands(2)
            .init(device)
    }

    fn touch_checkpoint(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(METADATA_FILE), "{}").unwrap();
        fs::write(dir.join(CONFIG_FILE), "{}").unwrap();
        fs::write(dir.join("model.mpk"), "").unwrap();
    }

    #[test]
    fn test_metadata_keeps_progress() {
        let mut progress = TrainingProgress::at(3, 120);
        progress.best_loss = 0.25;
        progress.avg_loss = 0.5;

        let metadata = CheckpointMetadata::from_progress(&progress);
        let json = serde_json::to_string(&metadata).unwrap();
        let parsed: CheckpointMetadata = serde_json::from_str(&json).unwrap();
        let restored = parsed.progress();
        assert_eq!((restored.epoch, restored.global_step), (3, 120));
        assert_eq!(restored.best_loss, 0.25);
    }

    #[test]
    fn test_metadata_without_best_loss() {
        let metadata = CheckpointMetadata::from_progress(&TrainingProgress::new());
        assert_eq!(metadata.best_loss, None);
        let json = serde_json::to_string(&metadata).unwrap();
        let parsed: CheckpointMetadata = serde_json::from_str(&json).unwrap();
        assert!(parsed.progress().best_loss.is_infinite());
    }

    #[test]
    fn test_checkpoint_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(checkpoint_dir_name(10));
        let device = Default::default();

        let model = tiny_renderer(&device);
        let config = SystemConfig::for_prompt("a teapot").with_steps(2);
        let progress = TrainingProgress::at(1, 10);
        save_checkpoint::<TestBackend, _>(&dir, &model, &config, &progress).unwrap();
        assert!(checkpoint_exists(&dir));

        let fresh = tiny_renderer(&device);
        let (loaded, loaded_config, metadata) =
            load_checkpoint::<TestBackend, _>(&dir, fresh, &device).unwrap();
        assert_eq!(loaded_config.steps, 2);
        assert_eq!(metadata.global_step, 10);

        let points = Tensor::<TestBackend, 2>::from_floats([[0.1, 0.2, 0.3]], &device);
        assert_eq!(
            to_vec(model.density(points.clone())).unwrap(),
            to_vec(loaded.density(points)).unwrap()
        );
    }

    #[test]
    fn test_load_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let device = Default::default();
        let result = load_checkpoint::<TestBackend, _>(
            &temp_dir.path().join("nope"),
            tiny_renderer(&device),
            &device,
        );
        assert!(matches!(result, Err(DreamFusionError::Io(_))));
    }

    #[test]
    fn test_find_latest_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        for step in [5, 100, 30] {
            touch_checkpoint(&base.join(checkpoint_dir_name(step)));
        }
        // Incomplete and foreign directories are ignored.
        fs::create_dir_all(base.join(checkpoint_dir_name(500))).unwrap();
        touch_checkpoint(&base.join("other_900"));

        let latest = find_latest_checkpoint(base).unwrap();
        assert!(latest.ends_with("step_100"));
        assert!(find_latest_checkpoint(&base.join("missing")).is_none());
    }
}
