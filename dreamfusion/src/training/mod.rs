//! Training infrastructure for text-to-3D.
//!
//! This module provides:
//! - `DreamFusionSystem`: per-batch multi-step optimization
//! - `fit`: the outer loop with validation, checkpoints and the test video
//! - Metrics loggers
//! - Optimizer configuration and manual gradient control
//! - Checkpoint save/load for training resumption

mod checkpoint;
mod fit;
mod metrics;
mod optimizer;
mod progress;
mod system;

pub use checkpoint::{
    checkpoint_dir_name, checkpoint_exists, find_latest_checkpoint, load_checkpoint,
    save_checkpoint, CheckpointMetadata,
};
pub use fit::{fit, FitReport};
pub use metrics::{LogMetricsLogger, MetricsHistory, MetricsLogger, TeeLogger};
pub use optimizer::{build_optimizer, BurnOptimizer, ManualOptimizer, OptimizerConfig};
pub use progress::TrainingProgress;
pub use system::{build_system, eval_panels, DreamFusionSystem, TrainStepOutput};
