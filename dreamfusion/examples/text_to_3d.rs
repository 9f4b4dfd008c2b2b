//! Example: Optimizing a volume renderer towards a text prompt.
//!
//! This example runs a short score-distillation training:
//! 1. Configure the renderer, prompt processor and loss weights
//! 2. Train with several optimizer updates per camera batch
//! 3. Save validation grids, a checkpoint and a test-orbit GIF
//!
//! # Usage
//!
//! ```bash
//! cargo run -p dreamfusion --example text_to_3d -- "a DSLR photo of a hamburger"
//! ```
//!
//! Output files are saved to `outputs/text_to_3d/`.

use std::process::ExitCode;

use burn::backend::{Autodiff, NdArray};

use dreamfusion::prelude::*;
use lift3d_io::{DiskImageSink, VideoFormat};

type MyBackend = Autodiff<NdArray>;

/// Output directory for generated files.
const OUTPUT_DIR: &str = "outputs/text_to_3d";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a DSLR photo of a hamburger".to_string());

    match run(&prompt) {
        Ok(report) => {
            println!("Trained '{}' for {} steps", prompt, report.global_step);
            if let Some(loss) = report.final_loss() {
                println!("  final loss:  {:.6}", loss);
            }
            println!("  validation:  {} images", report.validation_images.len());
            if let Some(video) = &report.video {
                println!("  test video:  {}", video.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Training failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(prompt: &str) -> dreamfusion::Result<FitReport> {
    let device = burn::backend::ndarray::NdArrayDevice::Cpu;

    let config = SystemConfig::for_prompt(prompt)
        .with_renderer(
            VolumeRendererConfig::new()
                .with_hidden_dims(vec![32, 32])
                .with_num_samples_per_ray(16),
        )
        .with_steps(4)
        .with_test_video_format(VideoFormat::Gif)
        .with_test_video_fps(10);

    let mut system = build_system::<MyBackend>(config, &device)?;
    let mut sampler = CameraSampler::new(
        CameraSamplerConfig::new()
            .with_height(32)
            .with_width(32)
            .with_eval_height(64)
            .with_eval_width(64)
            .with_n_test_views(12),
    )?;

    let fit_config = FitConfig::new()
        .with_max_steps(200)
        .with_val_check_interval(25)
        .with_checkpoint_interval(25)
        .with_checkpoint_dir(Some(format!("{}/ckpts", OUTPUT_DIR)));

    // Log scalars both to the log output and to memory.
    let mut logger = TeeLogger::new(LogMetricsLogger, MetricsHistory::new());
    let mut sink = DiskImageSink::new(format!("{}/save", OUTPUT_DIR));

    let report = fit(&mut system, &mut sampler, &fit_config, &mut logger, &mut sink)?;

    let sds = logger.second.values("train/loss_sds");
    if let (Some(first), Some(last)) = (sds.first(), sds.last()) {
        println!("loss_sds: {:.6} -> {:.6}", first, last);
    }
    Ok(report)
}
