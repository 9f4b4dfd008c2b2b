//! Training-step behavior of `DreamFusionSystem` with instrumented
//! collaborators.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use burn::backend::{Autodiff, NdArray};
use burn::module::{Ignored, Module, Param};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use dreamfusion::config::{LAMBDA_OPAQUE, LAMBDA_ORIENT, LAMBDA_SDS, LAMBDA_SPARSITY};
use dreamfusion::host::to_vec;
use dreamfusion::prelude::*;
use lift3d_core::{CameraView, ImagePanel};
use lift3d_io::{ImageSink, SequenceRequest, VideoFormat};

type TestBackend = Autodiff<NdArray>;

/// Shared record of what the collaborators saw.
#[derive(Debug, Clone, Default)]
struct CallLog {
    renders: Arc<Mutex<Vec<Option<RandPair>>>>,
    flags: Arc<Mutex<Vec<GuidanceFlags>>>,
    optimizer: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    fn renders(&self) -> Vec<Option<RandPair>> {
        self.renders.lock().unwrap().clone()
    }

    fn flags(&self) -> Vec<GuidanceFlags> {
        self.flags.lock().unwrap().clone()
    }

    fn optimizer(&self) -> Vec<&'static str> {
        self.optimizer.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone)]
struct MockSettings {
    with_normals: bool,
    calls: CallLog,
}

/// Renders a uniform image whose opacity is a single parameter.
#[derive(Module, Debug)]
struct MockRenderer<B: Backend> {
    opacity: Param<Tensor<B, 1>>,
    settings: Ignored<MockSettings>,
}

impl<B: Backend> MockRenderer<B> {
    fn new(opacity: f32, with_normals: bool, calls: &CallLog, device: &B::Device) -> Self {
        Self {
            opacity: Param::from_tensor(Tensor::from_floats([opacity], device)),
            settings: Ignored(MockSettings {
                with_normals,
                calls: calls.clone(),
            }),
        }
    }

    fn opacity_value(&self) -> f32 {
        to_vec(self.opacity.val()).unwrap()[0]
    }
}

impl<B: Backend> Renderer<B> for MockRenderer<B> {
    fn render(&self, batch: &CameraBatch<B>, rand: Option<RandPair>) -> dreamfusion::Result<RenderOutput<B>> {
        self.settings.0.calls.renders.lock().unwrap().push(rand);

        let (b, h, w) = (batch.batch_size(), batch.height, batch.width);
        let n = b * h * w;
        let opacity = self
            .opacity
            .val()
            .reshape([1, 1, 1, 1])
            .repeat_dim(0, b)
            .repeat_dim(1, h)
            .repeat_dim(2, w);

        let mut out = RenderOutput::new(opacity.clone().repeat_dim(3, 3), opacity.clone());
        if self.settings.0.with_normals {
            let device = opacity.device();
            // Normals face the camera, so orientation loss is 0.
            let normal = Tensor::<B, 2>::from_floats([[0.0, 0.0, 1.0]], &device).repeat_dim(0, n);
            let dirs = Tensor::<B, 2>::from_floats([[0.0, 0.0, -1.0]], &device).repeat_dim(0, n);
            out.weights = Some(opacity.clone().reshape([n, 1]));
            out.comp_normal = Some(Tensor::full([b, h, w, 3], 0.5, &device));
            out.normal = Some(normal);
            out.t_dirs = Some(dirs);
        }
        Ok(out)
    }
}

/// Guidance returning the mean image value as `loss_sds`.
struct MockGuidance {
    calls: CallLog,
    extra_term: Option<&'static str>,
}

impl<B: Backend> Guidance<B> for MockGuidance {
    fn compute_guidance(
        &mut self,
        rgb: Tensor<B, 4>,
        _prompt: &PromptContext<B>,
        _batch: &CameraBatch<B>,
        flags: GuidanceFlags,
    ) -> dreamfusion::Result<GuidanceOutput<B>> {
        self.calls.flags.lock().unwrap().push(flags);
        let mean = rgb.mean();
        let mut out = GuidanceOutput::new()
            .with("loss_sds", mean.clone())
            .with("grad_norm", mean.clone().detach());
        if let Some(name) = self.extra_term {
            out.insert(name, mean);
        }
        Ok(out)
    }
}

/// Records calls and leaves the module unchanged.
struct RecordingOptimizer {
    calls: CallLog,
}

impl<M, B: AutodiffBackend> ManualOptimizer<M, B> for RecordingOptimizer {
    fn zero_grad(&mut self) {
        self.calls.optimizer.lock().unwrap().push("zero_grad");
    }

    fn backward(&mut self, _loss: Tensor<B, 1>, _module: &M) {
        self.calls.optimizer.lock().unwrap().push("backward");
    }

    fn step(&mut self, module: M) -> M {
        self.calls.optimizer.lock().unwrap().push("step");
        module
    }
}

/// Keeps grid and sequence requests in memory.
#[derive(Default)]
struct RecordingSink {
    grids: Vec<(String, Vec<ImagePanel>, String, u64)>,
    sequences: Vec<SequenceRequest>,
}

impl ImageSink for RecordingSink {
    fn save_image_grid(
        &mut self,
        filename: &str,
        panels: &[ImagePanel],
        name: &str,
        step: u64,
    ) -> lift3d_io::Result<PathBuf> {
        self.grids
            .push((filename.to_string(), panels.to_vec(), name.to_string(), step));
        Ok(PathBuf::from(filename))
    }

    fn save_img_sequence(&mut self, request: &SequenceRequest) -> lift3d_io::Result<PathBuf> {
        self.sequences.push(request.clone());
        Ok(PathBuf::from(request.output_name()))
    }
}

fn sparsity_only() -> LossConfig {
    LossConfig::empty()
        .with(LAMBDA_SDS, 0.0)
        .with(LAMBDA_ORIENT, 0.0)
        .with(LAMBDA_SPARSITY, 1.0)
        .with(LAMBDA_OPAQUE, 0.0)
}

fn batch(index: usize) -> CameraBatch<TestBackend> {
    let view = CameraView::new(15.0, 30.0, 1.5, 60.0);
    CameraBatch::from_views(&[view], 2, 2, vec![index], &Default::default()).unwrap()
}

type MockSystem = DreamFusionSystem<TestBackend, MockRenderer<TestBackend>, RecordingOptimizer>;

fn mock_system(config: SystemConfig, renderer: MockRenderer<TestBackend>, calls: &CallLog) -> MockSystem {
    let device = Default::default();
    let mut system = DreamFusionSystem::new(
        config,
        renderer,
        RecordingOptimizer {
            calls: calls.clone(),
        },
        &device,
    )
    .unwrap();
    system.set_guidance(Box::new(MockGuidance {
        calls: calls.clone(),
        extra_term: None,
    }));
    system.on_fit_start().unwrap();
    system
}

fn config(steps: usize, loss: LossConfig) -> SystemConfig {
    SystemConfig::for_prompt("a cube").with_steps(steps).with_loss(loss)
}

#[test]
fn test_optimizer_called_once_per_iteration() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let mut system = mock_system(config(3, LossConfig::default()), renderer, &calls);

    let out = system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap();

    assert_eq!(out.losses.len(), 3);
    assert_eq!(
        calls.optimizer(),
        ["zero_grad", "backward", "step"].repeat(3)
    );
    assert_eq!(system.global_step(), 3);
}

#[test]
fn test_randomness_frozen_within_call_and_fresh_across_calls() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let mut system = mock_system(config(4, LossConfig::default()), renderer, &calls);
    let mut logger = MetricsHistory::new();

    let first = system.training_step(&batch(0), 0, &mut logger).unwrap();
    let second = system.training_step(&batch(1), 1, &mut logger).unwrap();

    let renders = calls.renders();
    assert_eq!(renders.len(), 8);
    assert!(renders[..4].iter().all(|r| *r == Some(first.rand)));
    assert!(renders[4..].iter().all(|r| *r == Some(second.rand)));
    assert_ne!(first.rand, second.rand);
}

#[test]
fn test_restore_latents_after_first_iteration() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let mut system = mock_system(config(3, LossConfig::default()), renderer, &calls);
    let mut logger = MetricsHistory::new();

    system.training_step(&batch(0), 0, &mut logger).unwrap();
    system.training_step(&batch(1), 1, &mut logger).unwrap();

    let restore: Vec<bool> = calls.flags().iter().map(|f| f.restore_latents).collect();
    assert_eq!(restore, vec![false, true, true, false, true, true]);
    assert!(calls.flags().iter().all(|f| !f.rgb_as_latents));
}

#[test]
fn test_orientation_skipped_at_zero_weight() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, false, &calls, &Default::default());
    let mut system = mock_system(config(2, sparsity_only()), renderer, &calls);
    let mut logger = MetricsHistory::new();

    system.training_step(&batch(0), 0, &mut logger).unwrap();
    assert_eq!(logger.count("train/loss_orient"), 0);
    assert_eq!(system.global_step(), 2);
}

#[test]
fn test_orientation_without_normal_fails_before_update() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, false, &calls, &Default::default());
    let loss = sparsity_only().with(LAMBDA_ORIENT, 1.0);
    let mut system = mock_system(config(2, loss), renderer, &calls);

    let err = system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap_err();
    assert!(matches!(err, DreamFusionError::MissingNormal));
    assert_eq!(calls.optimizer(), vec!["zero_grad"]);
    assert_eq!(system.global_step(), 0);
}

#[test]
fn test_orientation_logged_when_enabled() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let loss = sparsity_only().with(LAMBDA_ORIENT, 1.0);
    let mut system = mock_system(config(1, loss), renderer, &calls);
    let mut logger = MetricsHistory::new();

    system.training_step(&batch(0), 0, &mut logger).unwrap();
    assert_eq!(logger.last("train/loss_orient"), Some(0.0));
}

#[test]
fn test_sparsity_values() {
    for (opacity, expected) in [(0.0f32, 0.1f32), (1.0, 1.01f32.sqrt())] {
        let calls = CallLog::default();
        let renderer = MockRenderer::new(opacity, true, &calls, &Default::default());
        let mut system = mock_system(config(1, sparsity_only()), renderer, &calls);
        let mut logger = MetricsHistory::new();

        let out = system.training_step(&batch(0), 0, &mut logger).unwrap();
        let sparsity = logger.last("train/loss_sparsity").unwrap();
        assert!((sparsity - expected).abs() < 1e-5, "{} vs {}", sparsity, expected);
        assert!((out.losses[0] - expected).abs() < 1e-5);
    }
}

#[test]
fn test_sparsity_only_end_to_end() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.3, true, &calls, &Default::default());
    let mut system = mock_system(config(2, sparsity_only()), renderer, &calls);
    let mut logger = MetricsHistory::new();

    let out = system.training_step(&batch(0), 0, &mut logger).unwrap();

    let sparsity = logger.values("train/loss_sparsity");
    assert_eq!(sparsity.len(), 2);
    assert_eq!(out.losses.len(), 2);
    for (loss, term) in out.losses.iter().zip(&sparsity) {
        assert!((loss - term).abs() < 1e-6);
    }
    assert_eq!(calls.optimizer().iter().filter(|&&e| e == "step").count(), 2);

    // Guidance outputs and every weight are logged once per iteration.
    assert_eq!(logger.count("train/loss_sds"), 2);
    assert_eq!(logger.count("train/grad_norm"), 2);
    for name in [LAMBDA_SDS, LAMBDA_ORIENT, LAMBDA_SPARSITY, LAMBDA_OPAQUE] {
        assert_eq!(logger.count(&format!("train_params/{}", name)), 2);
    }
    assert_eq!(
        logger.entries("train/loss_sparsity").iter().map(|&(s, _)| s).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[test]
fn test_weighted_guidance_terms() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let loss = sparsity_only().with(LAMBDA_SPARSITY, 0.0).with(LAMBDA_SDS, 2.0);
    let mut system = mock_system(config(1, loss), renderer, &calls);

    let out = system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap();
    // loss_sds is the mean image value, 0.5; grad_norm is not a loss term.
    assert!((out.losses[0] - 1.0).abs() < 1e-6);
}

#[test]
fn test_loss_term_without_weight_fails() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let mut system = mock_system(config(1, LossConfig::default()), renderer, &calls);
    system.set_guidance(Box::new(MockGuidance {
        calls: calls.clone(),
        extra_term: Some("loss_extra"),
    }));

    let err = system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap_err();
    assert!(matches!(err, DreamFusionError::MissingLossWeight { name } if name == "lambda_extra"));
}

#[test]
fn test_training_before_fit_start_fails() {
    let calls = CallLog::default();
    let device = Default::default();
    let mut system: MockSystem = DreamFusionSystem::new(
        config(1, LossConfig::default()),
        MockRenderer::new(0.5, true, &calls, &device),
        RecordingOptimizer {
            calls: calls.clone(),
        },
        &device,
    )
    .unwrap();

    let err = system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap_err();
    assert!(matches!(err, DreamFusionError::ComponentNotReady { .. }));
    assert!(calls.renders().is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let calls = CallLog::default();
    let device = Default::default();
    let result: dreamfusion::Result<MockSystem> = DreamFusionSystem::new(
        config(0, LossConfig::default()),
        MockRenderer::new(0.5, true, &calls, &device),
        RecordingOptimizer { calls },
        &device,
    );
    assert!(matches!(result, Err(DreamFusionError::InvalidConfig { .. })));
}

#[test]
fn test_validation_and_test_steps_do_not_optimize() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let system = mock_system(config(2, LossConfig::default()), renderer, &calls);
    let mut sink = RecordingSink::default();

    system.validation_step(&batch(3), 0, &mut sink).unwrap();
    system.test_step(&batch(7), 0, &mut sink).unwrap();

    assert!(calls.optimizer().is_empty());
    assert!(calls.flags().is_empty());
    assert_eq!(calls.renders(), vec![None, None]);
    assert_eq!(system.renderer().opacity_value(), 0.5);

    let (filename, panels, name, step) = &sink.grids[0];
    assert_eq!(filename, "it0-3.png");
    assert_eq!(name, "validation_step");
    assert_eq!(*step, 0);
    assert_eq!(panels.len(), 3);

    let (filename, _, name, _) = &sink.grids[1];
    assert_eq!(filename, "it0-test/7.png");
    assert_eq!(name, "test_step");
}

#[test]
fn test_eval_panels_without_normal() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.25, false, &calls, &Default::default());
    let system = mock_system(config(1, LossConfig::default()), renderer, &calls);
    let mut sink = RecordingSink::default();

    system.validation_step(&batch(0), 0, &mut sink).unwrap();
    let panels = &sink.grids[0].1;
    assert_eq!(panels.len(), 2);
    assert_eq!(panels[0].channels(), 3);
    assert_eq!(panels[1].channels(), 1);
    assert!(panels[1].data.iter().all(|&v| (v - 0.25).abs() < 1e-6));
}

#[test]
fn test_file_names_follow_global_step() {
    let calls = CallLog::default();
    let renderer = MockRenderer::new(0.5, true, &calls, &Default::default());
    let mut system = mock_system(config(2, LossConfig::default()), renderer, &calls);
    system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap();

    let mut sink = RecordingSink::default();
    system.test_step(&batch(4), 0, &mut sink).unwrap();
    system.on_test_epoch_end(&mut sink).unwrap();

    assert_eq!(sink.grids[0].0, "it2-test/4.png");
    let request = &sink.sequences[0];
    assert_eq!(request.filename, "it2-test");
    assert_eq!(request.img_dir, "it2-test");
    assert_eq!(request.pattern, r"(\d+)\.png");
    assert_eq!(request.save_format, VideoFormat::Mp4);
    assert_eq!(request.fps, 30);
    assert_eq!(request.name, "test");
    assert_eq!(request.step, 2);
}

#[test]
fn test_real_optimizer_reduces_sparsity() {
    let calls = CallLog::default();
    let device = Default::default();
    let config = config(5, sparsity_only());
    let optimizer = build_optimizer::<TestBackend, MockRenderer<TestBackend>>(
        &OptimizerConfig::new().with_learning_rate(0.05),
    );
    let mut system = DreamFusionSystem::new(
        config,
        MockRenderer::new(0.8, true, &calls, &device),
        optimizer,
        &device,
    )
    .unwrap();
    system.set_guidance(Box::new(MockGuidance {
        calls: calls.clone(),
        extra_term: None,
    }));
    system.on_fit_start().unwrap();

    let out = system
        .training_step(&batch(0), 0, &mut MetricsHistory::new())
        .unwrap();
    assert!(out.losses[4] < out.losses[0]);
    assert!(system.renderer().opacity_value() < 0.8);
}
