//! Optimizer configuration and manual gradient control.
//!
//! Training runs several backward/update cycles per batch, so the system
//! drives the optimizer explicitly through [`ManualOptimizer`] instead of
//! relying on a per-batch training loop.

use std::marker::PhantomData;

use burn::config::Config;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsAccumulator, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Configuration for the Adam optimizer.
#[derive(Config, Debug)]
pub struct OptimizerConfig {
    /// Learning rate.
    #[config(default = 1e-2)]
    pub learning_rate: f64,

    /// First moment decay.
    #[config(default = 0.9)]
    pub beta_1: f32,

    /// Second moment decay.
    #[config(default = 0.99)]
    pub beta_2: f32,

    /// Epsilon for numerical stability.
    #[config(default = 1e-15)]
    pub epsilon: f32,

    /// Weight decay (L2 regularization).
    #[config(default = 0.0)]
    pub weight_decay: f32,

    /// Gradient norm clipping threshold (0 = no clipping).
    #[config(default = 0.0)]
    pub gradient_clip: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.learning_rate > 0.0) {
            return Err(format!("optimizer.learning_rate must be positive, got {}", self.learning_rate));
        }
        for (name, beta) in [("beta_1", self.beta_1), ("beta_2", self.beta_2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(format!("optimizer.{} must be in [0, 1), got {}", name, beta));
            }
        }
        if self.epsilon <= 0.0 {
            return Err("optimizer.epsilon must be positive".to_string());
        }
        if self.weight_decay < 0.0 || self.gradient_clip < 0.0 {
            return Err("optimizer.weight_decay and gradient_clip must not be negative".to_string());
        }
        Ok(())
    }

    /// Equivalent burn Adam configuration.
    pub fn adam(&self) -> AdamConfig {
        let mut adam = AdamConfig::new()
            .with_beta_1(self.beta_1)
            .with_beta_2(self.beta_2)
            .with_epsilon(self.epsilon);
        if self.weight_decay > 0.0 {
            adam = adam.with_weight_decay(Some(WeightDecayConfig::new(self.weight_decay)));
        }
        if self.gradient_clip > 0.0 {
            adam = adam.with_grad_clipping(Some(GradientClippingConfig::Norm(self.gradient_clip)));
        }
        adam
    }
}

/// Explicit gradient/update cycle over a module.
pub trait ManualOptimizer<M, B: AutodiffBackend> {
    /// Discard accumulated gradients.
    fn zero_grad(&mut self);

    /// Backpropagate `loss` and accumulate the gradients of `module`.
    fn backward(&mut self, loss: Tensor<B, 1>, module: &M);

    /// Apply accumulated gradients and return the updated module.
    fn step(&mut self, module: M) -> M;
}

/// [`ManualOptimizer`] over any burn [`Optimizer`].
pub struct BurnOptimizer<M, B, O>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B>,
{
    optim: O,
    accumulator: GradientsAccumulator<M>,
    learning_rate: f64,
    pending: usize,
    updates: usize,
    _backend: PhantomData<B>,
}

impl<M, B, O> BurnOptimizer<M, B, O>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B>,
{
    /// Wrap an optimizer with a fixed learning rate.
    pub fn new(optim: O, learning_rate: f64) -> Self {
        Self {
            optim,
            accumulator: GradientsAccumulator::new(),
            learning_rate,
            pending: 0,
            updates: 0,
            _backend: PhantomData,
        }
    }

    /// Learning rate used for every update.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Updates applied so far.
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl<M, B, O> ManualOptimizer<M, B> for BurnOptimizer<M, B, O>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
    O: Optimizer<M, B>,
{
    fn zero_grad(&mut self) {
        self.accumulator = GradientsAccumulator::new();
        self.pending = 0;
    }

    fn backward(&mut self, loss: Tensor<B, 1>, module: &M) {
        let grads = GradientsParams::from_grads(loss.backward(), module);
        self.accumulator.accumulate(module, grads);
        self.pending += 1;
    }

    fn step(&mut self, module: M) -> M {
        if self.pending == 0 {
            log::warn!("optimizer step without gradients; parameters unchanged");
            return module;
        }
        let grads = self.accumulator.grads();
        self.pending = 0;
        self.updates += 1;
        self.optim.step(self.learning_rate, module, grads)
    }
}

/// Adam over `M` as configured.
pub fn build_optimizer<B, M>(config: &OptimizerConfig) -> impl ManualOptimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    BurnOptimizer::new(config.adam().init::<B, M>(), config.learning_rate)
}
