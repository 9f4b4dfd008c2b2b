//! Diffusion noise schedules.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// How the per-timestep beta values are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaSchedule {
    /// Betas evenly spaced between start and end.
    Linear,
    /// Square roots of betas evenly spaced (latent diffusion default).
    ScaledLinear,
}

/// Precomputed cumulative alpha products of a discrete diffusion process.
#[derive(Debug, Clone)]
pub struct NoiseSchedule {
    alphas_cumprod: Vec<f32>,
}

impl NoiseSchedule {
    /// Build a schedule with `num_train_timesteps` steps.
    pub fn new(
        num_train_timesteps: usize,
        beta_start: f64,
        beta_end: f64,
        kind: BetaSchedule,
    ) -> Result<Self> {
        if num_train_timesteps < 2 {
            return Err(CoreError::InvalidParameter {
                message: format!(
                    "num_train_timesteps must be at least 2, got {}",
                    num_train_timesteps
                ),
            });
        }
        if !(0.0 < beta_start && beta_start <= beta_end && beta_end < 1.0) {
            return Err(CoreError::InvalidParameter {
                message: format!("betas must satisfy 0 < {} <= {} < 1", beta_start, beta_end),
            });
        }

        Ok(Self::build(num_train_timesteps, beta_start, beta_end, kind))
    }

    /// The schedule used by Stable Diffusion: 1000 scaled-linear steps.
    pub fn stable_diffusion() -> Self {
        Self::build(1000, 0.00085, 0.012, BetaSchedule::ScaledLinear)
    }

    fn build(num_train_timesteps: usize, beta_start: f64, beta_end: f64, kind: BetaSchedule) -> Self {
        let last = (num_train_timesteps - 1) as f64;
        let mut alphas_cumprod = Vec::with_capacity(num_train_timesteps);
        let mut running = 1.0f64;
        for i in 0..num_train_timesteps {
            let t = i as f64 / last;
            let beta = match kind {
                BetaSchedule::Linear => beta_start + (beta_end - beta_start) * t,
                BetaSchedule::ScaledLinear => {
                    let s = beta_start.sqrt() + (beta_end.sqrt() - beta_start.sqrt()) * t;
                    s * s
                }
            };
            running *= 1.0 - beta;
            alphas_cumprod.push(running as f32);
        }

        Self { alphas_cumprod }
    }

    /// Number of training timesteps.
    pub fn num_train_timesteps(&self) -> usize {
        self.alphas_cumprod.len()
    }

    /// Cumulative alpha product at timestep `t` (clamped to the last step).
    pub fn alpha_cumprod(&self, t: usize) -> f32 {
        let idx = t.min(self.alphas_cumprod.len() - 1);
        self.alphas_cumprod[idx]
    }

    /// Score-distillation weight `1 - ᾱ_t`.
    pub fn sds_weight(&self, t: usize) -> f32 {
        1.0 - self.alpha_cumprod(t)
    }

    /// Timestep bounds for the given fractions of the schedule.
    ///
    /// Fractions are clamped to `[0, 1]`; the upper bound is never below the
    /// lower one.
    pub fn step_range(&self, min_percent: f32, max_percent: f32) -> (usize, usize) {
        let n = self.num_train_timesteps() as f32;
        let last = self.num_train_timesteps() - 1;
        let min_step = ((n * min_percent.clamp(0.0, 1.0)) as usize).min(last);
        let max_step = ((n * max_percent.clamp(0.0, 1.0)) as usize).min(last);
        (min_step, max_step.max(min_step))
    }

    /// Sample a timestep uniformly from `min_step..=max_step`.
    pub fn sample_timestep<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min_step: usize,
        max_step: usize,
    ) -> usize {
        let hi = max_step.min(self.num_train_timesteps() - 1);
        let lo = min_step.min(hi);
        rng.gen_range(lo..=hi)
    }
}
