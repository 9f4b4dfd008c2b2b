//! Score distillation sampling in pixel space.
//!
//! The denoiser is an analytic prior: each prompt embedding is projected to
//! a target color, and the noise prediction is the one that would denoise
//! the noisy latents back to that color. Classifier-free guidance mixes the
//! conditional and unconditional predictions as in latent diffusion.

use burn::prelude::*;
use lift3d_core::{fnv1a_str, hash_with_salt, BetaSchedule, NoiseSchedule};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Guidance, GuidanceFlags, GuidanceOutput};
use crate::config::SdsGuidanceConfig;
use crate::data::CameraBatch;
use crate::error::{DreamFusionError, Result};
use crate::host::from_vec;
use crate::prompt::PromptContext;

/// Noise and timesteps of the last fresh draw.
#[derive(Debug, Clone)]
struct LatentCache {
    shape: [usize; 4],
    timesteps: Vec<usize>,
    noise: Vec<f32>,
}

/// Score-distillation guidance.
#[derive(Debug)]
pub struct SdsGuidance<B: Backend> {
    config: SdsGuidanceConfig,
    schedule: NoiseSchedule,
    rng: StdRng,
    min_step: usize,
    max_step: usize,
    projection: Option<Tensor<B, 2>>,
    cache: Option<LatentCache>,
    device: B::Device,
}

impl<B: Backend> SdsGuidance<B> {
    /// Create guidance with its noise schedule.
    pub fn new(config: SdsGuidanceConfig, device: &B::Device) -> Result<Self> {
        config
            .validate()
            .map_err(|message| DreamFusionError::InvalidConfig { message })?;

        let schedule = NoiseSchedule::new(
            config.num_train_timesteps,
            config.beta_start as f64,
            config.beta_end as f64,
            BetaSchedule::ScaledLinear,
        )?;

        let mut guidance = Self {
            rng: StdRng::seed_from_u64(config.seed),
            schedule,
            min_step: 0,
            max_step: 0,
            projection: None,
            cache: None,
            device: device.clone(),
            config,
        };
        guidance.update_step(0, 0)?;

        log::info!(
            "SDS guidance: scale {}, timesteps {}..={} of {}",
            guidance.config.guidance_scale,
            guidance.min_step,
            guidance.max_step,
            guidance.schedule.num_train_timesteps()
        );
        Ok(guidance)
    }

    /// Guidance settings.
    pub fn config(&self) -> &SdsGuidanceConfig {
        &self.config
    }

    /// Current timestep bounds.
    pub fn step_bounds(&self) -> (usize, usize) {
        (self.min_step, self.max_step)
    }

    /// Timesteps of the cached latents, if any.
    pub fn cached_timesteps(&self) -> Option<&[usize]> {
        self.cache.as_ref().map(|c| c.timesteps.as_slice())
    }

    /// Reuse the cache when asked and the shape still matches, else redraw.
    fn latents_noise(&mut self, shape: [usize; 4], restore: bool) -> LatentCache {
        if restore {
            if let Some(cache) = &self.cache {
                if cache.shape == shape {
                    return cache.clone();
                }
                log::debug!("latent cache shape {:?} != {:?}, drawing fresh noise", cache.shape, shape);
            }
        }

        let numel: usize = shape.iter().product();
        let timesteps = (0..shape[0])
            .map(|_| {
                self.schedule
                    .sample_timestep(&mut self.rng, self.min_step, self.max_step)
            })
            .collect();
        let noise = standard_normal(&mut self.rng, numel);

        let cache = LatentCache {
            shape,
            timesteps,
            noise,
        };
        self.cache = Some(cache.clone());
        cache
    }

    /// Projection from embedding space to RGB, shape [dim, 3].
    fn projection(&mut self, dim: usize) -> Result<Tensor<B, 2>> {
        if let Some(p) = &self.projection {
            if p.dims()[0] == dim {
                return Ok(p.clone());
            }
        }

        let mut rng = StdRng::seed_from_u64(hash_with_salt(fnv1a_str("sds-projection"), self.config.seed));
        let scale = (3.0 / dim as f32).sqrt();
        let values = (0..dim * 3).map(|_| rng.gen_range(-1.0f32..1.0) * scale).collect();
        let p = from_vec(values, [dim, 3], &self.device)?;
        self.projection = Some(p.clone());
        Ok(p)
    }

    /// Target latent color per conditional and unconditional row: [2b, 3].
    fn target_colors(&mut self, embeddings: Tensor<B, 3>) -> Result<Tensor<B, 2>> {
        let [rows, tokens, dim] = embeddings.dims();
        let pooled = embeddings.sum_dim(1).reshape([rows, dim]) / tokens as f32;
        Ok(pooled.matmul(self.projection(dim)?).tanh())
    }

    fn scalar(&self, value: f32) -> Result<Tensor<B, 1>> {
        from_vec(vec![value], [1], &self.device)
    }
}

impl<B: Backend> Guidance<B> for SdsGuidance<B> {
    fn compute_guidance(
        &mut self,
        rgb: Tensor<B, 4>,
        prompt: &PromptContext<B>,
        batch: &CameraBatch<B>,
        flags: GuidanceFlags,
    ) -> Result<GuidanceOutput<B>> {
        let [b, h, w, c] = rgb.dims();
        if c != 3 {
            return Err(DreamFusionError::ShapeMismatch {
                expected: vec![b, h, w, 3],
                got: vec![b, h, w, c],
            });
        }
        if batch.batch_size() != b {
            return Err(DreamFusionError::ShapeMismatch {
                expected: vec![batch.batch_size()],
                got: vec![b],
            });
        }

        let latents = rgb.permute([0, 3, 1, 2]);
        let latents = if flags.rgb_as_latents {
            latents
        } else {
            latents.mul_scalar(2.0).sub_scalar(1.0)
        };
        let shape = [b, c, h, w];
        let per_item = c * h * w;

        let draw = self.latents_noise(shape, flags.restore_latents);
        let mut sqrt_alpha = Vec::with_capacity(b * per_item);
        let mut sqrt_one_minus = Vec::with_capacity(b * per_item);
        let mut weight = Vec::with_capacity(b * per_item);
        for &t in &draw.timesteps {
            let alpha = self.schedule.alpha_cumprod(t);
            sqrt_alpha.extend(std::iter::repeat(alpha.sqrt()).take(per_item));
            sqrt_one_minus.extend(std::iter::repeat((1.0 - alpha).sqrt()).take(per_item));
            weight.extend(std::iter::repeat(self.schedule.sds_weight(t)).take(per_item));
        }
        let sqrt_alpha = from_vec(sqrt_alpha, shape, &self.device)?;
        let sqrt_one_minus = from_vec(sqrt_one_minus, shape, &self.device)?;
        let weight = from_vec(weight, shape, &self.device)?;
        let noise = from_vec(draw.noise, shape, &self.device)?;

        let noisy = latents.clone().detach() * sqrt_alpha.clone() + noise.clone() * sqrt_one_minus.clone();

        let colors = self.target_colors(prompt.text_embeddings_for(batch)?)?;
        let to_image = |rows: Tensor<B, 2>| rows.reshape([b, c, 1, 1]).repeat_dim(2, h).repeat_dim(3, w);
        let cond = to_image(colors.clone().slice([0..b, 0..c]));
        let uncond = to_image(colors.slice([b..2 * b, 0..c]));

        let predict = |target: Tensor<B, 4>| (noisy.clone() - target * sqrt_alpha.clone()) / sqrt_one_minus.clone();
        let noise_pred_uncond = predict(uncond);
        let noise_pred_cond = predict(cond);
        let noise_pred = noise_pred_uncond.clone()
            + (noise_pred_cond - noise_pred_uncond).mul_scalar(self.config.guidance_scale);

        let mut grad = (noise_pred - noise) * weight;
        grad = grad.clone().mask_fill(grad.is_nan(), 0.0);
        if let Some(clip) = self.config.grad_clip {
            grad = grad.clamp(-clip, clip);
        }

        let target = (latents.clone() - grad.clone()).detach();
        let loss_sds = (latents - target).powf_scalar(2.0).sum().mul_scalar(0.5 / b as f32);
        let grad_norm = grad.powf_scalar(2.0).sum().sqrt();

        Ok(GuidanceOutput::new()
            .with("loss_sds", loss_sds)
            .with("grad_norm", grad_norm)
            .with("min_step", self.scalar(self.min_step as f32)?)
            .with("max_step", self.scalar(self.max_step as f32)?))
    }

    fn update_step(&mut self, epoch: usize, global_step: usize) -> Result<()> {
        let min_percent = self.config.min_step_percent.resolve(epoch, global_step)?;
        let max_percent = self.config.max_step_percent.resolve(epoch, global_step)?;
        let (min_step, max_step) = self.schedule.step_range(min_percent, max_percent);
        self.min_step = min_step;
        self.max_step = max_step;
        Ok(())
    }
}

/// Standard normal samples by the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(n + 1);
    while out.len() < n {
        let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
        let u2: f32 = rng.gen();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f32::consts::PI * u2;
        out.push(r * theta.cos());
        out.push(r * theta.sin());
    }
    out.truncate(n);
    out
}
