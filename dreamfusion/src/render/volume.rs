//! NeRF-style volume renderer over an implicit MLP field.

use burn::module::{Ignored, Module};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, softplus};
use lift3d_core::RandPair;

use super::{RenderOutput, Renderer};
use crate::config::{DensityActivation, VolumeRendererConfig};
use crate::data::CameraBatch;
use crate::error::{DreamFusionError, Result};
use crate::host::from_vec;
use crate::nn::{Mlp, MlpConfig, PositionEncoding};

/// Closest allowed near plane.
const MIN_NEAR: f32 = 1e-2;

/// Width of the field head: density + RGB.
const FIELD_OUTPUTS: usize = 4;

impl VolumeRendererConfig {
    /// Initialize the renderer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VolumeRenderer<B> {
        let encoding = PositionEncoding::new(self.num_bands, self.max_freq_log2, self.radius, device);
        let field = MlpConfig::new(encoding.output_dim(), FIELD_OUTPUTS)
            .with_hidden_dims(self.hidden_dims.clone())
            .init(device);

        VolumeRenderer {
            encoding,
            field,
            settings: Ignored(self.clone()),
        }
    }
}

/// Volume renderer with a Fourier-encoded MLP density/color field.
///
/// Rays are sampled at `num_samples_per_ray` evenly spaced depths between
/// the entry and exit of the bounding sphere (as seen from the camera
/// distance), offset by the jitter value of the randomness pair.
#[derive(Module, Debug)]
pub struct VolumeRenderer<B: Backend> {
    encoding: PositionEncoding<B>,
    field: Mlp<B>,
    settings: Ignored<VolumeRendererConfig>,
}

impl<B: Backend> VolumeRenderer<B> {
    /// Renderer settings.
    pub fn config(&self) -> &VolumeRendererConfig {
        &self.settings.0
    }

    /// Density and color at points.
    ///
    /// Input shape: [n, 3]
    /// Output shapes: ([n, 1], [n, 3])
    pub fn query(&self, points: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [n, _] = points.dims();
        let raw = self.field.forward(self.encoding.forward(points.clone()));

        let density = self.activate_density(raw.clone().slice([0..n, 0..1]), points);
        let rgb = sigmoid(raw.slice([0..n, 1..FIELD_OUTPUTS]));
        (density, rgb)
    }

    /// Density only, shape [n, 1].
    pub fn density(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.query(points).0
    }

    fn activate_density(&self, raw: Tensor<B, 2>, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let cfg = self.config();
        let mut x = raw + cfg.density_bias;

        if cfg.density_blob_scale > 0.0 {
            let std = cfg.density_blob_std;
            let r2 = points.powf_scalar(2.0).sum_dim(1);
            x = x + (r2 / (-2.0 * std * std)).exp() * cfg.density_blob_scale;
        }

        match cfg.density_activation {
            DensityActivation::Softplus => softplus(x, 1.0),
            DensityActivation::Exp => x.exp(),
        }
    }

    /// Unit normals `-∇σ / |∇σ|` by central differences.
    ///
    /// Input shape: [n, 3]
    /// Output shape: [n, 3]
    pub fn density_normals(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let eps = self.config().normal_epsilon;
        let device = points.device();
        let [n, _] = points.dims();

        let axes = [[eps, 0.0f32, 0.0], [0.0, eps, 0.0], [0.0, 0.0, eps]];
        let partials: Vec<Tensor<B, 2>> = axes
            .iter()
            .map(|row| {
                let offset = Tensor::<B, 2>::from_data([*row], &device).repeat_dim(0, n);
                let forward = self.density(points.clone() + offset.clone());
                let backward = self.density(points.clone() - offset);
                (forward - backward) / (2.0 * eps)
            })
            .collect();

        let grad = Tensor::cat(partials, 1);
        let norm = grad.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(1e-6);
        grad.neg() / norm.repeat_dim(1, 3)
    }

    fn background(&self, rand: Option<RandPair>) -> [f32; 3] {
        let cfg = self.config();
        match rand {
            Some(pair) if cfg.random_background => [pair.background(); 3],
            _ => cfg.background_color,
        }
    }
}

/// `[s, s]` matrix with ones strictly above the diagonal, so that
/// `x.matmul(m)[i] = sum_{j < i} x[j]`.
fn exclusive_prefix<B: Backend>(s: usize, device: &B::Device) -> Result<Tensor<B, 2>> {
    let values = (0..s * s)
        .map(|k| if k / s < k % s { 1.0 } else { 0.0 })
        .collect();
    from_vec(values, [s, s], device)
}

impl<B: Backend> Renderer<B> for VolumeRenderer<B> {
    fn render(&self, batch: &CameraBatch<B>, rand: Option<RandPair>) -> Result<RenderOutput<B>> {
        let cfg = self.config();
        let device = batch.rays_o.device();
        let [b, h, w, _] = batch.rays_o.dims();
        if batch.camera_distances.len() != b {
            return Err(DreamFusionError::ShapeMismatch {
                expected: vec![b],
                got: vec![batch.camera_distances.len()],
            });
        }

        let n = b * h * w;
        let s = cfg.num_samples_per_ray;
        let m = n * s;
        let jitter = rand.map(|pair| pair.jitter()).unwrap_or(0.5);

        let mut depths = Vec::with_capacity(m);
        let mut deltas = Vec::with_capacity(m);
        for &distance in &batch.camera_distances {
            let near = (distance - cfg.radius).max(MIN_NEAR);
            let far = (distance + cfg.radius).max(near + MIN_NEAR);
            let step = (far - near) / s as f32;
            for _ in 0..h * w {
                for i in 0..s {
                    depths.push(near + (i as f32 + jitter) * step);
                    deltas.push(step);
                }
            }
        }

        let t = from_vec(depths, [n, s, 1], &device)?.repeat_dim(2, 3);
        let delta = from_vec(deltas, [n, s], &device)?;
        let origins = batch.rays_o.clone().reshape([n, 1, 3]).repeat_dim(1, s);
        let dirs = batch.rays_d.clone().reshape([n, 1, 3]).repeat_dim(1, s);
        let points = (origins + dirs.clone() * t).reshape([m, 3]);

        let (density, rgb) = self.query(points.clone());

        // Optical depth per segment, alpha, and exclusive transmittance.
        let tau = density.reshape([n, s]) * delta;
        let alpha = tau.clone().neg().exp().neg() + 1.0;
        let transmittance = tau.matmul(exclusive_prefix(s, &device)?).neg().exp();
        let weights = transmittance * alpha;

        let weights_rgb = weights.clone().reshape([n, s, 1]).repeat_dim(2, 3);
        let color = (weights_rgb.clone() * rgb.reshape([n, s, 3]))
            .sum_dim(1)
            .reshape([n, 3]);
        let opacity = weights.clone().sum_dim(1);

        let background = Tensor::<B, 2>::from_data([self.background(rand)], &device).repeat_dim(0, n);
        let comp_rgb = color + (opacity.clone().neg() + 1.0).repeat_dim(1, 3) * background;

        let mut out = RenderOutput::new(comp_rgb.reshape([b, h, w, 3]), opacity.reshape([b, h, w, 1]));
        out.weights = Some(weights.reshape([m, 1]));
        out.t_dirs = Some(dirs.reshape([m, 3]));

        if cfg.compute_normals {
            let normal = self.density_normals(points);
            let shaded = (normal.clone().reshape([n, s, 3]) + 1.0) / 2.0;
            let comp_normal = (weights_rgb * shaded).sum_dim(1).reshape([b, h, w, 3]);
            out.normal = Some(normal);
            out.comp_normal = Some(comp_normal);
        }

        Ok(out)
    }
}
