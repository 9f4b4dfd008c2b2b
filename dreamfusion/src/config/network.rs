//! Renderer configuration types.

use burn::config::Config;
use serde::{Deserialize, Serialize};

/// Activation turning raw field output into volume density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityActivation {
    /// `softplus(x)`, smooth and never negative.
    Softplus,
    /// `exp(x)`.
    Exp,
}

/// Configuration for the volume renderer and its implicit field.
#[derive(Config, Debug)]
pub struct VolumeRendererConfig {
    /// Radius of the bounding sphere around the origin.
    #[config(default = 1.0)]
    pub radius: f32,

    /// Samples along each ray.
    #[config(default = 32)]
    pub num_samples_per_ray: usize,

    /// Fourier bands of the positional encoding.
    #[config(default = 6)]
    pub num_bands: usize,

    /// log2 of the highest band frequency.
    #[config(default = 5.0)]
    pub max_freq_log2: f32,

    /// Hidden widths of the field MLP.
    #[config(default = "vec![64, 64]")]
    pub hidden_dims: Vec<usize>,

    /// Density activation.
    #[config(default = "DensityActivation::Softplus")]
    pub density_activation: DensityActivation,

    /// Constant added to the raw density before activation.
    #[config(default = "-1.0")]
    pub density_bias: f32,

    /// Peak of the Gaussian density blob at the origin (0 disables it).
    #[config(default = 10.0)]
    pub density_blob_scale: f32,

    /// Standard deviation of the density blob.
    #[config(default = 0.5)]
    pub density_blob_std: f32,

    /// Use a random gray background when randomness is supplied.
    #[config(default = true)]
    pub random_background: bool,

    /// Background color otherwise.
    #[config(default = "[1.0, 1.0, 1.0]")]
    pub background_color: [f32; 3],

    /// Compute normals from the density gradient.
    #[config(default = true)]
    pub compute_normals: bool,

    /// Step for finite-difference normals.
    #[config(default = 0.01)]
    pub normal_epsilon: f32,
}

impl Default for VolumeRendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeRendererConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.radius <= 0.0 {
            return Err("renderer.radius must be positive".to_string());
        }
        if self.num_samples_per_ray == 0 {
            return Err("renderer.num_samples_per_ray must be positive".to_string());
        }
        if self.density_blob_std <= 0.0 {
            return Err("renderer.density_blob_std must be positive".to_string());
        }
        if self.compute_normals && self.normal_epsilon <= 0.0 {
            return Err("renderer.normal_epsilon must be positive".to_string());
        }
        Ok(())
    }
}
