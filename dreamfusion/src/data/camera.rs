//! Camera batches for training and evaluation.
//!
//! A batch holds per-pixel rays on the device plus the host-side camera
//! angles that prompt processors use to pick view-dependent prompts.

use burn::prelude::*;
use lift3d_core::{orbit_views, CameraView};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::CameraSamplerConfig;
use crate::error::{DreamFusionError, Result};
use crate::host::from_vec;

/// Rays and camera parameters for a batch of views.
#[derive(Debug, Clone)]
pub struct CameraBatch<B: Backend> {
    /// Ray origins, shape [batch, height, width, 3].
    pub rays_o: Tensor<B, 4>,
    /// Normalized ray directions, shape [batch, height, width, 3].
    pub rays_d: Tensor<B, 4>,
    /// Camera centers, shape [batch, 3].
    pub camera_positions: Tensor<B, 2>,
    /// Elevation per view in degrees.
    pub elevation_deg: Vec<f32>,
    /// Azimuth per view in degrees.
    pub azimuth_deg: Vec<f32>,
    /// Distance from the origin per view.
    pub camera_distances: Vec<f32>,
    /// Image height.
    pub height: usize,
    /// Image width.
    pub width: usize,
    /// Index of each view, used for output file names.
    pub index: Vec<usize>,
}

impl<B: Backend> CameraBatch<B> {
    /// Build a batch from views at the given resolution.
    pub fn from_views(
        views: &[CameraView],
        height: usize,
        width: usize,
        index: Vec<usize>,
        device: &B::Device,
    ) -> Result<Self> {
        if views.is_empty() {
            return Err(DreamFusionError::InvalidConfig {
                message: "camera batch needs at least one view".to_string(),
            });
        }
        if index.len() != views.len() {
            return Err(DreamFusionError::ShapeMismatch {
                expected: vec![views.len()],
                got: vec![index.len()],
            });
        }

        let batch = views.len();
        let pixels = height * width;
        let mut origins = Vec::with_capacity(batch * pixels * 3);
        let mut directions = Vec::with_capacity(batch * pixels * 3);
        let mut positions = Vec::with_capacity(batch * 3);

        for view in views {
            let position = view.pose().position;
            positions.extend_from_slice(&position.as_array());
            for dir in view.ray_directions(width, height) {
                origins.extend_from_slice(&position.as_array());
                directions.extend_from_slice(&dir.as_array());
            }
        }

        Ok(Self {
            rays_o: from_vec(origins, [batch, height, width, 3], device)?,
            rays_d: from_vec(directions, [batch, height, width, 3], device)?,
            camera_positions: from_vec(positions, [batch, 3], device)?,
            elevation_deg: views.iter().map(|v| v.elevation_deg).collect(),
            azimuth_deg: views.iter().map(|v| v.azimuth_deg).collect(),
            camera_distances: views.iter().map(|v| v.distance).collect(),
            height,
            width,
            index,
        })
    }

    /// Number of views.
    pub fn batch_size(&self) -> usize {
        self.index.len()
    }

    /// Rays per batch.
    pub fn num_rays(&self) -> usize {
        self.batch_size() * self.height * self.width
    }
}

/// Random training views.
#[derive(Debug)]
pub struct CameraSampler {
    config: CameraSamplerConfig,
    rng: StdRng,
    batches_drawn: usize,
}

impl CameraSampler {
    /// Create a sampler; the config is validated here.
    pub fn new(config: CameraSamplerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|message| DreamFusionError::InvalidConfig { message })?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            rng,
            batches_drawn: 0,
        })
    }

    /// The sampler configuration.
    pub fn config(&self) -> &CameraSamplerConfig {
        &self.config
    }

    /// Draw one training batch.
    pub fn sample<B: Backend>(&mut self, device: &B::Device) -> Result<CameraBatch<B>> {
        let views: Vec<CameraView> = (0..self.config.batch_size)
            .map(|_| self.config.ranges.sample_view(&mut self.rng))
            .collect();
        let start = self.batches_drawn * self.config.batch_size;
        let index = (start..start + views.len()).collect();
        self.batches_drawn += 1;

        CameraBatch::from_views(&views, self.config.height, self.config.width, index, device)
    }

    /// Single-view batches orbiting the object for validation.
    pub fn validation_cameras<B: Backend>(&self, device: &B::Device) -> Result<Vec<CameraBatch<B>>> {
        orbit_cameras(&self.config, self.config.n_val_views, device)
    }

    /// Single-view batches orbiting the object for the test video.
    pub fn test_cameras<B: Backend>(&self, device: &B::Device) -> Result<Vec<CameraBatch<B>>> {
        orbit_cameras(&self.config, self.config.n_test_views, device)
    }
}

/// `n_views` single-view batches evenly spaced in azimuth at the evaluation
/// elevation and distance. Batch `i` has `index == [i]`.
pub fn orbit_cameras<B: Backend>(
    config: &CameraSamplerConfig,
    n_views: usize,
    device: &B::Device,
) -> Result<Vec<CameraBatch<B>>> {
    orbit_views(
        n_views,
        config.eval_elevation_deg,
        config.eval_camera_distance,
        config.eval_fovy_deg,
    )
    .iter()
    .enumerate()
    .map(|(i, view)| {
        CameraBatch::from_views(
            std::slice::from_ref(view),
            config.eval_height,
            config.eval_width,
            vec![i],
            device,
        )
    })
    .collect()
}
