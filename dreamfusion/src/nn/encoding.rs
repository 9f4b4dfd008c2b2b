//! Fourier positional encoding of scene coordinates.

use burn::module::Module;
use burn::prelude::*;

/// Sinusoidal encoding of points inside a bounding sphere.
///
/// Points are divided by `radius` first so the lowest band spans the scene
/// once regardless of its size.
#[derive(Module, Debug)]
pub struct PositionEncoding<B: Backend> {
    frequencies: Tensor<B, 1>,
    radius: f32,
}

impl<B: Backend> PositionEncoding<B> {
    /// Bands at `π · 2^k` for `k` evenly spaced in `[0, max_freq_log2]`.
    pub fn new(num_bands: usize, max_freq_log2: f32, radius: f32, device: &B::Device) -> Self {
        let frequencies: Vec<f32> = (0..num_bands)
            .map(|i| {
                let t = i as f32 / (num_bands.max(2) - 1) as f32;
                (t * max_freq_log2).exp2() * std::f32::consts::PI
            })
            .collect();

        Self {
            frequencies: Tensor::from_data(TensorData::new(frequencies, [num_bands]), device),
            radius: radius.max(f32::EPSILON),
        }
    }

    /// Input shape: [n, 3]
    /// Output shape: [n, 3 + 6 * num_bands]
    pub fn forward(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, dim] = points.dims();
        let bands = self.num_bands();
        let x = points / self.radius;

        let scaled = x.clone().reshape([n, dim, 1]) * self.frequencies.clone().reshape([1, 1, bands]);
        let features = Tensor::cat(vec![scaled.clone().sin(), scaled.cos()], 2)
            .reshape([n, dim * bands * 2]);

        Tensor::cat(vec![x, features], 1)
    }

    /// Number of frequency bands.
    pub fn num_bands(&self) -> usize {
        self.frequencies.dims()[0]
    }

    /// Encoded width for 3D input.
    pub fn output_dim(&self) -> usize {
        3 + 6 * self.num_bands()
    }
}
