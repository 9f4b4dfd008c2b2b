//! Fully connected layers for implicit fields.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Configuration for a ReLU MLP.
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension.
    pub output_dim: usize,
    /// Hidden layer widths.
    #[config(default = "vec![64, 64]")]
    pub hidden_dims: Vec<usize>,
}

impl MlpConfig {
    /// Initialize the MLP.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let mut hidden = Vec::with_capacity(self.hidden_dims.len());
        let mut in_dim = self.input_dim;
        for &out_dim in &self.hidden_dims {
            hidden.push(LinearConfig::new(in_dim, out_dim).init(device));
            in_dim = out_dim;
        }

        Mlp {
            hidden,
            output: LinearConfig::new(in_dim, self.output_dim).init(device),
            activation: Relu::new(),
        }
    }
}

/// ReLU MLP with a linear head; the caller applies output activations.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Mlp<B> {
    /// Input shape: [batch, input_dim]
    /// Output shape: [batch, output_dim]
    pub fn forward(&self, mut x: Tensor<B, 2>) -> Tensor<B, 2> {
        for layer in &self.hidden {
            x = self.activation.forward(layer.forward(x));
        }
        self.output.forward(x)
    }

    /// Width of the output layer.
    pub fn output_dim(&self) -> usize {
        self.output.weight.dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_mlp_shapes() {
        let device = Default::default();
        let mlp = MlpConfig::new(9, 4)
            .with_hidden_dims(vec![16, 8])
            .init::<TestBackend>(&device);

        let out = mlp.forward(Tensor::zeros([5, 9], &device));
        assert_eq!(out.dims(), [5, 4]);
        assert_eq!(mlp.output_dim(), 4);
    }

    #[test]
    fn test_mlp_without_hidden_layers() {
        let device = Default::default();
        let mlp = MlpConfig::new(3, 2)
            .with_hidden_dims(vec![])
            .init::<TestBackend>(&device);
        assert_eq!(mlp.forward(Tensor::ones([2, 3], &device)).dims(), [2, 2]);
    }
}
