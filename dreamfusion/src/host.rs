//! Host-side reads of small tensors.

use burn::prelude::*;

use crate::error::{DreamFusionError, Result};

/// Copy a tensor to a flat `Vec<f32>`.
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| DreamFusionError::InvalidData {
            message: format!("{:?}", e),
        })
}

/// Read the first element of a tensor.
pub fn to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<f32> {
    to_vec(tensor)?
        .first()
        .copied()
        .ok_or_else(|| DreamFusionError::InvalidData {
            message: "empty tensor".to_string(),
        })
}

/// Build a tensor from host values, checking the element count.
pub fn from_vec<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Result<Tensor<B, D>> {
    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(DreamFusionError::ShapeMismatch {
            expected: shape.to_vec(),
            got: vec![values.len()],
        });
    }
    Ok(Tensor::from_data(TensorData::new(values, shape), device))
}
