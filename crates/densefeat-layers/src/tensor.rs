//! Tensor type for feature layer outputs.
//!
//! This module provides the dense `f32` tensor produced by dense columns and
//! concatenated by feature layers.

use densefeat_core::value::DenseValue;
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, LayerResult};

/// A multi-dimensional array of 32-bit floats.
///
/// Data is stored in row-major order; the first dimension is the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// The shape of the tensor (dimensions)
    shape: Vec<usize>,
    /// The underlying data in row-major order
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a new tensor with the given shape, filled with zeros.
    ///
    /// # Arguments
    ///
    /// * `shape` - The dimensions of the tensor
    ///
    /// # Example
    ///
    /// ```
    /// use densefeat_layers::tensor::Tensor;
    ///
    /// let t = Tensor::zeros(&[2, 3]);
    /// assert_eq!(t.shape(), &[2, 3]);
    /// assert_eq!(t.numel(), 6);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; numel],
        }
    }

    /// Creates a new tensor with the given shape, filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![1.0; numel],
        }
    }

    /// Creates a new tensor with the given shape and data.
    ///
    /// # Arguments
    ///
    /// * `shape` - The dimensions of the tensor
    /// * `data` - The data to fill the tensor with
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the shape
    pub fn from_data(shape: &[usize], data: Vec<f32>) -> Self {
        let numel: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            numel,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            numel
        );
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    /// Converts a raw dense value to `f32`, keeping its shape.
    ///
    /// Fails for string values.
    pub fn from_dense_value(value: &DenseValue) -> LayerResult<Self> {
        let data = value.values().to_f32()?;
        Ok(Self {
            shape: value.shape().to_vec(),
            data,
        })
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns the size of the first dimension, if the tensor has one.
    pub fn batch_size(&self) -> Option<usize> {
        self.shape.first().copied()
    }

    /// Returns a reference to the underlying data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns a mutable reference to the underlying data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns row `i` of a rank-2 tensor.
    pub fn row(&self, i: usize) -> &[f32] {
        let width = self.shape[1..].iter().product::<usize>();
        &self.data[i * width..(i + 1) * width]
    }

    /// Apply a function element-wise.
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32,
    {
        let data: Vec<f32> = self.data.iter().map(|&x| f(x)).collect();
        Tensor::from_data(&self.shape, data)
    }

    /// Reshape the tensor to a new shape.
    ///
    /// Fails if the new shape has a different number of elements.
    pub fn reshape(&self, new_shape: &[usize]) -> LayerResult<Tensor> {
        let new_numel: usize = new_shape.iter().product();
        if new_numel != self.numel() {
            return Err(LayerError::ShapeMismatch {
                expected: new_shape.to_vec(),
                actual: self.shape.clone(),
            });
        }
        Ok(Tensor::from_data(new_shape, self.data.clone()))
    }

    /// Concatenates rank-2 tensors along the last axis.
    ///
    /// All tensors must share the same number of rows.
    pub fn concat(tensors: &[Tensor]) -> LayerResult<Tensor> {
        let first = tensors.first().ok_or_else(|| LayerError::ConfigError {
            message: "Cannot concatenate an empty tensor list".to_string(),
        })?;
        let rows = first.shape.first().copied().unwrap_or(0);
        for t in tensors {
            if t.ndim() != 2 || t.shape[0] != rows {
                return Err(LayerError::ShapeMismatch {
                    expected: vec![rows, t.shape.get(1).copied().unwrap_or(0)],
                    actual: t.shape.clone(),
                });
            }
        }

        let width: usize = tensors.iter().map(|t| t.shape[1]).sum();
        let mut data = Vec::with_capacity(rows * width);
        for i in 0..rows {
            for t in tensors {
                data.extend_from_slice(t.row(i));
            }
        }
        Ok(Tensor::from_data(&[rows, width], data))
    }
}
