//! Numeric columns: real-valued features passed through as-is.

use densefeat_core::value::{DenseValue, FeatureValue};
use serde::{Deserialize, Serialize};

use crate::cache::TransformationCache;
use crate::column::{expect_dense, ColumnConfig, DenseColumn, FeatureColumn};
use crate::error::{LayerError, LayerResult};
use crate::state::StateManager;
use crate::tensor::Tensor;

/// Element-wise transformation applied to numeric inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Normalizer {
    /// `x * factor`
    Scale { factor: f32 },
    /// `(x - mean) / stddev`
    Standardize { mean: f32, stddev: f32 },
    /// `ln(1 + x)`
    Log1p,
}

impl Normalizer {
    /// Applies the normalizer to one value.
    pub fn apply(&self, x: f32) -> f32 {
        match *self {
            Normalizer::Scale { factor } => x * factor,
            Normalizer::Standardize { mean, stddev } => (x - mean) / stddev,
            Normalizer::Log1p => x.ln_1p(),
        }
    }
}

/// Represents real-valued or numerical features.
///
/// The input under `key` must be a dense numeric tensor of shape
/// `[batch] + shape` (or `[batch]` when `shape == [1]`).
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    key: String,
    shape: Vec<usize>,
    normalizer: Option<Normalizer>,
}

/// Creates a numeric column of shape `[1]` reading `key`.
///
/// # Examples
///
/// ```
/// use densefeat_layers::column::{numeric_column, DenseColumn, FeatureColumn};
///
/// let price = numeric_column("price");
/// assert_eq!(price.name(), "price");
/// assert_eq!(price.variable_shape(), vec![1]);
/// ```
pub fn numeric_column(key: impl Into<String>) -> NumericColumn {
    NumericColumn {
        key: key.into(),
        shape: vec![1],
        normalizer: None,
    }
}

impl NumericColumn {
    /// Sets the per-example shape. Every dimension must be positive.
    pub fn with_shape(mut self, shape: &[usize]) -> LayerResult<Self> {
        if shape.is_empty() || shape.iter().any(|&d| d == 0) {
            return Err(LayerError::config(format!(
                "shape dimensions must be greater than 0. Given: {:?}",
                shape
            )));
        }
        self.shape = shape.to_vec();
        Ok(self)
    }

    /// Sets a normalizer applied after casting to `f32`.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Returns the input key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the per-example shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the normalizer, if any.
    pub fn normalizer(&self) -> Option<Normalizer> {
        self.normalizer
    }
}

impl FeatureColumn for NumericColumn {
    fn name(&self) -> &str {
        &self.key
    }

    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        _state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let dense = match cache.get_raw(&self.key)? {
            FeatureValue::Dense(dense) => dense,
            FeatureValue::Sparse(_) => {
                return Err(LayerError::InvalidFeature {
                    key: self.key.clone(),
                    message: "The corresponding Tensor of numerical column must be a Tensor. \
                              SparseTensor is not supported"
                        .to_string(),
                })
            }
        };
        if !dense.dtype().is_numeric() {
            return Err(LayerError::InvalidFeature {
                key: self.key.clone(),
                message: format!("numeric column requires numeric input, got {}", dense.dtype()),
            });
        }

        let mut tensor = Tensor::from_dense_value(&dense)?;
        if let Some(normalizer) = self.normalizer {
            tensor = tensor.map(|x| normalizer.apply(x));
        }
        Ok(FeatureValue::Dense(DenseValue::float32(
            tensor.shape(),
            tensor.data().to_vec(),
        )?))
    }

    fn as_dense(&self) -> Option<&dyn DenseColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::NumericColumn {
            key: self.key.clone(),
            shape: self.shape.clone(),
            normalizer: self.normalizer,
        })
    }
}

impl DenseColumn for NumericColumn {
    fn variable_shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn get_dense_tensor(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<Tensor> {
        let value = cache.get(self, state)?;
        expect_dense(&self.key, value)
    }
}
