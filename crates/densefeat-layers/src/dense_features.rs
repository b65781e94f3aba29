//! The `DenseFeatures` input layer.
//!
//! [`DenseFeatures`] turns a mapping of raw features into one dense `f32`
//! matrix by asking each of its dense columns for a tensor and concatenating
//! the results in column order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use densefeat_core::value::{DenseValue, Features};
//! use densefeat_layers::column::{numeric_column, ColumnRef};
//! use densefeat_layers::dense_features::DenseFeatures;
//!
//! let columns: Vec<ColumnRef> = vec![
//!     Arc::new(numeric_column("price")),
//!     Arc::new(numeric_column("size").with_shape(&[2]).unwrap()),
//! ];
//! let layer = DenseFeatures::new(columns).unwrap();
//!
//! let features = Features::new()
//!     .with("price", DenseValue::float64(&[2], vec![1.0, 2.0]).unwrap())
//!     .with("size", DenseValue::float32(&[2, 2], vec![3.0, 4.0, 5.0, 6.0]).unwrap());
//! let out = layer.call(&features, None).unwrap();
//! assert_eq!(out.shape(), &[2, 3]);
//! assert_eq!(out.data(), &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
//! ```

use std::collections::HashMap;

use densefeat_core::naming::to_snake_case;
use densefeat_core::value::{DenseValue, FeatureValue, Features};
use serde::{Deserialize, Serialize};

use crate::cache::TransformationCache;
use crate::column::{ColumnConfig, ColumnRef, DenseColumn, FeatureColumn};
use crate::error::{LayerError, LayerResult};
use crate::features_layer::{BaseFeaturesLayer, ColumnKind};
use crate::layer::{Layer, LayerOptions};
use crate::state::{StateManager, Variable};
use crate::tensor::Tensor;

/// Per-column output tensors, keyed by column name.
pub type ColumnTensors = HashMap<String, Tensor>;

/// Anything a caller may hand to [`DenseFeatures::call`].
///
/// Only [`LayerInput::Features`] is accepted; the other variants exist so
/// that passing a bare value fails with [`LayerError::InvalidInput`].
#[derive(Debug, Clone, Copy)]
pub enum LayerInput<'a> {
    /// A mapping from feature key to raw value.
    Features(&'a Features),
    /// A single raw feature.
    Feature(&'a FeatureValue),
    /// A single dense raw value.
    Raw(&'a DenseValue),
    /// An already dense tensor.
    Tensor(&'a Tensor),
}

impl LayerInput<'_> {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            LayerInput::Features(f) => format!("feature mapping with {} keys", f.len()),
            LayerInput::Feature(v) => v.describe(),
            LayerInput::Raw(v) => format!("dense {} tensor of shape {:?}", v.dtype(), v.shape()),
            LayerInput::Tensor(t) => format!("float32 tensor of shape {:?}", t.shape()),
        }
    }
}

impl<'a> From<&'a Features> for LayerInput<'a> {
    fn from(features: &'a Features) -> Self {
        LayerInput::Features(features)
    }
}

impl<'a> From<&'a FeatureValue> for LayerInput<'a> {
    fn from(value: &'a FeatureValue) -> Self {
        LayerInput::Feature(value)
    }
}

impl<'a> From<&'a DenseValue> for LayerInput<'a> {
    fn from(value: &'a DenseValue) -> Self {
        LayerInput::Raw(value)
    }
}

impl<'a> From<&'a Tensor> for LayerInput<'a> {
    fn from(tensor: &'a Tensor) -> Self {
        LayerInput::Tensor(tensor)
    }
}

/// Serializable description of a [`DenseFeatures`] layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseFeaturesConfig {
    /// Name, trainability and pass-through options.
    #[serde(flatten)]
    pub options: LayerOptions,
    /// Column descriptions, in layer order.
    pub feature_columns: Vec<ColumnConfig>,
}

/// A layer that produces a dense tensor from feature columns.
///
/// Every column must be a [`DenseColumn`]. Categorical columns have to be
/// wrapped in an embedding or indicator column first.
#[derive(Debug)]
pub struct DenseFeatures {
    base: BaseFeaturesLayer,
}

impl DenseFeatures {
    /// Creates a trainable layer with a generated name.
    pub fn new(columns: Vec<ColumnRef>) -> LayerResult<Self> {
        Self::with_options(columns, LayerOptions::default())
    }

    /// Creates a layer with explicit options.
    pub fn with_options(columns: Vec<ColumnRef>, options: LayerOptions) -> LayerResult<Self> {
        let base = BaseFeaturesLayer::new(
            columns,
            ColumnKind::Dense,
            &to_snake_case("DenseFeatures"),
            options,
        )?;
        Ok(Self { base })
    }

    /// Produces the dense `(batch, output_dim)` tensor for `input`.
    ///
    /// When `cols_to_output_tensors` is given, each column's tensor (after
    /// flattening) is stored in it under the column's name.
    pub fn call<'a>(
        &self,
        input: impl Into<LayerInput<'a>>,
        mut cols_to_output_tensors: Option<&mut ColumnTensors>,
    ) -> LayerResult<Tensor> {
        let features = match input.into() {
            LayerInput::Features(features) => features,
            other => {
                return Err(LayerError::InvalidInput {
                    got: other.describe(),
                })
            }
        };

        let state = self.base.state();
        let mut cache = TransformationCache::new(features);
        let mut output_tensors = Vec::with_capacity(self.base.columns().len());
        for column in self.base.columns() {
            let dense = dense_column(column.as_ref())?;
            let tensor = dense.get_dense_tensor(&mut cache, state)?;
            let processed = self.base.process_dense_tensor(dense, tensor)?;
            if let Some(outputs) = cols_to_output_tensors.as_deref_mut() {
                outputs.insert(column.name().to_string(), processed.clone());
            }
            output_tensors.push(processed);
        }

        tracing::trace!(
            layer = %self.base.name(),
            transformed = cache.num_transformed(),
            "Computed dense features"
        );
        self.base.verify_and_concat(&output_tensors)
    }

    /// Returns the columns in layer order.
    pub fn feature_columns(&self) -> &[ColumnRef] {
        self.base.columns()
    }

    /// Returns the total output width.
    pub fn output_dim(&self) -> usize {
        self.base
            .columns()
            .iter()
            .filter_map(|c| c.as_dense())
            .map(|c| c.num_elements())
            .sum()
    }

    /// Returns `(batch_size, output_dim)`.
    pub fn compute_output_shape(&self, batch_size: Option<usize>) -> (Option<usize>, usize) {
        (batch_size, self.output_dim())
    }

    /// Returns the variable state.
    pub fn state(&self) -> &StateManager {
        self.base.state()
    }

    /// Returns the variable state for in-place updates.
    pub fn state_mut(&mut self) -> &mut StateManager {
        self.base.state_mut()
    }

    /// Describes the layer so it can be rebuilt with [`DenseFeatures::from_config`].
    ///
    /// Variable values are not included.
    pub fn get_config(&self) -> LayerResult<DenseFeaturesConfig> {
        let feature_columns = self
            .base
            .columns()
            .iter()
            .map(|c| c.to_config())
            .collect::<LayerResult<Vec<_>>>()?;
        Ok(DenseFeaturesConfig {
            options: LayerOptions::default()
                .with_name(self.base.name())
                .with_trainable(self.base.trainable()),
            feature_columns,
        })
    }

    /// Builds a layer from a configuration.
    ///
    /// The configured name is reused as is, so the rebuilt layer's variables
    /// carry the same names as those of the described layer.
    pub fn from_config(config: DenseFeaturesConfig) -> LayerResult<Self> {
        let columns = config
            .feature_columns
            .iter()
            .map(ColumnConfig::build)
            .collect::<LayerResult<Vec<_>>>()?;
        Self::with_options(columns, config.options)
    }
}

fn dense_column(column: &dyn FeatureColumn) -> LayerResult<&dyn DenseColumn> {
    column.as_dense().ok_or_else(|| LayerError::InvalidColumn {
        column: column.name().to_string(),
        column_type: column.column_type().to_string(),
        expected: "DenseColumn".to_string(),
    })
}

impl Layer for DenseFeatures {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn trainable(&self) -> bool {
        self.base.trainable()
    }

    fn set_trainable(&mut self, trainable: bool) {
        self.base.set_trainable(trainable);
    }

    fn trainable_weights(&self) -> Vec<&Variable> {
        self.base.trainable_weights()
    }

    fn non_trainable_weights(&self) -> Vec<&Variable> {
        self.base.non_trainable_weights()
    }

    fn is_feature_layer(&self) -> bool {
        true
    }
}
