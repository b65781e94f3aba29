//! Layer trait and construction options.
//!
//! This module defines the [`Layer`] trait shared by feature layers and the
//! [`LayerOptions`] accepted when constructing one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LayerError, LayerResult};
use crate::state::Variable;

/// Pass-through keyword options recognised by layer constructors.
pub const ALLOWED_KWARGS: &[&str] = &[
    "dtype",
    "input_shape",
    "batch_input_shape",
    "batch_size",
    "dynamic",
    "autocast",
];

/// A named layer that owns variables.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use densefeat_layers::column::numeric_column;
/// use densefeat_layers::dense_features::DenseFeatures;
/// use densefeat_layers::layer::Layer;
///
/// let mut layer = DenseFeatures::new(vec![Arc::new(numeric_column("price"))]).unwrap();
/// assert!(layer.is_feature_layer());
/// assert!(layer.trainable());
///
/// layer.set_trainable(false);
/// assert!(layer.trainable_weights().is_empty());
/// ```
pub trait Layer: Send + Sync {
    /// Returns the unique name of the layer.
    fn name(&self) -> &str;

    /// Returns whether the layer's variables should be updated during training.
    fn trainable(&self) -> bool;

    /// Sets whether the layer's variables should be updated during training.
    fn set_trainable(&mut self, trainable: bool);

    /// Returns the variables optimizers may update.
    ///
    /// Empty whenever the layer itself is not trainable.
    fn trainable_weights(&self) -> Vec<&Variable>;

    /// Returns the variables optimizers must leave alone.
    fn non_trainable_weights(&self) -> Vec<&Variable>;

    /// Returns every variable, trainable ones first.
    fn weights(&self) -> Vec<&Variable> {
        let mut weights = self.trainable_weights();
        weights.extend(self.non_trainable_weights());
        weights
    }

    /// Returns whether the layer consumes a raw feature mapping.
    fn is_feature_layer(&self) -> bool {
        false
    }
}

/// Options shared by every layer constructor.
///
/// Unknown keyword options are rejected by [`LayerOptions::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOptions {
    /// Layer name. A unique one is generated when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether variables are trainable.
    #[serde(default = "default_trainable")]
    pub trainable: bool,
    /// Recognised pass-through options such as `dtype` or `input_shape`.
    #[serde(flatten)]
    pub kwargs: BTreeMap<String, Value>,
}

fn default_trainable() -> bool {
    true
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            name: None,
            trainable: default_trainable(),
            kwargs: BTreeMap::new(),
        }
    }
}

impl LayerOptions {
    /// Sets the layer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether variables are trainable.
    pub fn with_trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    /// Adds a pass-through keyword option.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Checks that every keyword option is recognised.
    ///
    /// Feature layers always produce `float32`, so any other `dtype` is rejected.
    pub fn validate(&self) -> LayerResult<()> {
        for (key, value) in &self.kwargs {
            if !ALLOWED_KWARGS.contains(&key.as_str()) {
                return Err(LayerError::config(format!(
                    "Keyword argument not understood: {}",
                    key
                )));
            }
            if key == "dtype" && value.as_str() != Some("float32") {
                return Err(LayerError::config(format!(
                    "Feature layers only produce float32 outputs. Given dtype: {}",
                    value
                )));
            }
        }
        Ok(())
    }
}
