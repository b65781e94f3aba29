//! Variable state owned by a feature layer.
//!
//! Columns that need learned parameters (for example embedding tables) create
//! them through the layer's [`StateManager`] when the layer is built, and read
//! them back while producing tensors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LayerError, LayerResult};
use crate::initializer::Initializer;
use crate::tensor::Tensor;

/// A named, possibly trainable parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    value: Tensor,
    trainable: bool,
}

impl Variable {
    /// Returns the fully qualified name (`layer/column/variable`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current value.
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    /// Returns whether optimizers may update this variable.
    pub fn trainable(&self) -> bool {
        self.trainable
    }
}

/// Creates and stores the variables of every column in a layer.
///
/// Variables are keyed by column name, then by variable name.
#[derive(Debug, Clone)]
pub struct StateManager {
    layer_name: String,
    trainable: bool,
    variables: BTreeMap<String, BTreeMap<String, Variable>>,
}

impl StateManager {
    /// Creates an empty state manager for the named layer.
    pub fn new(layer_name: impl Into<String>, trainable: bool) -> Self {
        Self {
            layer_name: layer_name.into(),
            trainable,
            variables: BTreeMap::new(),
        }
    }

    /// Returns the name of the owning layer.
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Returns whether the owning layer is trainable.
    pub fn layer_trainable(&self) -> bool {
        self.trainable
    }

    /// Creates a variable for `column`.
    ///
    /// The variable is trainable only if both the layer and the request are.
    pub fn create_variable(
        &mut self,
        column: &str,
        name: &str,
        shape: &[usize],
        initializer: &Initializer,
        trainable: bool,
    ) -> LayerResult<&Variable> {
        let value = initializer.initialize(shape)?;
        let full_name = format!("{}/{}/{}", self.layer_name, column, name);
        let trainable = self.trainable && trainable;

        let column_vars = self.variables.entry(column.to_string()).or_default();
        if column_vars.contains_key(name) {
            return Err(LayerError::VariableExists {
                column: column.to_string(),
                name: name.to_string(),
            });
        }

        tracing::debug!(variable = %full_name, shape = ?shape, trainable, "Creating variable");
        Ok(column_vars.entry(name.to_string()).or_insert(Variable {
            name: full_name,
            value,
            trainable,
        }))
    }

    /// Returns a previously created variable.
    pub fn get_variable(&self, column: &str, name: &str) -> LayerResult<&Variable> {
        self.variables
            .get(column)
            .and_then(|vars| vars.get(name))
            .ok_or_else(|| LayerError::VariableNotFound {
                column: column.to_string(),
                name: name.to_string(),
            })
    }

    /// Replaces the value of an existing variable.
    ///
    /// The new value must have the variable's shape.
    pub fn assign(&mut self, column: &str, name: &str, value: Tensor) -> LayerResult<()> {
        let var = self
            .variables
            .get_mut(column)
            .and_then(|vars| vars.get_mut(name))
            .ok_or_else(|| LayerError::VariableNotFound {
                column: column.to_string(),
                name: name.to_string(),
            })?;
        if var.value.shape() != value.shape() {
            return Err(LayerError::ShapeMismatch {
                expected: var.value.shape().to_vec(),
                actual: value.shape().to_vec(),
            });
        }
        var.value = value;
        Ok(())
    }

    /// Iterates over every variable, ordered by column then name.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values().flat_map(|vars| vars.values())
    }

    /// Returns the trainable variables.
    pub fn trainable_variables(&self) -> Vec<&Variable> {
        self.variables().filter(|v| v.trainable).collect()
    }

    /// Returns the non-trainable variables.
    pub fn non_trainable_variables(&self) -> Vec<&Variable> {
        self.variables().filter(|v| !v.trainable).collect()
    }
}
