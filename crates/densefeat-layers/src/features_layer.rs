//! Shared machinery for layers built from feature columns.
//!
//! [`BaseFeaturesLayer`] validates the column list, owns the variable state
//! the columns create, and provides the reshape and concatenation steps that
//! concrete feature layers apply to per-column tensors.

use std::collections::HashSet;

use densefeat_core::naming::unique_name;

use crate::column::{ColumnRef, DenseColumn, FeatureColumn};
use crate::error::{LayerError, LayerResult};
use crate::layer::LayerOptions;
use crate::state::{StateManager, Variable};
use crate::tensor::Tensor;

/// Capability every column of a layer must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Columns that produce dense tensors.
    Dense,
    /// Columns that produce categorical ids.
    Categorical,
}

impl ColumnKind {
    fn accepts(self, column: &dyn FeatureColumn) -> bool {
        match self {
            ColumnKind::Dense => column.as_dense().is_some(),
            ColumnKind::Categorical => column.as_categorical().is_some(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ColumnKind::Dense => "DenseColumn",
            ColumnKind::Categorical => "CategoricalColumn",
        }
    }
}

/// Base layer for feature-column layers.
#[derive(Debug)]
pub struct BaseFeaturesLayer {
    name: String,
    trainable: bool,
    columns: Vec<ColumnRef>,
    expected: ColumnKind,
    state: StateManager,
}

impl BaseFeaturesLayer {
    /// Validates `columns` and creates their state.
    ///
    /// Columns keep the order given by the caller. The layer is named
    /// `options.name` or, when absent, a unique name derived from `default_name`.
    pub fn new(
        columns: Vec<ColumnRef>,
        expected: ColumnKind,
        default_name: &str,
        options: LayerOptions,
    ) -> LayerResult<Self> {
        options.validate()?;
        if columns.is_empty() {
            return Err(LayerError::config("feature_columns must not be empty"));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !expected.accepts(column.as_ref()) {
                return Err(LayerError::InvalidColumn {
                    column: column.name().to_string(),
                    column_type: column.column_type().to_string(),
                    expected: expected.describe().to_string(),
                });
            }
            if !seen.insert(column.name()) {
                return Err(LayerError::config(format!(
                    "Duplicate feature column name found for columns: {}",
                    column.name()
                )));
            }
        }

        let name = options.name.unwrap_or_else(|| unique_name(default_name));
        let mut state = StateManager::new(name.clone(), options.trainable);
        for column in &columns {
            column.create_state(&mut state)?;
        }

        tracing::debug!(
            layer = %name,
            num_columns = columns.len(),
            trainable = options.trainable,
            "Built feature layer"
        );

        Ok(Self {
            name,
            trainable: options.trainable,
            columns,
            expected,
            state,
        })
    }

    /// Returns the layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the layer is trainable.
    pub fn trainable(&self) -> bool {
        self.trainable
    }

    /// Sets whether the layer is trainable.
    pub fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    /// Returns the columns in layer order.
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns the capability the columns were checked against.
    pub fn expected(&self) -> ColumnKind {
        self.expected
    }

    /// Returns the variable state.
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Returns the variable state for in-place updates.
    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    /// Variables that are trainable while the layer is.
    pub fn trainable_weights(&self) -> Vec<&Variable> {
        if self.trainable {
            self.state.trainable_variables()
        } else {
            Vec::new()
        }
    }

    /// Variables that are never trainable, plus all of them when the layer is frozen.
    pub fn non_trainable_weights(&self) -> Vec<&Variable> {
        if self.trainable {
            self.state.non_trainable_variables()
        } else {
            self.state.variables().collect()
        }
    }

    /// Flattens a column's tensor to `(batch, num_elements)`.
    pub fn process_dense_tensor(
        &self,
        column: &dyn DenseColumn,
        tensor: Tensor,
    ) -> LayerResult<Tensor> {
        let batch_size = tensor.batch_size().ok_or_else(|| LayerError::InvalidFeature {
            key: column.name().to_string(),
            message: "dense tensor must have a batch dimension".to_string(),
        })?;
        let num_elements = column.num_elements();
        if tensor.shape() == [batch_size, num_elements] {
            return Ok(tensor);
        }
        tensor.reshape(&[batch_size, num_elements])
    }

    /// Concatenates per-column tensors along the last axis.
    ///
    /// `tensors` must be in column order. All batch sizes must agree.
    pub fn verify_and_concat(&self, tensors: &[Tensor]) -> LayerResult<Tensor> {
        let sizes: Vec<usize> = tensors
            .iter()
            .map(|t| t.batch_size().unwrap_or(0))
            .collect();
        if sizes.windows(2).any(|w| w[0] != w[1]) {
            return Err(LayerError::BatchSizeMismatch {
                columns: self.columns.iter().map(|c| c.name().to_string()).collect(),
                sizes,
            });
        }
        Tensor::concat(tensors)
    }
}
