//! Per-call memoization of raw and transformed features.
//!
//! A [`TransformationCache`] wraps the feature mapping passed to a layer call.
//! Columns that share a source (for example an embedding and an indicator
//! column over the same categorical column) read the transformed value from
//! the cache instead of recomputing it.

use std::collections::HashMap;

use densefeat_core::value::{FeatureValue, Features};

use crate::column::FeatureColumn;
use crate::error::{LayerError, LayerResult};
use crate::state::StateManager;

/// Identity of a column instance within one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ColumnId {
    addr: usize,
    name: String,
}

impl ColumnId {
    fn of(column: &dyn FeatureColumn) -> Self {
        Self {
            addr: column as *const _ as *const () as usize,
            name: column.name().to_string(),
        }
    }
}

/// Memoizes feature lookups and column transformations for a single call.
#[derive(Debug)]
pub struct TransformationCache<'a> {
    features: &'a Features,
    raw: HashMap<String, FeatureValue>,
    transformed: HashMap<ColumnId, FeatureValue>,
}

impl<'a> TransformationCache<'a> {
    /// Creates a cache over the given features.
    pub fn new(features: &'a Features) -> Self {
        Self {
            features,
            raw: HashMap::new(),
            transformed: HashMap::new(),
        }
    }

    /// Returns the raw feature stored under `key`.
    ///
    /// Dense rank-1 inputs are expanded to `[batch, 1]`; rank-0 inputs are rejected.
    pub fn get_raw(&mut self, key: &str) -> LayerResult<FeatureValue> {
        if let Some(value) = self.raw.get(key) {
            return Ok(value.clone());
        }

        let value = match self.features.get(key) {
            None => {
                return Err(LayerError::MissingFeature {
                    key: key.to_string(),
                })
            }
            Some(FeatureValue::Dense(dense)) => {
                if dense.rank() == 0 {
                    return Err(LayerError::InvalidFeature {
                        key: key.to_string(),
                        message: "Feature cannot have rank 0".to_string(),
                    });
                }
                FeatureValue::Dense(dense.clone().expand_rank())
            }
            Some(sparse) => sparse.clone(),
        };

        self.raw.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Returns the transformed value of `column`, computing it at most once per call.
    pub fn get(
        &mut self,
        column: &dyn FeatureColumn,
        state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let id = ColumnId::of(column);
        if let Some(value) = self.transformed.get(&id) {
            return Ok(value.clone());
        }

        tracing::trace!(column = column.name(), "Transforming feature");
        let value = column.transform_feature(self, state)?;
        self.transformed.insert(id, value.clone());
        Ok(value)
    }

    /// Returns the number of memoized column transformations.
    pub fn num_transformed(&self) -> usize {
        self.transformed.len()
    }
}
