//! Indicator columns: multi-hot encoding of a categorical column.

use std::sync::Arc;

use densefeat_core::value::FeatureValue;

use crate::cache::TransformationCache;
use crate::column::{expect_sparse, CategoricalColumn, ColumnConfig, DenseColumn, FeatureColumn};
use crate::error::LayerResult;
use crate::state::StateManager;
use crate::tensor::Tensor;

/// Represents a categorical column as per-bucket counts.
///
/// An example with ids `[1, 1, 3]` over four buckets becomes `[0, 2, 0, 1]`.
/// Ids outside `[0, num_buckets)` are ignored.
#[derive(Debug, Clone)]
pub struct IndicatorColumn {
    name: String,
    categorical: Arc<dyn CategoricalColumn>,
}

/// Creates an indicator column over `categorical`.
pub fn indicator_column<C>(categorical: C) -> IndicatorColumn
where
    C: CategoricalColumn + 'static,
{
    IndicatorColumn::new(Arc::new(categorical))
}

impl IndicatorColumn {
    /// Creates an indicator column over a shared categorical column.
    pub fn new(categorical: Arc<dyn CategoricalColumn>) -> Self {
        Self {
            name: format!("{}_indicator", categorical.name()),
            categorical,
        }
    }

    /// Returns the wrapped categorical column.
    pub fn categorical_column(&self) -> &Arc<dyn CategoricalColumn> {
        &self.categorical
    }
}

impl FeatureColumn for IndicatorColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let ids = self.categorical.get_sparse_tensors(cache, state)?;
        Ok(FeatureValue::Sparse(ids))
    }

    fn as_dense(&self) -> Option<&dyn DenseColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::IndicatorColumn {
            categorical_column: Box::new(self.categorical.to_config()?),
        })
    }
}

impl DenseColumn for IndicatorColumn {
    fn variable_shape(&self) -> Vec<usize> {
        vec![self.categorical.num_buckets()]
    }

    fn get_dense_tensor(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<Tensor> {
        let ids = expect_sparse(&self.name, cache.get(self, state)?)?;
        let ids_data = ids.values().as_int64()?;
        let depth = self.categorical.num_buckets();

        let mut output = Tensor::zeros(&[ids.batch_size(), depth]);
        let data = output.data_mut();
        for (row, range) in ids.rows().enumerate() {
            for &id in &ids_data[range] {
                if (0..depth as i64).contains(&id) {
                    data[row * depth + id as usize] += 1.0;
                }
            }
        }
        Ok(output)
    }
}
