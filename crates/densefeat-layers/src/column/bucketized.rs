//! Bucketized columns: numeric features discretized by boundaries.

use densefeat_core::value::{DenseValue, FeatureValue, SparseValue, Values};

use crate::cache::TransformationCache;
use crate::column::{
    CategoricalColumn, ColumnConfig, DenseColumn, FeatureColumn, NumericColumn,
};
use crate::error::{LayerError, LayerResult};
use crate::state::StateManager;
use crate::tensor::Tensor;

/// Splits a numeric column into buckets.
///
/// With boundaries `[0, 10, 100]` the buckets are `(-inf, 0)`, `[0, 10)`,
/// `[10, 100)` and `[100, +inf)`. The dense output is a one-hot encoding of
/// the bucket of every source element; as a categorical column each element
/// `i` of the source contributes id `bucket + i * (boundaries.len() + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketizedColumn {
    name: String,
    source: NumericColumn,
    boundaries: Vec<f32>,
}

/// Creates a bucketized column over `source`.
///
/// The source must be one-dimensional and the boundaries strictly ascending.
pub fn bucketized_column(source: NumericColumn, boundaries: Vec<f32>) -> LayerResult<BucketizedColumn> {
    if source.shape().len() != 1 {
        return Err(LayerError::config(format!(
            "source_column must be one-dimensional column. Given: {}",
            source.name()
        )));
    }
    if boundaries.is_empty() {
        return Err(LayerError::config("boundaries must not be empty"));
    }
    if boundaries.windows(2).any(|w| w[0] >= w[1]) {
        return Err(LayerError::config(format!(
            "boundaries must be a sorted list. Given: {:?}",
            boundaries
        )));
    }
    Ok(BucketizedColumn {
        name: format!("{}_bucketized", source.name()),
        source,
        boundaries,
    })
}

impl BucketizedColumn {
    /// Returns the source column.
    pub fn source(&self) -> &NumericColumn {
        &self.source
    }

    /// Returns the bucket boundaries.
    pub fn boundaries(&self) -> &[f32] {
        &self.boundaries
    }

    fn buckets_per_element(&self) -> usize {
        self.boundaries.len() + 1
    }

    fn source_dim(&self) -> usize {
        self.source.shape()[0]
    }

    fn bucket(&self, x: f32) -> i64 {
        self.boundaries.partition_point(|&b| b <= x) as i64
    }

    /// Bucket ids of the source, as a `[batch, dim]` integer value.
    fn bucket_ids(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<DenseValue> {
        match cache.get(self, state)? {
            FeatureValue::Dense(ids) => Ok(ids),
            FeatureValue::Sparse(_) => Err(LayerError::InvalidFeature {
                key: self.name.clone(),
                message: "bucketized ids must be dense".to_string(),
            }),
        }
    }
}

impl FeatureColumn for BucketizedColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let source = self.source.get_dense_tensor(cache, state)?;
        let ids: Vec<i64> = source.data().iter().map(|&x| self.bucket(x)).collect();
        Ok(FeatureValue::Dense(DenseValue::int64(source.shape(), ids)?))
    }

    fn as_dense(&self) -> Option<&dyn DenseColumn> {
        Some(self)
    }

    fn as_categorical(&self) -> Option<&dyn CategoricalColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::BucketizedColumn {
            source_column: Box::new(self.source.to_config()?),
            boundaries: self.boundaries.clone(),
        })
    }
}

impl DenseColumn for BucketizedColumn {
    fn variable_shape(&self) -> Vec<usize> {
        vec![self.source_dim(), self.buckets_per_element()]
    }

    fn get_dense_tensor(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<Tensor> {
        let ids = self.bucket_ids(cache, state)?;
        let ids_data = ids.values().as_int64()?;
        let depth = self.buckets_per_element();

        let mut shape = ids.shape().to_vec();
        shape.push(depth);
        let mut data = vec![0.0; ids_data.len() * depth];
        for (i, &id) in ids_data.iter().enumerate() {
            data[i * depth + id as usize] = 1.0;
        }
        Ok(Tensor::from_data(&shape, data))
    }
}

impl CategoricalColumn for BucketizedColumn {
    fn num_buckets(&self) -> usize {
        self.source_dim() * self.buckets_per_element()
    }

    fn get_sparse_tensors(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<SparseValue> {
        let ids = self.bucket_ids(cache, state)?;
        let ids_data = ids.values().as_int64()?;
        let batch = ids.batch_size().unwrap_or(0);
        let width = if batch == 0 { 0 } else { ids_data.len() / batch };
        let depth = self.buckets_per_element() as i64;

        let shifted: Vec<i64> = ids_data
            .iter()
            .enumerate()
            .map(|(idx, &id)| id + (idx % width.max(1)) as i64 * depth)
            .collect();
        let offsets = (0..=batch).map(|row| row * width).collect();
        Ok(SparseValue::from_parts(Values::Int64(shifted), offsets)?)
    }
}
