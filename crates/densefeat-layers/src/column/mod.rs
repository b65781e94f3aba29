//! Feature columns.
//!
//! A feature column describes how to derive a tensor from one or more named
//! raw inputs. Columns come in two capability classes:
//!
//! - [`DenseColumn`]: produces a dense `f32` tensor directly
//!   (numeric, bucketized, embedding, indicator).
//! - [`CategoricalColumn`]: produces integer ids
//!   (hash bucket, identity, vocabulary list, bucketized).
//!
//! Categorical columns are turned into dense ones by wrapping them in an
//! [`EmbeddingColumn`] or an [`IndicatorColumn`].
//!
//! # Example
//!
//! ```
//! use densefeat_layers::column::{
//!     categorical_column_with_hash_bucket, embedding_column, numeric_column, DenseColumn,
//! };
//! use densefeat_core::value::DType;
//!
//! let price = numeric_column("price");
//! let keywords = categorical_column_with_hash_bucket("keywords", 1000, DType::String).unwrap();
//! let keywords_embedded = embedding_column(keywords, 16).unwrap();
//!
//! assert_eq!(price.variable_shape(), vec![1]);
//! assert_eq!(keywords_embedded.variable_shape(), vec![16]);
//! ```

use std::fmt;
use std::sync::Arc;

use densefeat_core::value::{FeatureValue, SparseValue};

use crate::cache::TransformationCache;
use crate::error::{LayerError, LayerResult};
use crate::state::StateManager;
use crate::tensor::Tensor;

pub mod bucketized;
pub mod categorical;
pub mod config;
pub mod embedding;
pub mod indicator;
pub mod numeric;

pub use bucketized::{bucketized_column, BucketizedColumn};
pub use categorical::{
    categorical_column_with_hash_bucket, categorical_column_with_identity,
    categorical_column_with_vocabulary_list, HashedCategoricalColumn, IdentityCategoricalColumn,
    Vocabulary, VocabularyListCategoricalColumn,
};
pub use config::ColumnConfig;
pub use embedding::{embedding_column, Combiner, EmbeddingColumn};
pub use indicator::{indicator_column, IndicatorColumn};
pub use numeric::{numeric_column, Normalizer, NumericColumn};

/// Shared handle to a column of any kind.
pub type ColumnRef = Arc<dyn FeatureColumn>;

/// A declarative description of how to derive a tensor from raw features.
pub trait FeatureColumn: fmt::Debug + Send + Sync {
    /// Returns the column name. Names must be unique within a layer.
    fn name(&self) -> &str;

    /// Derives this column's intermediate value from the raw features.
    ///
    /// Implementations read raw inputs with [`TransformationCache::get_raw`] and
    /// the outputs of other columns with [`TransformationCache::get`]. Callers
    /// should go through [`TransformationCache::get`] instead of calling this
    /// directly so that the result is shared.
    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<FeatureValue>;

    /// Creates any variables the column needs. Called once when a layer is built.
    fn create_state(&self, _state: &mut StateManager) -> LayerResult<()> {
        Ok(())
    }

    /// Returns this column as a dense column, if it is one.
    fn as_dense(&self) -> Option<&dyn DenseColumn> {
        None
    }

    /// Returns this column as a categorical column, if it is one.
    fn as_categorical(&self) -> Option<&dyn CategoricalColumn> {
        None
    }

    /// Returns the concrete type name, for error messages.
    fn column_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns a serializable description of the column.
    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Err(LayerError::config(format!(
            "Column {} ({}) has no serializable configuration",
            self.name(),
            self.column_type()
        )))
    }
}

/// A column that produces a dense `f32` tensor.
pub trait DenseColumn: FeatureColumn {
    /// Shape of one example's output, excluding the batch dimension.
    fn variable_shape(&self) -> Vec<usize>;

    /// Produces the dense tensor for a batch. The first dimension is the batch.
    fn get_dense_tensor(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<Tensor>;

    /// Number of output elements per example.
    fn num_elements(&self) -> usize {
        self.variable_shape().iter().product()
    }
}

/// A column that maps raw values to integer ids.
pub trait CategoricalColumn: FeatureColumn {
    /// Size of the id space. Valid ids lie in `[0, num_buckets)`.
    fn num_buckets(&self) -> usize;

    /// Produces int64 ids, one row per example. Negative ids mark missing values.
    fn get_sparse_tensors(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<SparseValue>;
}

/// Unwraps a transformed value that must be sparse.
pub(crate) fn expect_sparse(column: &str, value: FeatureValue) -> LayerResult<SparseValue> {
    match value {
        FeatureValue::Sparse(sparse) => Ok(sparse),
        FeatureValue::Dense(dense) => Err(LayerError::InvalidFeature {
            key: column.to_string(),
            message: format!(
                "expected sparse ids, got dense tensor of shape {:?}",
                dense.shape()
            ),
        }),
    }
}

/// Unwraps a transformed value that must be dense and numeric.
pub(crate) fn expect_dense(column: &str, value: FeatureValue) -> LayerResult<Tensor> {
    match value {
        FeatureValue::Dense(dense) => Tensor::from_dense_value(&dense),
        FeatureValue::Sparse(sparse) => Err(LayerError::InvalidFeature {
            key: column.to_string(),
            message: format!(
                "expected a dense tensor, got sparse tensor with {} rows",
                sparse.batch_size()
            ),
        }),
    }
}
