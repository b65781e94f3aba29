//! Embedding columns: categorical ids looked up in a learned table.

use std::sync::Arc;

use densefeat_core::value::{FeatureValue, SparseValue};
use serde::{Deserialize, Serialize};

use crate::cache::TransformationCache;
use crate::column::{expect_sparse, CategoricalColumn, ColumnConfig, DenseColumn, FeatureColumn};
use crate::error::{LayerError, LayerResult};
use crate::initializer::Initializer;
use crate::state::StateManager;
use crate::tensor::Tensor;

/// Name of the table variable created for every embedding column.
pub const EMBEDDING_WEIGHTS: &str = "embedding_weights";

/// How the embeddings of one example's ids are reduced to a single vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combiner {
    /// Sum of the embeddings.
    Sum,
    /// Average of the embeddings.
    #[default]
    Mean,
    /// Sum divided by the square root of the number of ids.
    Sqrtn,
}

/// Maps a categorical column to dense vectors through a `[num_buckets, dimension]` table.
#[derive(Debug, Clone)]
pub struct EmbeddingColumn {
    name: String,
    categorical: Arc<dyn CategoricalColumn>,
    dimension: usize,
    combiner: Combiner,
    initializer: Initializer,
    max_norm: Option<f32>,
    trainable: bool,
}

/// Creates an embedding column of width `dimension` over `categorical`.
///
/// The table is initialized from a truncated normal with standard deviation
/// `1 / sqrt(dimension)` unless another initializer is set.
pub fn embedding_column<C>(categorical: C, dimension: usize) -> LayerResult<EmbeddingColumn>
where
    C: CategoricalColumn + 'static,
{
    EmbeddingColumn::new(Arc::new(categorical), dimension)
}

impl EmbeddingColumn {
    /// Creates an embedding column over a shared categorical column.
    pub fn new(categorical: Arc<dyn CategoricalColumn>, dimension: usize) -> LayerResult<Self> {
        if dimension == 0 {
            return Err(LayerError::config(format!(
                "Invalid dimension {}. Dimension must be positive.",
                dimension
            )));
        }
        Ok(Self {
            name: format!("{}_embedding", categorical.name()),
            categorical,
            dimension,
            combiner: Combiner::default(),
            initializer: Initializer::truncated_normal(1.0 / (dimension as f32).sqrt()),
            max_norm: None,
            trainable: true,
        })
    }

    /// Sets the combiner.
    pub fn with_combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = combiner;
        self
    }

    /// Sets the table initializer.
    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// Clips every looked-up embedding to this L2 norm.
    pub fn with_max_norm(mut self, max_norm: f32) -> Self {
        self.max_norm = Some(max_norm);
        self
    }

    /// Sets whether the table is trainable.
    pub fn with_trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    /// Returns the wrapped categorical column.
    pub fn categorical_column(&self) -> &Arc<dyn CategoricalColumn> {
        &self.categorical
    }

    /// Returns the embedding width.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the combiner.
    pub fn combiner(&self) -> Combiner {
        self.combiner
    }

    /// Looks up and combines the embeddings of every example in `ids`.
    ///
    /// Negative ids are skipped. Examples without ids produce zeros.
    fn lookup(&self, table: &Tensor, ids: &SparseValue) -> LayerResult<Tensor> {
        let dim = self.dimension;
        let rows = table.shape()[0];
        let ids_data = ids.values().as_int64()?;
        let batch_size = ids.batch_size();
        let mut output = vec![0.0; batch_size * dim];

        for (i, range) in ids.rows().enumerate() {
            let out = &mut output[i * dim..(i + 1) * dim];
            let mut count = 0usize;
            for &id in &ids_data[range] {
                if id < 0 {
                    continue;
                }
                let id = id as usize;
                if id >= rows {
                    return Err(LayerError::EmbeddingError {
                        message: format!(
                            "id {} out of range for embedding table of {} rows in column {}",
                            id, rows, self.name
                        ),
                    });
                }
                let scale = self.clip_scale(table.row(id));
                for (o, &v) in out.iter_mut().zip(table.row(id)) {
                    *o += v * scale;
                }
                count += 1;
            }

            if count == 0 {
                continue;
            }
            let divisor = match self.combiner {
                Combiner::Sum => 1.0,
                Combiner::Mean => count as f32,
                Combiner::Sqrtn => (count as f32).sqrt(),
            };
            out.iter_mut().for_each(|o| *o /= divisor);
        }

        Ok(Tensor::from_data(&[batch_size, dim], output))
    }

    fn clip_scale(&self, embedding: &[f32]) -> f32 {
        match self.max_norm {
            Some(max_norm) => {
                let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > max_norm {
                    max_norm / norm
                } else {
                    1.0
                }
            }
            None => 1.0,
        }
    }
}

impl FeatureColumn for EmbeddingColumn {
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

    fn create_state(&self, state: &mut StateManager) -> LayerResult<()> {
        let shape = [self.categorical.num_buckets(), self.dimension];
        state.create_variable(
            &self.name,
            EMBEDDING_WEIGHTS,
            &shape,
            &self.initializer,
            self.trainable,
        )?;
        Ok(())
    }

    fn as_dense(&self) -> Option<&dyn DenseColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::EmbeddingColumn {
            categorical_column: Box::new(self.categorical.to_config()?),
            dimension: self.dimension,
            combiner: self.combiner,
            initializer: self.initializer,
            max_norm: self.max_norm,
            trainable: self.trainable,
        })
    }
}

impl DenseColumn for EmbeddingColumn {
    fn variable_shape(&self) -> Vec<usize> {
        vec![self.dimension]
    }

    fn get_dense_tensor(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<Tensor> {
        let ids = expect_sparse(&self.name, cache.get(self, state)?)?;
        let table = state.get_variable(&self.name, EMBEDDING_WEIGHTS)?;
        self.lookup(table.value(), &ids)
    }
}
