//! Serializable column descriptions.
//!
//! Every built-in column can describe itself as a [`ColumnConfig`] and be
//! rebuilt from one, which is how layer configurations survive a JSON round trip.

use std::sync::Arc;

use densefeat_core::value::DType;
use serde::{Deserialize, Serialize};

use crate::column::{
    bucketized_column, categorical_column_with_hash_bucket, categorical_column_with_identity,
    categorical_column_with_vocabulary_list, numeric_column, BucketizedColumn, CategoricalColumn,
    ColumnRef, Combiner, EmbeddingColumn, HashedCategoricalColumn, IdentityCategoricalColumn,
    IndicatorColumn, Normalizer, NumericColumn, Vocabulary, VocabularyListCategoricalColumn,
};
use crate::error::{LayerError, LayerResult};
use crate::initializer::Initializer;

/// A tagged description of a feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class_name", content = "config")]
pub enum ColumnConfig {
    /// See [`NumericColumn`].
    NumericColumn {
        /// Input key.
        key: String,
        /// Per-example shape.
        shape: Vec<usize>,
        /// Optional normalizer.
        #[serde(default)]
        normalizer: Option<Normalizer>,
    },
    /// See [`crate::column::BucketizedColumn`].
    BucketizedColumn {
        /// The numeric source.
        source_column: Box<ColumnConfig>,
        /// Bucket boundaries.
        boundaries: Vec<f32>,
    },
    /// See [`crate::column::HashedCategoricalColumn`].
    HashedCategoricalColumn {
        /// Input key.
        key: String,
        /// Number of hash buckets.
        hash_bucket_size: usize,
        /// Input dtype.
        dtype: DType,
    },
    /// See [`crate::column::IdentityCategoricalColumn`].
    IdentityCategoricalColumn {
        /// Input key.
        key: String,
        /// Number of ids.
        number_buckets: usize,
        /// Replacement for out-of-range inputs.
        #[serde(default)]
        default_value: Option<i64>,
    },
    /// See [`crate::column::VocabularyListCategoricalColumn`].
    VocabularyListCategoricalColumn {
        /// Input key.
        key: String,
        /// The vocabulary.
        vocabulary_list: Vocabulary,
        /// Id for out-of-vocabulary inputs.
        #[serde(default)]
        default_value: Option<i64>,
        /// Hash buckets for out-of-vocabulary inputs.
        #[serde(default)]
        num_oov_buckets: usize,
    },
    /// See [`EmbeddingColumn`].
    EmbeddingColumn {
        /// The categorical source.
        categorical_column: Box<ColumnConfig>,
        /// Embedding width.
        dimension: usize,
        /// How ids of one example are combined.
        #[serde(default)]
        combiner: Combiner,
        /// Table initializer.
        initializer: Initializer,
        /// Optional L2 clipping norm.
        #[serde(default)]
        max_norm: Option<f32>,
        /// Whether the table is trainable.
        trainable: bool,
    },
    /// See [`IndicatorColumn`].
    IndicatorColumn {
        /// The categorical source.
        categorical_column: Box<ColumnConfig>,
    },
}

impl ColumnConfig {
    /// Returns the class name used as the serialized tag.
    pub fn class_name(&self) -> &'static str {
        match self {
            ColumnConfig::NumericColumn { .. } => "NumericColumn",
            ColumnConfig::BucketizedColumn { .. } => "BucketizedColumn",
            ColumnConfig::HashedCategoricalColumn { .. } => "HashedCategoricalColumn",
            ColumnConfig::IdentityCategoricalColumn { .. } => "IdentityCategoricalColumn",
            ColumnConfig::VocabularyListCategoricalColumn { .. } => {
                "VocabularyListCategoricalColumn"
            }
            ColumnConfig::EmbeddingColumn { .. } => "EmbeddingColumn",
            ColumnConfig::IndicatorColumn { .. } => "IndicatorColumn",
        }
    }

    /// Builds the described column.
    pub fn build(&self) -> LayerResult<ColumnRef> {
        let column: ColumnRef = match self {
            ColumnConfig::NumericColumn { .. } => Arc::new(self.build_numeric()?),
            ColumnConfig::BucketizedColumn { .. } => Arc::new(self.build_bucketized()?),
            ColumnConfig::HashedCategoricalColumn { .. } => Arc::new(self.build_hashed()?),
            ColumnConfig::IdentityCategoricalColumn { .. } => Arc::new(self.build_identity()?),
            ColumnConfig::VocabularyListCategoricalColumn { .. } => {
                Arc::new(self.build_vocabulary_list()?)
            }
            ColumnConfig::EmbeddingColumn {
                categorical_column,
                dimension,
                combiner,
                initializer,
                max_norm,
                trainable,
            } => {
                let mut column =
                    EmbeddingColumn::new(categorical_column.build_categorical()?, *dimension)?
                        .with_combiner(*combiner)
                        .with_initializer(*initializer)
                        .with_trainable(*trainable);
                if let Some(max_norm) = max_norm {
                    column = column.with_max_norm(*max_norm);
                }
                Arc::new(column)
            }
            ColumnConfig::IndicatorColumn { categorical_column } => Arc::new(IndicatorColumn::new(
                categorical_column.build_categorical()?,
            )),
        };
        Ok(column)
    }

    /// Builds the described column, which must be categorical.
    pub fn build_categorical(&self) -> LayerResult<Arc<dyn CategoricalColumn>> {
        let column: Arc<dyn CategoricalColumn> = match self {
            ColumnConfig::BucketizedColumn { .. } => Arc::new(self.build_bucketized()?),
            ColumnConfig::HashedCategoricalColumn { .. } => Arc::new(self.build_hashed()?),
            ColumnConfig::IdentityCategoricalColumn { .. } => Arc::new(self.build_identity()?),
            ColumnConfig::VocabularyListCategoricalColumn { .. } => {
                Arc::new(self.build_vocabulary_list()?)
            }
            other => {
                return Err(LayerError::config(format!(
                    "{} is not a categorical column",
                    other.class_name()
                )))
            }
        };
        Ok(column)
    }

    fn mismatch(&self, expected: &str) -> LayerError {
        LayerError::config(format!(
            "expected a {} config. Given: {}",
            expected,
            self.class_name()
        ))
    }

    fn build_bucketized(&self) -> LayerResult<BucketizedColumn> {
        match self {
            ColumnConfig::BucketizedColumn {
                source_column,
                boundaries,
            } => bucketized_column(source_column.build_numeric()?, boundaries.clone()),
            _ => Err(self.mismatch("BucketizedColumn")),
        }
    }

    fn build_hashed(&self) -> LayerResult<HashedCategoricalColumn> {
        match self {
            ColumnConfig::HashedCategoricalColumn {
                key,
                hash_bucket_size,
                dtype,
            } => categorical_column_with_hash_bucket(key.as_str(), *hash_bucket_size, *dtype),
            _ => Err(self.mismatch("HashedCategoricalColumn")),
        }
    }

    fn build_identity(&self) -> LayerResult<IdentityCategoricalColumn> {
        match self {
            ColumnConfig::IdentityCategoricalColumn {
                key,
                number_buckets,
                default_value,
            } => categorical_column_with_identity(key.as_str(), *number_buckets, *default_value),
            _ => Err(self.mismatch("IdentityCategoricalColumn")),
        }
    }

    fn build_vocabulary_list(&self) -> LayerResult<VocabularyListCategoricalColumn> {
        match self {
            ColumnConfig::VocabularyListCategoricalColumn {
                key,
                vocabulary_list,
                default_value,
                num_oov_buckets,
            } => {
                let column =
                    categorical_column_with_vocabulary_list(key.as_str(), vocabulary_list.clone())?
                        .with_num_oov_buckets(*num_oov_buckets)?;
                match default_value {
                    Some(default_value) => column.with_default_value(*default_value),
                    None => Ok(column),
                }
            }
            _ => Err(self.mismatch("VocabularyListCategoricalColumn")),
        }
    }

    fn build_numeric(&self) -> LayerResult<NumericColumn> {
        match self {
            ColumnConfig::NumericColumn {
                key,
                shape,
                normalizer,
            } => {
                let mut column = numeric_column(key.as_str()).with_shape(shape)?;
                if let Some(normalizer) = normalizer {
                    column = column.with_normalizer(*normalizer);
                }
                Ok(column)
            }
            _ => Err(self.mismatch("NumericColumn")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{embedding_column, indicator_column, FeatureColumn};

    fn round_trip(column: &dyn FeatureColumn) -> ColumnConfig {
        let config = column.to_config().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: ColumnConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.build().unwrap().to_config().unwrap(), config);
        back
    }

    #[test]
    fn test_numeric_config() {
        let column = numeric_column("price")
            .with_shape(&[2])
            .unwrap()
            .with_normalizer(Normalizer::Scale { factor: 0.5 });
        let config = round_trip(&column);
        assert_eq!(config.class_name(), "NumericColumn");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["class_name"], "NumericColumn");
        assert_eq!(json["config"]["key"], "price");
    }

    #[test]
    fn test_nested_configs() {
        let vocab = categorical_column_with_vocabulary_list("color", vec!["R", "G"])
            .unwrap()
            .with_num_oov_buckets(2)
            .unwrap();
        round_trip(&embedding_column(vocab.clone(), 3).unwrap().with_max_norm(1.0));
        round_trip(&indicator_column(vocab));

        let ids = categorical_column_with_identity("id", 5, Some(0)).unwrap();
        round_trip(&indicator_column(ids));

        let hashed = categorical_column_with_hash_bucket("kw", 7, DType::Int64).unwrap();
        round_trip(&embedding_column(hashed, 2).unwrap());

        let bucketized = bucketized_column(numeric_column("age"), vec![18.0, 65.0]).unwrap();
        round_trip(&bucketized);
        round_trip(&indicator_column(bucketized));
    }

    #[test]
    fn test_build_rejects_wrong_kinds() {
        let numeric = numeric_column("x").to_config().unwrap();
        assert!(numeric.build_categorical().is_err());

        let bad = ColumnConfig::IndicatorColumn {
            categorical_column: Box::new(numeric.clone()),
        };
        assert!(bad.build().is_err());

        let bad = ColumnConfig::BucketizedColumn {
            source_column: Box::new(ColumnConfig::HashedCategoricalColumn {
                key: "x".to_string(),
                hash_bucket_size: 3,
                dtype: DType::String,
            }),
            boundaries: vec![0.0],
        };
        assert!(bad.build().is_err());
    }
}
