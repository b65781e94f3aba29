//! Categorical columns: raw strings or integers mapped to ids.

use std::collections::HashMap;

use densefeat_core::value::{DType, FeatureValue, SparseValue, Values};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::cache::TransformationCache;
use crate::column::{expect_sparse, CategoricalColumn, ColumnConfig, FeatureColumn};
use crate::error::{LayerError, LayerResult};
use crate::state::StateManager;

/// Hashes `text` into `[0, buckets)`.
fn hash_bucket(text: &str, buckets: usize) -> i64 {
    (xxh64(text.as_bytes(), 0) % buckets as u64) as i64
}

/// Reads the raw feature under `key` as sparse values of the expected dtype.
///
/// Dense inputs are converted, dropping empty strings and `-1` integers.
fn categorical_input(
    cache: &mut TransformationCache<'_>,
    key: &str,
    expected: DType,
) -> LayerResult<SparseValue> {
    let raw = cache.get_raw(key)?;
    if raw.dtype() != expected {
        return Err(LayerError::InvalidFeature {
            key: key.to_string(),
            message: format!(
                "Column dtype and input dtype must be compatible. column dtype: {}, input dtype: {}",
                expected,
                raw.dtype()
            ),
        });
    }
    Ok(raw.to_sparse()?)
}

/// Applies `f` to every value, keeping the row structure.
fn map_ids<F>(input: &SparseValue, mut f: F) -> LayerResult<FeatureValue>
where
    F: FnMut(usize) -> LayerResult<i64>,
{
    let ids = (0..input.values().len())
        .map(&mut f)
        .collect::<LayerResult<Vec<i64>>>()?;
    let sparse = SparseValue::from_parts(Values::Int64(ids), input.offsets().to_vec())?;
    Ok(FeatureValue::Sparse(sparse))
}

/// Text form of the element at `idx`, used for hashing and vocabulary lookup.
fn value_text(values: &Values, idx: usize) -> String {
    match values {
        Values::String(v) => v[idx].clone(),
        Values::Int64(v) => v[idx].to_string(),
        Values::Float32(v) => v[idx].to_string(),
        Values::Float64(v) => v[idx].to_string(),
    }
}

fn check_categorical_dtype(dtype: DType) -> LayerResult<()> {
    match dtype {
        DType::String | DType::Int64 => Ok(()),
        other => Err(LayerError::config(format!(
            "dtype must be string or integer. dtype: {}",
            other
        ))),
    }
}

/// Hashes raw values into a fixed number of buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct HashedCategoricalColumn {
    key: String,
    hash_bucket_size: usize,
    dtype: DType,
}

/// Creates a column that hashes `key` into `hash_bucket_size` buckets.
///
/// Integer inputs are hashed through their decimal text.
pub fn categorical_column_with_hash_bucket(
    key: impl Into<String>,
    hash_bucket_size: usize,
    dtype: DType,
) -> LayerResult<HashedCategoricalColumn> {
    let key = key.into();
    if hash_bucket_size < 1 {
        return Err(LayerError::config(format!(
            "hash_bucket_size must be at least 1. hash_bucket_size: {}, key: {}",
            hash_bucket_size, key
        )));
    }
    check_categorical_dtype(dtype)?;
    Ok(HashedCategoricalColumn {
        key,
        hash_bucket_size,
        dtype,
    })
}

impl HashedCategoricalColumn {
    /// Returns the input key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the input dtype.
    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

impl FeatureColumn for HashedCategoricalColumn {
    fn name(&self) -> &str {
        &self.key
    }

    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        _state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let input = categorical_input(cache, &self.key, self.dtype)?;
        let values = input.values();
        map_ids(&input, |idx| {
            Ok(hash_bucket(&value_text(values, idx), self.hash_bucket_size))
        })
    }

    fn as_categorical(&self) -> Option<&dyn CategoricalColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::HashedCategoricalColumn {
            key: self.key.clone(),
            hash_bucket_size: self.hash_bucket_size,
            dtype: self.dtype,
        })
    }
}

impl CategoricalColumn for HashedCategoricalColumn {
    fn num_buckets(&self) -> usize {
        self.hash_bucket_size
    }

    fn get_sparse_tensors(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<SparseValue> {
        expect_sparse(&self.key, cache.get(self, state)?)
    }
}

/// Uses integer inputs directly as ids.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityCategoricalColumn {
    key: String,
    num_buckets: usize,
    default_value: Option<i64>,
}

/// Creates a column whose ids are the integer inputs under `key`.
///
/// Inputs outside `[0, num_buckets)` are replaced by `default_value`, or
/// rejected when no default is given.
pub fn categorical_column_with_identity(
    key: impl Into<String>,
    num_buckets: usize,
    default_value: Option<i64>,
) -> LayerResult<IdentityCategoricalColumn> {
    let key = key.into();
    if num_buckets < 1 {
        return Err(LayerError::config(format!(
            "num_buckets {} < 1, column_name {}",
            num_buckets, key
        )));
    }
    if let Some(default) = default_value {
        if default < 0 || default >= num_buckets as i64 {
            return Err(LayerError::config(format!(
                "default_value {} not in range [0, {}), column_name {}",
                default, num_buckets, key
            )));
        }
    }
    Ok(IdentityCategoricalColumn {
        key,
        num_buckets,
        default_value,
    })
}

impl IdentityCategoricalColumn {
    /// Returns the input key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the replacement for out-of-range inputs.
    pub fn default_value(&self) -> Option<i64> {
        self.default_value
    }
}

impl FeatureColumn for IdentityCategoricalColumn {
    fn name(&self) -> &str {
        &self.key
    }

    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        _state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let input = categorical_input(cache, &self.key, DType::Int64)?;
        let values = input.values().as_int64()?;
        let upper = self.num_buckets as i64;
        map_ids(&input, |idx| {
            let v = values[idx];
            if (0..upper).contains(&v) {
                return Ok(v);
            }
            self.default_value.ok_or_else(|| LayerError::InvalidFeature {
                key: self.key.clone(),
                message: format!("Value {} is not in range [0, {})", v, upper),
            })
        })
    }

    fn as_categorical(&self) -> Option<&dyn CategoricalColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::IdentityCategoricalColumn {
            key: self.key.clone(),
            number_buckets: self.num_buckets,
            default_value: self.default_value,
        })
    }
}

impl CategoricalColumn for IdentityCategoricalColumn {
    fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    fn get_sparse_tensors(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<SparseValue> {
        expect_sparse(&self.key, cache.get(self, state)?)
    }
}

/// An in-memory vocabulary of strings or integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Vocabulary {
    /// String vocabulary.
    Strings(Vec<String>),
    /// Integer vocabulary.
    Ints(Vec<i64>),
}

impl Vocabulary {
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        match self {
            Vocabulary::Strings(v) => v.len(),
            Vocabulary::Ints(v) => v.len(),
        }
    }

    /// Returns true if the vocabulary has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype that inputs must have.
    pub fn dtype(&self) -> DType {
        match self {
            Vocabulary::Strings(_) => DType::String,
            Vocabulary::Ints(_) => DType::Int64,
        }
    }

    fn texts(&self) -> Vec<String> {
        match self {
            Vocabulary::Strings(v) => v.clone(),
            Vocabulary::Ints(v) => v.iter().map(ToString::to_string).collect(),
        }
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(v: Vec<String>) -> Self {
        Vocabulary::Strings(v)
    }
}

impl From<Vec<&str>> for Vocabulary {
    fn from(v: Vec<&str>) -> Self {
        Vocabulary::Strings(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for Vocabulary {
    fn from(v: Vec<i64>) -> Self {
        Vocabulary::Ints(v)
    }
}

/// Maps inputs to their position in an in-memory vocabulary.
///
/// Out-of-vocabulary inputs either hash into `num_oov_buckets` extra ids
/// after the vocabulary, or map to `default_value` (`-1` when unset).
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyListCategoricalColumn {
    key: String,
    vocabulary: Vocabulary,
    index: HashMap<String, i64>,
    default_value: Option<i64>,
    num_oov_buckets: usize,
}

/// Creates a vocabulary-list column over `key`.
///
/// # Examples
///
/// ```
/// use densefeat_layers::column::{categorical_column_with_vocabulary_list, CategoricalColumn};
///
/// let colors = categorical_column_with_vocabulary_list("color", vec!["R", "G", "B"])
///     .unwrap()
///     .with_num_oov_buckets(2)
///     .unwrap();
/// assert_eq!(colors.num_buckets(), 5);
/// ```
pub fn categorical_column_with_vocabulary_list(
    key: impl Into<String>,
    vocabulary: impl Into<Vocabulary>,
) -> LayerResult<VocabularyListCategoricalColumn> {
    let key = key.into();
    let vocabulary = vocabulary.into();
    if vocabulary.is_empty() {
        return Err(LayerError::config(format!(
            "vocabulary_list must be non-empty, column_name: {}",
            key
        )));
    }

    let mut index = HashMap::with_capacity(vocabulary.len());
    for (i, text) in vocabulary.texts().into_iter().enumerate() {
        if index.insert(text.clone(), i as i64).is_some() {
            return Err(LayerError::config(format!(
                "Duplicate keys in vocabulary_list: {}, column_name: {}",
                text, key
            )));
        }
    }

    Ok(VocabularyListCategoricalColumn {
        key,
        vocabulary,
        index,
        default_value: None,
        num_oov_buckets: 0,
    })
}

impl VocabularyListCategoricalColumn {
    /// Sets the id returned for out-of-vocabulary inputs.
    pub fn with_default_value(mut self, default_value: i64) -> LayerResult<Self> {
        if self.num_oov_buckets > 0 {
            return Err(LayerError::config(format!(
                "Can't specify both default_value and num_oov_buckets, column_name: {}",
                self.key
            )));
        }
        self.default_value = Some(default_value);
        Ok(self)
    }

    /// Sets the number of hash buckets for out-of-vocabulary inputs.
    pub fn with_num_oov_buckets(mut self, num_oov_buckets: usize) -> LayerResult<Self> {
        if num_oov_buckets > 0 && self.default_value.is_some() {
            return Err(LayerError::config(format!(
                "Can't specify both default_value and num_oov_buckets, column_name: {}",
                self.key
            )));
        }
        self.num_oov_buckets = num_oov_buckets;
        Ok(self)
    }

    /// Returns the input key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the vocabulary.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn lookup(&self, text: &str) -> i64 {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        if self.num_oov_buckets > 0 {
            return self.vocabulary.len() as i64 + hash_bucket(text, self.num_oov_buckets);
        }
        self.default_value.unwrap_or(-1)
    }
}

impl FeatureColumn for VocabularyListCategoricalColumn {
    fn name(&self) -> &str {
        &self.key
    }

    fn transform_feature(
        &self,
        cache: &mut TransformationCache<'_>,
        _state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        let input = categorical_input(cache, &self.key, self.vocabulary.dtype())?;
        let values = input.values();
        map_ids(&input, |idx| Ok(self.lookup(&value_text(values, idx))))
    }

    fn as_categorical(&self) -> Option<&dyn CategoricalColumn> {
        Some(self)
    }

    fn to_config(&self) -> LayerResult<ColumnConfig> {
        Ok(ColumnConfig::VocabularyListCategoricalColumn {
            key: self.key.clone(),
            vocabulary_list: self.vocabulary.clone(),
            default_value: self.default_value,
            num_oov_buckets: self.num_oov_buckets,
        })
    }
}

impl CategoricalColumn for VocabularyListCategoricalColumn {
    fn num_buckets(&self) -> usize {
        self.vocabulary.len() + self.num_oov_buckets
    }

    fn get_sparse_tensors(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<SparseValue> {
        expect_sparse(&self.key, cache.get(self, state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use densefeat_core::value::{DenseValue, Features};

    fn sparse_ids(column: &dyn CategoricalColumn, features: &Features) -> LayerResult<SparseValue> {
        let state = StateManager::new("test", true);
        let mut cache = TransformationCache::new(features);
        column.get_sparse_tensors(&mut cache, &state)
    }

    #[test]
    fn test_hash_bucket_is_stable_and_bounded() {
        let column = categorical_column_with_hash_bucket("kw", 10, DType::String).unwrap();
        let features = Features::new().with(
            "kw",
            SparseValue::from_string_rows(&[vec!["shoes", "red"], vec![], vec!["shoes"]]),
        );
        let ids = sparse_ids(&column, &features).unwrap();
        let data = ids.values().as_int64().unwrap();
        assert_eq!(ids.offsets(), &[0, 2, 2, 3]);
        assert!(data.iter().all(|&id| (0..10).contains(&id)));
        assert_eq!(data[0], data[2]);
        assert_eq!(data[0], hash_bucket("shoes", 10));
    }

    #[test]
    fn test_hash_bucket_int_input_hashes_text() {
        let column = categorical_column_with_hash_bucket("uid", 100, DType::Int64).unwrap();
        let features = Features::new().with("uid", DenseValue::int64(&[2], vec![42, -1]).unwrap());
        let ids = sparse_ids(&column, &features).unwrap();
        assert_eq!(ids.offsets(), &[0, 1, 1]);
        assert_eq!(ids.values().as_int64().unwrap(), &[hash_bucket("42", 100)]);
    }

    #[test]
    fn test_hash_bucket_validation() {
        assert!(categorical_column_with_hash_bucket("k", 0, DType::String).is_err());
        assert!(categorical_column_with_hash_bucket("k", 5, DType::Float32).is_err());

        let column = categorical_column_with_hash_bucket("k", 5, DType::String).unwrap();
        let features = Features::new().with("k", DenseValue::int64(&[1], vec![3]).unwrap());
        assert!(matches!(
            sparse_ids(&column, &features),
            Err(LayerError::InvalidFeature { .. })
        ));
    }

    #[test]
    fn test_identity_column() {
        let column = categorical_column_with_identity("id", 4, None).unwrap();
        let features =
            Features::new().with("id", SparseValue::from_int64_rows(&[vec![0i64, 3], vec![2]]));
        let ids = sparse_ids(&column, &features).unwrap();
        assert_eq!(ids.values().as_int64().unwrap(), &[0, 3, 2]);

        let features = Features::new().with("id", SparseValue::from_int64_rows(&[vec![7i64]]));
        assert!(matches!(
            sparse_ids(&column, &features),
            Err(LayerError::InvalidFeature { .. })
        ));

        let column = categorical_column_with_identity("id", 4, Some(0)).unwrap();
        let ids = sparse_ids(&column, &features).unwrap();
        assert_eq!(ids.values().as_int64().unwrap(), &[0]);
    }

    #[test]
    fn test_identity_validation() {
        assert!(categorical_column_with_identity("id", 0, None).is_err());
        assert!(categorical_column_with_identity("id", 3, Some(3)).is_err());
        assert!(categorical_column_with_identity("id", 3, Some(-1)).is_err());
    }

    #[test]
    fn test_vocabulary_list_lookup() {
        let column = categorical_column_with_vocabulary_list("color", vec!["R", "G", "B"]).unwrap();
        assert_eq!(column.num_buckets(), 3);
        let features = Features::new().with(
            "color",
            SparseValue::from_string_rows(&[vec!["G", "X"], vec!["B"]]),
        );
        let ids = sparse_ids(&column, &features).unwrap();
        assert_eq!(ids.values().as_int64().unwrap(), &[1, -1, 2]);

        let column = categorical_column_with_vocabulary_list("color", vec!["R", "G", "B"])
            .unwrap()
            .with_default_value(0)
            .unwrap();
        let ids = sparse_ids(&column, &features).unwrap();
        assert_eq!(ids.values().as_int64().unwrap(), &[1, 0, 2]);
    }

    #[test]
    fn test_vocabulary_list_oov_buckets() {
        let column = categorical_column_with_vocabulary_list("color", vec!["R", "G"])
            .unwrap()
            .with_num_oov_buckets(3)
            .unwrap();
        assert_eq!(column.num_buckets(), 5);
        let features =
            Features::new().with("color", SparseValue::from_string_rows(&[vec!["purple", "R"]]));
        let ids = sparse_ids(&column, &features).unwrap();
        let data = ids.values().as_int64().unwrap();
        assert_eq!(data[0], 2 + hash_bucket("purple", 3));
        assert_eq!(data[1], 0);
    }

    #[test]
    fn test_vocabulary_list_int_vocabulary() {
        let column = categorical_column_with_vocabulary_list("code", vec![10i64, 20, 30]).unwrap();
        let features = Features::new().with("code", DenseValue::int64(&[3], vec![30, 10, 5]).unwrap());
        let ids = sparse_ids(&column, &features).unwrap();
        assert_eq!(ids.values().as_int64().unwrap(), &[2, 0, -1]);
    }

    #[test]
    fn test_vocabulary_list_validation() {
        let empty: Vec<&str> = Vec::new();
        assert!(categorical_column_with_vocabulary_list("k", empty).is_err());
        assert!(categorical_column_with_vocabulary_list("k", vec!["a", "a"]).is_err());

        let column = categorical_column_with_vocabulary_list("k", vec!["a"])
            .unwrap()
            .with_default_value(0)
            .unwrap();
        assert!(column.with_num_oov_buckets(1).is_err());

        let column = categorical_column_with_vocabulary_list("k", vec!["a"])
            .unwrap()
            .with_num_oov_buckets(1)
            .unwrap();
        assert!(column.with_default_value(0).is_err());
    }

    #[test]
    fn test_categorical_columns_are_not_dense() {
        let column = categorical_column_with_hash_bucket("k", 5, DType::String).unwrap();
        assert!(column.as_dense().is_none());
        assert!(column.as_categorical().is_some());
    }
}
