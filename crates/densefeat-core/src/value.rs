//! Raw feature values fed to feature layers.
//!
//! This module provides the input-side data model: the typed buffers that a
//! caller places in a [`Features`] mapping before invoking a layer.
//!
//! # Overview
//!
//! - [`DType`]: The element type of a raw buffer.
//! - [`Values`]: A flat, typed buffer of elements.
//! - [`DenseValue`]: A fully-populated raw tensor with an explicit shape.
//! - [`SparseValue`]: A ragged batch where each example owns a variable number of values.
//! - [`FeatureValue`]: Either of the two representations above.
//! - [`Features`]: The mapping from feature key to [`FeatureValue`].

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// The element type of a raw value buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// 64-bit signed integer.
    Int64,
    /// UTF-8 string.
    String,
}

impl DType {
    /// Returns whether values of this dtype can be cast to `f32`.
    pub fn is_numeric(self) -> bool {
        !matches!(self, DType::String)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int64 => "int64",
            DType::String => "string",
        };
        f.write_str(name)
    }
}

/// A flat buffer of typed elements in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "data", rename_all = "snake_case")]
pub enum Values {
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
    /// 64-bit integers.
    Int64(Vec<i64>),
    /// Strings.
    String(Vec<String>),
}

impl Values {
    /// Creates an empty buffer of the given dtype.
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Float32 => Values::Float32(Vec::new()),
            DType::Float64 => Values::Float64(Vec::new()),
            DType::Int64 => Values::Int64(Vec::new()),
            DType::String => Values::String(Vec::new()),
        }
    }

    /// Returns the dtype of this buffer.
    pub fn dtype(&self) -> DType {
        match self {
            Values::Float32(_) => DType::Float32,
            Values::Float64(_) => DType::Float64,
            Values::Int64(_) => DType::Int64,
            Values::String(_) => DType::String,
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            Values::Float32(v) => v.len(),
            Values::Float64(v) => v.len(),
            Values::Int64(v) => v.len(),
            Values::String(v) => v.len(),
        }
    }

    /// Returns true if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Casts every element to `f32`.
    ///
    /// Returns an error for string buffers.
    pub fn to_f32(&self) -> CoreResult<Vec<f32>> {
        match self {
            Values::Float32(v) => Ok(v.clone()),
            Values::Float64(v) => Ok(v.iter().map(|&x| x as f32).collect()),
            Values::Int64(v) => Ok(v.iter().map(|&x| x as f32).collect()),
            Values::String(_) => Err(CoreError::NotNumeric {
                dtype: DType::String,
            }),
        }
    }

    /// Returns the elements as integers.
    pub fn as_int64(&self) -> CoreResult<&[i64]> {
        match self {
            Values::Int64(v) => Ok(v),
            other => Err(CoreError::DTypeMismatch {
                expected: DType::Int64,
                actual: other.dtype(),
            }),
        }
    }

    /// Returns the elements as strings.
    pub fn as_strings(&self) -> CoreResult<&[String]> {
        match self {
            Values::String(v) => Ok(v),
            other => Err(CoreError::DTypeMismatch {
                expected: DType::String,
                actual: other.dtype(),
            }),
        }
    }

    /// Appends all elements of `other`, which must share this buffer's dtype.
    pub fn extend(&mut self, other: &Values) -> CoreResult<()> {
        match (self, other) {
            (Values::Float32(a), Values::Float32(b)) => a.extend_from_slice(b),
            (Values::Float64(a), Values::Float64(b)) => a.extend_from_slice(b),
            (Values::Int64(a), Values::Int64(b)) => a.extend_from_slice(b),
            (Values::String(a), Values::String(b)) => a.extend_from_slice(b),
            (this, other) => {
                return Err(CoreError::DTypeMismatch {
                    expected: this.dtype(),
                    actual: other.dtype(),
                })
            }
        }
        Ok(())
    }

    /// Returns a copy of the elements in `range`.
    pub fn slice(&self, range: Range<usize>) -> Values {
        match self {
            Values::Float32(v) => Values::Float32(v[range].to_vec()),
            Values::Float64(v) => Values::Float64(v[range].to_vec()),
            Values::Int64(v) => Values::Int64(v[range].to_vec()),
            Values::String(v) => Values::String(v[range].to_vec()),
        }
    }

    /// Returns the elements at `indices`, in order.
    fn gather(&self, indices: &[usize]) -> Values {
        match self {
            Values::Float32(v) => Values::Float32(indices.iter().map(|&i| v[i]).collect()),
            Values::Float64(v) => Values::Float64(indices.iter().map(|&i| v[i]).collect()),
            Values::Int64(v) => Values::Int64(indices.iter().map(|&i| v[i]).collect()),
            Values::String(v) => Values::String(indices.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    /// Whether the element at `idx` marks a missing entry in a dense input.
    ///
    /// Missing strings are empty; missing numbers are `-1`.
    fn is_ignored(&self, idx: usize) -> bool {
        match self {
            Values::Float32(v) => v[idx] == -1.0,
            Values::Float64(v) => v[idx] == -1.0,
            Values::Int64(v) => v[idx] == -1,
            Values::String(v) => v[idx].is_empty(),
        }
    }
}

/// A dense raw tensor.
///
/// Values are stored in row-major order; the first dimension is the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseValue {
    shape: Vec<usize>,
    values: Values,
}

impl DenseValue {
    /// Creates a dense value, checking that `values` fills `shape`.
    ///
    /// # Examples
    ///
    /// ```
    /// use densefeat_core::value::{DenseValue, Values};
    ///
    /// let price = DenseValue::new(&[2, 1], Values::Float64(vec![1.5, 2.5])).unwrap();
    /// assert_eq!(price.batch_size(), Some(2));
    /// assert!(DenseValue::new(&[3], Values::Int64(vec![1])).is_err());
    /// ```
    pub fn new(shape: &[usize], values: Values) -> CoreResult<Self> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(CoreError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            values,
        })
    }

    /// Creates a float32 dense value.
    pub fn float32(shape: &[usize], data: Vec<f32>) -> CoreResult<Self> {
        Self::new(shape, Values::Float32(data))
    }

    /// Creates a float64 dense value.
    pub fn float64(shape: &[usize], data: Vec<f64>) -> CoreResult<Self> {
        Self::new(shape, Values::Float64(data))
    }

    /// Creates an int64 dense value.
    pub fn int64(shape: &[usize], data: Vec<i64>) -> CoreResult<Self> {
        Self::new(shape, Values::Int64(data))
    }

    /// Creates a string dense value.
    pub fn strings<S: Into<String>>(shape: &[usize], data: Vec<S>) -> CoreResult<Self> {
        Self::new(
            shape,
            Values::String(data.into_iter().map(Into::into).collect()),
        )
    }

    /// Returns the shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the underlying buffer.
    #[inline]
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Returns the dtype of the underlying buffer.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Returns the number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns the size of the first dimension, if any.
    #[inline]
    pub fn batch_size(&self) -> Option<usize> {
        self.shape.first().copied()
    }

    /// Consumes the value, returning its buffer.
    pub fn into_values(self) -> Values {
        self.values
    }

    /// Expands a rank-1 value of shape `[n]` to `[n, 1]`.
    ///
    /// Values of any other rank are returned unchanged.
    pub fn expand_rank(self) -> Self {
        if self.shape.len() == 1 {
            Self {
                shape: vec![self.shape[0], 1],
                values: self.values,
            }
        } else {
            self
        }
    }

    /// Converts to a sparse value, dropping missing entries.
    ///
    /// Trailing dimensions are flattened per example. Empty strings and `-1`
    /// numbers are treated as missing.
    pub fn to_sparse(&self) -> CoreResult<SparseValue> {
        if self.rank() < 2 {
            return Err(CoreError::InvalidRank {
                min: 2,
                rank: self.rank(),
            });
        }
        let batch_size = self.shape[0];
        let row_len: usize = self.shape[1..].iter().product();

        let mut kept = Vec::with_capacity(self.values.len());
        let mut offsets = Vec::with_capacity(batch_size + 1);
        offsets.push(0);
        for row in 0..batch_size {
            for idx in row * row_len..(row + 1) * row_len {
                if !self.values.is_ignored(idx) {
                    kept.push(idx);
                }
            }
            offsets.push(kept.len());
        }

        Ok(SparseValue {
            values: self.values.gather(&kept),
            offsets,
        })
    }
}

/// A sparse raw tensor.
///
/// Each example owns a contiguous, possibly empty, run of values. Row `i`
/// spans `values[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseValue {
    values: Values,
    offsets: Vec<usize>,
}

impl SparseValue {
    /// Creates an empty sparse value of the given dtype.
    ///
    /// # Examples
    ///
    /// ```
    /// use densefeat_core::value::{DType, SparseValue, Values};
    ///
    /// let mut tags = SparseValue::new(DType::String);
    /// tags.push_example(&Values::String(vec!["a".into(), "b".into()])).unwrap();
    /// tags.push_example(&Values::String(vec![])).unwrap();
    /// assert_eq!(tags.batch_size(), 2);
    /// assert_eq!(tags.offsets(), &[0, 2, 2]);
    /// ```
    pub fn new(dtype: DType) -> Self {
        Self {
            values: Values::empty(dtype),
            offsets: vec![0],
        }
    }

    /// Creates a sparse value from a buffer and row offsets.
    pub fn from_parts(values: Values, offsets: Vec<usize>) -> CoreResult<Self> {
        if offsets.first() != Some(&0) {
            return Err(CoreError::InvalidOffsets {
                message: "offsets must start at 0".to_string(),
            });
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(CoreError::InvalidOffsets {
                message: "offsets must be non-decreasing".to_string(),
            });
        }
        let last = offsets[offsets.len() - 1];
        if last != values.len() {
            return Err(CoreError::InvalidOffsets {
                message: format!(
                    "last offset {} does not match {} values",
                    last,
                    values.len()
                ),
            });
        }
        Ok(Self { values, offsets })
    }

    /// Creates an int64 sparse value with one row per slice.
    pub fn from_int64_rows<R: AsRef<[i64]>>(rows: &[R]) -> Self {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        for row in rows {
            data.extend_from_slice(row.as_ref());
            offsets.push(data.len());
        }
        Self {
            values: Values::Int64(data),
            offsets,
        }
    }

    /// Creates a string sparse value with one row per slice.
    pub fn from_string_rows<R, S>(rows: &[R]) -> Self
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        for row in rows {
            data.extend(row.as_ref().iter().map(|s| s.as_ref().to_string()));
            offsets.push(data.len());
        }
        Self {
            values: Values::String(data),
            offsets,
        }
    }

    /// Appends one example.
    pub fn push_example(&mut self, values: &Values) -> CoreResult<()> {
        self.values.extend(values)?;
        self.offsets.push(self.values.len());
        Ok(())
    }

    /// Returns all values.
    #[inline]
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Returns the row offsets.
    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Returns the dtype of the values.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Returns the number of examples.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Returns the index range of the given example.
    pub fn row_range(&self, row: usize) -> CoreResult<Range<usize>> {
        if row >= self.batch_size() {
            return Err(CoreError::RowOutOfBounds {
                row,
                batch_size: self.batch_size(),
            });
        }
        Ok(self.offsets[row]..self.offsets[row + 1])
    }

    /// Returns an iterator over the index range of every example.
    pub fn rows(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.offsets.windows(2).map(|w| w[0]..w[1])
    }
}

/// A raw input feature, either dense or sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    /// A fully-populated tensor.
    Dense(DenseValue),
    /// A ragged batch.
    Sparse(SparseValue),
}

impl FeatureValue {
    /// Returns the dtype of the underlying buffer.
    pub fn dtype(&self) -> DType {
        match self {
            FeatureValue::Dense(v) => v.dtype(),
            FeatureValue::Sparse(v) => v.dtype(),
        }
    }

    /// Returns the number of examples, if known.
    pub fn batch_size(&self) -> Option<usize> {
        match self {
            FeatureValue::Dense(v) => v.batch_size(),
            FeatureValue::Sparse(v) => Some(v.batch_size()),
        }
    }

    /// Returns true for sparse values.
    pub fn is_sparse(&self) -> bool {
        matches!(self, FeatureValue::Sparse(_))
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FeatureValue::Dense(v) => format!("dense {} tensor of shape {:?}", v.dtype(), v.shape()),
            FeatureValue::Sparse(v) => {
                format!("sparse {} tensor with {} rows", v.dtype(), v.batch_size())
            }
        }
    }

    /// Converts to a sparse value, dropping missing entries of dense inputs.
    pub fn to_sparse(&self) -> CoreResult<SparseValue> {
        match self {
            FeatureValue::Dense(v) => v.to_sparse(),
            FeatureValue::Sparse(v) => Ok(v.clone()),
        }
    }
}

impl From<DenseValue> for FeatureValue {
    fn from(value: DenseValue) -> Self {
        FeatureValue::Dense(value)
    }
}

impl From<SparseValue> for FeatureValue {
    fn from(value: SparseValue) -> Self {
        FeatureValue::Sparse(value)
    }
}

/// A mapping from feature key to raw value.
///
/// This is the input dictionary handed to a feature layer on each call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    values: HashMap<String, FeatureValue>,
}

impl Features {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a feature, returning the previous value for the key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FeatureValue>,
    ) -> Option<FeatureValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a feature by key.
    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.values.get(key)
    }

    /// Returns whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the number of features.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no features.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Features
where
    K: Into<String>,
    V: Into<FeatureValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_value_shape_check() {
        let value = DenseValue::float32(&[2, 3], vec![0.0; 6]).unwrap();
        assert_eq!(value.shape(), &[2, 3]);
        assert_eq!(value.rank(), 2);
        assert_eq!(value.batch_size(), Some(2));

        let err = DenseValue::int64(&[2, 2], vec![1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_expand_rank() {
        let value = DenseValue::float64(&[3], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(value.expand_rank().shape(), &[3, 1]);

        let value = DenseValue::float64(&[3, 2], vec![0.0; 6]).unwrap();
        assert_eq!(value.expand_rank().shape(), &[3, 2]);
    }

    #[test]
    fn test_values_cast() {
        let values = Values::Int64(vec![1, -2, 3]);
        assert_eq!(values.to_f32().unwrap(), vec![1.0, -2.0, 3.0]);

        let values = Values::Float64(vec![0.5]);
        assert_eq!(values.to_f32().unwrap(), vec![0.5]);

        let values = Values::String(vec!["a".to_string()]);
        assert!(matches!(
            values.to_f32(),
            Err(CoreError::NotNumeric { .. })
        ));
        assert!(values.as_int64().is_err());
        assert_eq!(values.as_strings().unwrap(), &["a".to_string()]);
    }

    #[test]
    fn test_dense_to_sparse_drops_missing() {
        let value =
            DenseValue::strings(&[3, 2], vec!["a", "", "", "", "b", "c"]).unwrap();
        let sparse = value.to_sparse().unwrap();
        assert_eq!(sparse.batch_size(), 3);
        assert_eq!(sparse.offsets(), &[0, 1, 1, 3]);
        assert_eq!(
            sparse.values().as_strings().unwrap(),
            &["a".to_string(), "b".to_string(), "c".to_string()]
        );

        let value = DenseValue::int64(&[2, 2], vec![3, -1, -1, 7]).unwrap();
        let sparse = value.to_sparse().unwrap();
        assert_eq!(sparse.offsets(), &[0, 1, 2]);
        assert_eq!(sparse.values().as_int64().unwrap(), &[3, 7]);
    }

    #[test]
    fn test_dense_to_sparse_requires_rank_two() {
        let value = DenseValue::int64(&[2], vec![1, 2]).unwrap();
        assert!(matches!(
            value.to_sparse(),
            Err(CoreError::InvalidRank { min: 2, rank: 1 })
        ));
    }

    #[test]
    fn test_sparse_push_example() {
        let mut sparse = SparseValue::new(DType::Int64);
        sparse.push_example(&Values::Int64(vec![1, 2])).unwrap();
        sparse.push_example(&Values::Int64(vec![])).unwrap();
        sparse.push_example(&Values::Int64(vec![3])).unwrap();

        assert_eq!(sparse.batch_size(), 3);
        assert_eq!(sparse.offsets(), &[0, 2, 2, 3]);
        assert_eq!(sparse.row_range(2).unwrap(), 2..3);
        assert!(sparse.row_range(3).is_err());

        let err = sparse
            .push_example(&Values::String(vec!["x".to_string()]))
            .unwrap_err();
        assert!(matches!(err, CoreError::DTypeMismatch { .. }));
    }

    #[test]
    fn test_sparse_from_parts_validation() {
        assert!(SparseValue::from_parts(Values::Int64(vec![1, 2]), vec![0, 1, 2]).is_ok());
        assert!(SparseValue::from_parts(Values::Int64(vec![1, 2]), vec![1, 2]).is_err());
        assert!(SparseValue::from_parts(Values::Int64(vec![1, 2]), vec![0, 2, 1]).is_err());
        assert!(SparseValue::from_parts(Values::Int64(vec![1, 2]), vec![0, 1]).is_err());
    }

    #[test]
    fn test_sparse_row_helpers() {
        let sparse = SparseValue::from_string_rows(&[vec!["a", "b"], vec![], vec!["c"]]);
        let rows: Vec<_> = sparse.rows().collect();
        assert_eq!(rows, vec![0..2, 2..2, 2..3]);

        let ints = SparseValue::from_int64_rows(&[[4i64, 5], [6, 7]]);
        assert_eq!(ints.batch_size(), 2);
        assert_eq!(ints.values().as_int64().unwrap(), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_features_mapping() {
        let features = Features::new()
            .with("price", DenseValue::float32(&[2], vec![1.0, 2.0]).unwrap())
            .with("tags", SparseValue::from_string_rows(&[vec!["x"], vec![]]));

        assert_eq!(features.len(), 2);
        assert!(features.contains_key("price"));
        assert!(features.get("tags").unwrap().is_sparse());
        assert_eq!(features.get("price").unwrap().batch_size(), Some(2));
        assert!(features.get("missing").is_none());
    }

    #[test]
    fn test_features_serde_round_trip() {
        let features: Features = [("id", DenseValue::int64(&[1, 1], vec![9]).unwrap())]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&features).unwrap();
        let back: Features = serde_json::from_str(&json).unwrap();
        assert_eq!(back, features);
    }
}
