//! Error types for the densefeat core library.
//!
//! This module defines the errors raised while constructing and converting
//! raw feature values, before any column logic is involved.

use thiserror::Error;

use crate::value::DType;

/// The main error type for densefeat-core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The number of values does not match the requested shape.
    #[error("Shape {shape:?} requires {expected} values, got {actual}")]
    ShapeMismatch {
        /// The requested shape.
        shape: Vec<usize>,
        /// The number of elements implied by the shape.
        expected: usize,
        /// The number of values that were provided.
        actual: usize,
    },

    /// A value buffer had an unexpected element type.
    #[error("Dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch {
        /// The dtype that was required.
        expected: DType,
        /// The dtype that was provided.
        actual: DType,
    },

    /// A raw value cannot be used with the requested rank.
    #[error("Invalid rank: expected at least {min}, got {rank}")]
    InvalidRank {
        /// The minimum accepted rank.
        min: usize,
        /// The actual rank.
        rank: usize,
    },

    /// A row index fell outside a sparse value.
    #[error("Row out of bounds: row {row}, batch size {batch_size}")]
    RowOutOfBounds {
        /// The requested row.
        row: usize,
        /// The number of rows available.
        batch_size: usize,
    },

    /// Sparse row offsets do not describe the value buffer.
    #[error("Invalid sparse offsets: {message}")]
    InvalidOffsets {
        /// Description of the inconsistency.
        message: String,
    },

    /// The value cannot be converted to a numeric type.
    #[error("Cannot convert {dtype} values to a numeric type")]
    NotNumeric {
        /// The dtype of the offending buffer.
        dtype: DType,
    },
}

/// A specialized Result type for densefeat-core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ShapeMismatch {
            shape: vec![2, 3],
            expected: 6,
            actual: 5,
        };
        assert_eq!(err.to_string(), "Shape [2, 3] requires 6 values, got 5");

        let err = CoreError::DTypeMismatch {
            expected: DType::Int64,
            actual: DType::String,
        };
        assert_eq!(err.to_string(), "Dtype mismatch: expected int64, got string");

        let err = CoreError::InvalidRank { min: 1, rank: 0 };
        assert_eq!(err.to_string(), "Invalid rank: expected at least 1, got 0");

        let err = CoreError::NotNumeric {
            dtype: DType::String,
        };
        assert!(err.to_string().contains("string"));
    }
}
