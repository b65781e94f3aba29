//! Error types for the densefeat-layers crate.
//!
//! This module defines error types for feature columns and feature layers,
//! including invalid inputs, shape mismatches and variable management failures.

use densefeat_core::CoreError;
use thiserror::Error;

/// Error type for layer operations.
#[derive(Debug, Error)]
pub enum LayerError {
    /// The layer was called with something other than a feature mapping.
    #[error("Expected a feature mapping here, instead got: {got}")]
    InvalidInput {
        /// Description of what was received
        got: String,
    },

    /// A feature key is absent from the input mapping.
    #[error("Feature {key} is not in features dictionary")]
    MissingFeature {
        /// The missing key
        key: String,
    },

    /// A column lacks the capability required by the layer.
    #[error("Items of feature_columns must be a {expected}. Given (type {column_type}): {column}")]
    InvalidColumn {
        /// Name of the rejected column
        column: String,
        /// Concrete type of the rejected column
        column_type: String,
        /// The required capability
        expected: String,
    },

    /// Shape mismatch between expected and actual tensor shapes.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape
        expected: Vec<usize>,
        /// The actual shape that was provided
        actual: Vec<usize>,
    },

    /// Columns produced tensors with different batch sizes.
    #[error(
        "Batch size (first dimension) of each feature must be same. \
         Batch size of columns ({names}): ({counts})",
        names = .columns.join(", "),
        counts = .sizes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    BatchSizeMismatch {
        /// Column names, in layer order
        columns: Vec<String>,
        /// Batch size of each column's tensor
        sizes: Vec<usize>,
    },

    /// A raw feature has a value type the column cannot handle.
    #[error("Invalid feature {key}: {message}")]
    InvalidFeature {
        /// The feature key
        key: String,
        /// Description of the problem
        message: String,
    },

    /// A variable was created twice for the same column.
    #[error("Variable already exists: {column}/{name}")]
    VariableExists {
        /// Owning column
        column: String,
        /// Variable name
        name: String,
    },

    /// A variable was requested before being created.
    #[error("Variable does not exist: {column}/{name}")]
    VariableNotFound {
        /// Owning column
        column: String,
        /// Variable name
        name: String,
    },

    /// Configuration error for a column or layer.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Embedding lookup error.
    #[error("Embedding lookup error: {message}")]
    EmbeddingError {
        /// Description of the embedding error
        message: String,
    },

    /// Error raised while handling raw values.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl LayerError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        LayerError::ConfigError {
            message: message.into(),
        }
    }
}

/// Result type alias for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;
