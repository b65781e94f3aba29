//! Feature columns and the `DenseFeatures` input layer.
//!
//! This crate turns a mapping of raw named features into the dense matrix a
//! model consumes as its input. It includes:
//!
//! - **Feature columns**: numeric, bucketized, hashed, identity and
//!   vocabulary-list columns, plus embedding and indicator wrappers that make
//!   categorical columns dense
//! - **DenseFeatures**: the layer that resolves every column and concatenates
//!   the results along the last axis
//! - **State**: embedding tables and other column variables, created once when
//!   a layer is built
//! - **Transformation cache**: per-call memoization shared between columns
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use densefeat_layers::prelude::*;
//!
//! let colors = categorical_column_with_vocabulary_list("color", vec!["R", "G", "B"]).unwrap();
//! let columns: Vec<ColumnRef> = vec![
//!     Arc::new(numeric_column("price")),
//!     Arc::new(indicator_column(colors)),
//! ];
//! let layer = DenseFeatures::new(columns).unwrap();
//!
//! let features = Features::new()
//!     .with("price", DenseValue::float32(&[2], vec![9.5, 3.0]).unwrap())
//!     .with("color", SparseValue::from_string_rows(&[vec!["G"], vec!["R", "B"]]));
//!
//! let output = layer.call(&features, None).unwrap();
//! assert_eq!(output.shape(), &[2, 4]);
//! assert_eq!(output.row(1), &[3.0, 1.0, 0.0, 1.0]);
//! ```
//!
//! # Collecting Per-Column Outputs
//!
//! ```
//! use std::sync::Arc;
//!
//! use densefeat_layers::prelude::*;
//!
//! let layer = DenseFeatures::new(vec![Arc::new(numeric_column("x"))]).unwrap();
//! let features = Features::new().with("x", DenseValue::int64(&[3], vec![1, 2, 3]).unwrap());
//!
//! let mut outputs = ColumnTensors::new();
//! layer.call(&features, Some(&mut outputs)).unwrap();
//! assert_eq!(outputs["x"].shape(), &[3, 1]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod column;
pub mod dense_features;
pub mod error;
pub mod features_layer;
pub mod initializer;
pub mod layer;
pub mod state;
pub mod tensor;

// Re-export main types at crate level
pub use cache::TransformationCache;
pub use column::{
    bucketized_column, categorical_column_with_hash_bucket, categorical_column_with_identity,
    categorical_column_with_vocabulary_list, embedding_column, indicator_column, numeric_column,
    CategoricalColumn, ColumnConfig, ColumnRef, Combiner, DenseColumn, FeatureColumn, Normalizer,
};
pub use dense_features::{ColumnTensors, DenseFeatures, DenseFeaturesConfig, LayerInput};
pub use error::{LayerError, LayerResult};
pub use features_layer::{BaseFeaturesLayer, ColumnKind};
pub use initializer::Initializer;
pub use layer::{Layer, LayerOptions};
pub use state::{StateManager, Variable};
pub use tensor::Tensor;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```
/// use densefeat_layers::prelude::*;
/// ```
pub mod prelude {
    pub use crate::column::{
        bucketized_column, categorical_column_with_hash_bucket, categorical_column_with_identity,
        categorical_column_with_vocabulary_list, embedding_column, indicator_column,
        numeric_column, CategoricalColumn, ColumnRef, Combiner, DenseColumn, FeatureColumn,
        Normalizer,
    };
    pub use crate::dense_features::{ColumnTensors, DenseFeatures};
    pub use crate::error::{LayerError, LayerResult};
    pub use crate::initializer::Initializer;
    pub use crate::layer::{Layer, LayerOptions};
    pub use crate::tensor::Tensor;
    pub use densefeat_core::value::{DType, DenseValue, FeatureValue, Features, SparseValue};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_prelude_imports() {
        // Test that all types are accessible through prelude
        let _tensor = Tensor::zeros(&[2, 2]);
        let _features = Features::new();
        let _options = LayerOptions::default();
        let _init = Initializer::truncated_normal(0.1);
    }

    #[test]
    fn test_column_composition() {
        let ids = categorical_column_with_hash_bucket("kw", 10, DType::String).unwrap();
        let age = bucketized_column(numeric_column("age"), vec![18.0, 65.0]).unwrap();
        let columns: Vec<ColumnRef> = vec![
            Arc::new(embedding_column(ids, 3).unwrap().with_combiner(Combiner::Sum)),
            Arc::new(age),
        ];
        let layer = DenseFeatures::new(columns).unwrap();
        assert_eq!(layer.output_dim(), 6);
        assert_eq!(layer.weights().len(), 1);
    }
}
