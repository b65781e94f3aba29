//! Core value types and shared utilities for densefeat.
//!
//! This crate holds the input-side data model used by the feature layers in
//! `densefeat-layers`:
//!
//! - **Raw values**: dense and ragged sparse buffers of floats, integers or strings.
//! - **Feature mappings**: the keyed dictionary handed to a layer on each call.
//! - **Naming**: process-unique default names for layers.
//! - **Error types**: structured errors for value construction and conversion.
//!
//! # Example
//!
//! ```
//! use densefeat_core::value::{DenseValue, Features, SparseValue};
//!
//! let features = Features::new()
//!     .with("price", DenseValue::float64(&[2], vec![9.99, 4.5]).unwrap())
//!     .with("tags", SparseValue::from_string_rows(&[vec!["sale"], vec![]]));
//!
//! assert_eq!(features.len(), 2);
//! assert_eq!(features.get("tags").unwrap().batch_size(), Some(2));
//! ```
//!
//! # Modules
//!
//! - [`value`]: Raw dense/sparse values and the [`Features`] mapping.
//! - [`naming`]: Unique layer names.
//! - [`error`]: Error types for the library.

pub mod error;
pub mod naming;
pub mod value;

pub use error::{CoreError, CoreResult};
pub use naming::{to_snake_case, unique_name};
pub use value::{DType, DenseValue, FeatureValue, Features, SparseValue, Values};
