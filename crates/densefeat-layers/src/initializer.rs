//! Variable initializers for column state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, LayerResult};
use crate::tensor::Tensor;

/// Strategy used to fill a newly created variable.
///
/// Random variants take an optional seed. Seeded initializers always produce
/// the same values for the same shape; unseeded ones draw from OS entropy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "class_name", content = "config")]
pub enum Initializer {
    /// All zeros.
    #[default]
    Zeros,
    /// All ones.
    Ones,
    /// Constant value.
    Constant(f32),
    /// Uniform samples from `[min, max)`.
    RandomUniform {
        min: f32,
        max: f32,
        seed: Option<u64>,
    },
    /// Normal samples.
    RandomNormal {
        mean: f32,
        stddev: f32,
        seed: Option<u64>,
    },
    /// Normal samples, redrawn while more than two standard deviations from the mean.
    TruncatedNormal {
        mean: f32,
        stddev: f32,
        seed: Option<u64>,
    },
}

impl Initializer {
    /// Truncated normal with mean 0 and the given standard deviation.
    pub fn truncated_normal(stddev: f32) -> Self {
        Initializer::TruncatedNormal {
            mean: 0.0,
            stddev,
            seed: None,
        }
    }

    /// Returns a copy of this initializer with a fixed seed.
    ///
    /// Deterministic initializers are returned unchanged.
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            Initializer::RandomUniform { min, max, .. } => Initializer::RandomUniform {
                min,
                max,
                seed: Some(seed),
            },
            Initializer::RandomNormal { mean, stddev, .. } => Initializer::RandomNormal {
                mean,
                stddev,
                seed: Some(seed),
            },
            Initializer::TruncatedNormal { mean, stddev, .. } => Initializer::TruncatedNormal {
                mean,
                stddev,
                seed: Some(seed),
            },
            other => other,
        }
    }

    /// Creates a tensor of the given shape.
    pub fn initialize(&self, shape: &[usize]) -> LayerResult<Tensor> {
        let numel: usize = shape.iter().product();
        let data = match *self {
            Initializer::Zeros => vec![0.0; numel],
            Initializer::Ones => vec![1.0; numel],
            Initializer::Constant(value) => vec![value; numel],
            Initializer::RandomUniform { min, max, seed } => {
                if min >= max {
                    return Err(LayerError::config(format!(
                        "RandomUniform requires min < max, got [{}, {})",
                        min, max
                    )));
                }
                let mut rng = make_rng(seed);
                (0..numel).map(|_| rng.gen_range(min..max)).collect()
            }
            Initializer::RandomNormal { mean, stddev, seed } => {
                let normal = normal(mean, stddev)?;
                let mut rng = make_rng(seed);
                (0..numel).map(|_| normal.sample(&mut rng)).collect()
            }
            Initializer::TruncatedNormal { mean, stddev, seed } => {
                let normal = normal(mean, stddev)?;
                let mut rng = make_rng(seed);
                let bound = 2.0 * stddev;
                (0..numel)
                    .map(|_| loop {
                        let x: f32 = normal.sample(&mut rng);
                        if (x - mean).abs() <= bound {
                            break x;
                        }
                    })
                    .collect()
            }
        };
        Ok(Tensor::from_data(shape, data))
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn normal(mean: f32, stddev: f32) -> LayerResult<Normal<f32>> {
    Normal::new(mean, stddev).map_err(|e| {
        LayerError::config(format!("Invalid normal distribution ({}, {}): {}", mean, stddev, e))
    })
}
