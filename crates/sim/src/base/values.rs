//! Per-sample parameter values.
//!
//! Simulation parameters are vectorized: one value per parameter sample, so
//! a whole batch of differently parameterized replicates can be configured at
//! once. A [`Vectorized`] value is either a scalar broadcast to every sample,
//! an explicit list, or a draw from a [`ValueGenerator`].

use crate::errors::{BuilderError, ValueError};
use rand::distr::Uniform;
use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal};
use serde::{Deserialize, Serialize};

/// Simple parametric generators for parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueGenerator {
    /// Uniform on `[min, max)`.
    Uniform { min: f64, max: f64 },
    Exponential { rate: f64 },
    Gamma { shape: f64, scale: f64 },
    Normal { mean: f64, sd: f64 },
    LogNormal { meanlog: f64, sdlog: f64 },
}

impl ValueGenerator {
    /// Draw `n` independent values.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>, ValueError> {
        let invalid = |distribution: &'static str, message: String| ValueError::InvalidParameter {
            distribution,
            message,
        };

        let values = match *self {
            Self::Uniform { min, max } => {
                let dist = Uniform::new(min, max)
                    .map_err(|e| invalid("uniform", format!("[{min}, {max}): {e}")))?;
                dist.sample_iter(rng).take(n).collect()
            }
            Self::Exponential { rate } => {
                let dist =
                    Exp::new(rate).map_err(|e| invalid("exponential", format!("rate {rate}: {e}")))?;
                dist.sample_iter(rng).take(n).collect()
            }
            Self::Gamma { shape, scale } => {
                let dist = Gamma::new(shape, scale).map_err(|e| {
                    invalid("gamma", format!("shape {shape}, scale {scale}: {e}"))
                })?;
                dist.sample_iter(rng).take(n).collect()
            }
            Self::Normal { mean, sd } => {
                let dist = Normal::new(mean, sd)
                    .map_err(|e| invalid("normal", format!("mean {mean}, sd {sd}: {e}")))?;
                dist.sample_iter(rng).take(n).collect()
            }
            Self::LogNormal { meanlog, sdlog } => {
                let dist = LogNormal::new(meanlog, sdlog).map_err(|e| {
                    invalid("log_normal", format!("meanlog {meanlog}, sdlog {sdlog}: {e}"))
                })?;
                dist.sample_iter(rng).take(n).collect()
            }
        };

        Ok(values)
    }
}

/// A parameter given once, per sample, or as a draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Vectorized {
    Scalar(f64),
    List(Vec<f64>),
    Draw(ValueGenerator),
}

impl From<f64> for Vectorized {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for Vectorized {
    fn from(values: Vec<f64>) -> Self {
        Self::List(values)
    }
}

impl Vectorized {
    /// Resolve into the raw value list: scalars stay length 1, lists are
    /// returned as given, draws produce `n_samples` values.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        n_samples: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>, ValueError> {
        match self {
            Self::Scalar(v) => Ok(vec![*v]),
            Self::List(values) => Ok(values.clone()),
            Self::Draw(generator) => generator.sample(n_samples, rng),
        }
    }
}

/// Expand a length-1 vector to `n` copies, or check it already has `n` values.
pub fn broadcast<T: Clone>(
    parameter: &str,
    values: Vec<T>,
    n: usize,
) -> Result<Vec<T>, BuilderError> {
    match values.len() {
        len if len == n => Ok(values),
        1 => Ok(vec![values[0].clone(); n]),
        actual => Err(BuilderError::DimensionMismatch {
            parameter: parameter.to_string(),
            expected: n,
            actual,
        }),
    }
}

/// Interpret floating point values as non-negative integers.
pub fn to_integers(parameter: &str, values: &[f64]) -> Result<Vec<usize>, ValueError> {
    values
        .iter()
        .map(|&value| {
            if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
                Ok(value as usize)
            } else {
                Err(ValueError::NotAnInteger {
                    parameter: parameter.to_string(),
                    value,
                })
            }
        })
        .collect()
}
