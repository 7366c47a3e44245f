//! First-class probability distributions.
//!
//! The same closed set serves three roles: priors at latent points,
//! likelihoods at observation points, and proposals received from a trained
//! amortization network. The serde representation is the wire format.

use rand::distributions::Distribution as _;
use rand::distributions::{Uniform as RandUniform, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::ModelError;

/// A probability distribution over JSON values.
///
/// `Normal` and `Uniform` produce numbers; `Categorical` produces an index
/// into its probability vector. Probabilities need not be normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Gaussian with the given mean and standard deviation.
    Normal { mean: f64, stddev: f64 },
    /// Continuous uniform on `[low, high)`.
    Uniform { low: f64, high: f64 },
    /// Discrete distribution over indices `0..probs.len()`.
    Categorical { probs: Vec<f64> },
}

impl Distribution {
    /// Draw one value using the given RNG.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<serde_json::Value, ModelError> {
        match self {
            Distribution::Normal { mean, stddev } => {
                check_stddev(*stddev)?;
                let normal = rand_distr::Normal::new(*mean, *stddev)
                    .map_err(|e| ModelError::Distribution(format!("Normal({mean}, {stddev}): {e}")))?;
                Ok(serde_json::Value::from(normal.sample(rng)))
            }
            Distribution::Uniform { low, high } => {
                check_bounds(*low, *high)?;
                let uniform = RandUniform::new(*low, *high);
                Ok(serde_json::Value::from(uniform.sample(rng)))
            }
            Distribution::Categorical { probs } => {
                let weighted = WeightedIndex::new(probs.iter().copied())
                    .map_err(|e| ModelError::Distribution(format!("Categorical: {e}")))?;
                Ok(serde_json::Value::from(weighted.sample(rng) as u64))
            }
        }
    }

    /// Log-density (continuous) or log-mass (discrete) of `value`.
    ///
    /// Values outside the support score `-inf`; that is a valid weight
    /// contribution, not an error.
    pub fn log_prob(&self, value: &serde_json::Value) -> Result<f64, ModelError> {
        match self {
            Distribution::Normal { mean, stddev } => {
                check_stddev(*stddev)?;
                let x = numeric(value)?;
                let z = (x - mean) / stddev;
                Ok(-0.5 * z * z - stddev.ln() - 0.5 * std::f64::consts::TAU.ln())
            }
            Distribution::Uniform { low, high } => {
                check_bounds(*low, *high)?;
                let x = numeric(value)?;
                if x >= *low && x < *high {
                    Ok(-(high - low).ln())
                } else {
                    Ok(f64::NEG_INFINITY)
                }
            }
            Distribution::Categorical { probs } => {
                let total = check_probs(probs)?;
                let index = value.as_u64().ok_or_else(|| {
                    ModelError::Distribution(format!("Expected a categorical index, got {value}"))
                })? as usize;
                match probs.get(index) {
                    Some(p) if *p > 0.0 => Ok((p / total).ln()),
                    _ => Ok(f64::NEG_INFINITY),
                }
            }
        }
    }
}

pub(crate) fn numeric(value: &serde_json::Value) -> Result<f64, ModelError> {
    value
        .as_f64()
        .ok_or_else(|| ModelError::Distribution(format!("Expected a numeric value, got {value}")))
}

fn check_stddev(stddev: f64) -> Result<(), ModelError> {
    if stddev > 0.0 && stddev.is_finite() {
        Ok(())
    } else {
        Err(ModelError::Distribution(format!(
            "Standard deviation must be finite and positive, got {stddev}"
        )))
    }
}

fn check_bounds(low: f64, high: f64) -> Result<(), ModelError> {
    if low < high {
        Ok(())
    } else {
        Err(ModelError::Distribution(format!(
            "Uniform bounds must satisfy low < high, got [{low}, {high})"
        )))
    }
}

fn check_probs(probs: &[f64]) -> Result<f64, ModelError> {
    if probs.is_empty() {
        return Err(ModelError::Distribution("Categorical needs at least one probability".into()));
    }
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(ModelError::Distribution(
            "Categorical probabilities must be finite and non-negative".into(),
        ));
    }
    let total: f64 = probs.iter().sum();
    if total > 0.0 {
        Ok(total)
    } else {
        Err(ModelError::Distribution("Categorical probabilities sum to zero".into()))
    }
}
