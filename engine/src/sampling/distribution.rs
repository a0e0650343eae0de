//! Marginal distributions
//!
//! Every family samples by inverse transform, so a single uniform (or a
//! correlated standard normal) maps to exactly one value. That keeps the
//! number of draws per run fixed and runs reproducible.

use crate::rng::RngManager;
use crate::sampling::special::{
    bisect_quantile, normal_cdf, normal_quantile, regularized_incomplete_beta,
};
use serde::{Deserialize, Serialize};

/// Probability floor used when mapping normals to uniforms
const MIN_PROBABILITY: f64 = 1e-16;

/// Distribution family and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, std_dev: f64 },

    /// ln(X) ~ Normal(mu, sigma)
    LogNormal { mu: f64, sigma: f64 },

    /// Support [0, 1]
    Beta { alpha: f64, beta: f64 },

    Uniform { min: f64, max: f64 },

    Triangular { min: f64, mode: f64, max: f64 },

    /// Weighted mixture; weights need not sum to one
    Mixture { components: Vec<MixtureComponent> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureComponent {
    pub weight: f64,
    pub distribution: Distribution,
}

fn require(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

impl Distribution {
    /// Family tag as it appears in the IR
    pub fn family(&self) -> &'static str {
        match self {
            Distribution::Normal { .. } => "normal",
            Distribution::LogNormal { .. } => "log_normal",
            Distribution::Beta { .. } => "beta",
            Distribution::Uniform { .. } => "uniform",
            Distribution::Triangular { .. } => "triangular",
            Distribution::Mixture { .. } => "mixture",
        }
    }

    /// Check family parameters are in domain
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Distribution::Normal { mean, std_dev } => {
                require(mean.is_finite(), || format!("mean must be finite, got {}", mean))?;
                require(std_dev.is_finite() && *std_dev > 0.0, || {
                    format!("std_dev must be positive, got {}", std_dev)
                })
            }
            Distribution::LogNormal { mu, sigma } => {
                require(mu.is_finite(), || format!("mu must be finite, got {}", mu))?;
                require(sigma.is_finite() && *sigma > 0.0, || {
                    format!("sigma must be positive, got {}", sigma)
                })
            }
            Distribution::Beta { alpha, beta } => {
                require(alpha.is_finite() && *alpha > 0.0, || {
                    format!("alpha must be positive, got {}", alpha)
                })?;
                require(beta.is_finite() && *beta > 0.0, || {
                    format!("beta must be positive, got {}", beta)
                })
            }
            Distribution::Uniform { min, max } => {
                require(min.is_finite() && max.is_finite() && min < max, || {
                    format!("min must be below max, got [{}, {}]", min, max)
                })
            }
            Distribution::Triangular { min, mode, max } => {
                require(min.is_finite() && max.is_finite() && min < max, || {
                    format!("min must be below max, got [{}, {}]", min, max)
                })?;
                require(*mode >= *min && *mode <= *max, || {
                    format!("mode {} outside [{}, {}]", mode, min, max)
                })
            }
            Distribution::Mixture { components } => {
                require(!components.is_empty(), || "mixture has no components".to_string())?;
                for (i, component) in components.iter().enumerate() {
                    require(component.weight.is_finite() && component.weight > 0.0, || {
                        format!("component {} weight must be positive, got {}", i, component.weight)
                    })?;
                    component
                        .distribution
                        .validate()
                        .map_err(|reason| format!("component {}: {}", i, reason))?;
                }
                Ok(())
            }
        }
    }

    /// Expected value (may be infinite for extreme log-normals)
    pub fn mean(&self) -> f64 {
        match self {
            Distribution::Normal { mean, .. } => *mean,
            Distribution::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Distribution::Beta { alpha, beta } => alpha / (alpha + beta),
            Distribution::Uniform { min, max } => (min + max) / 2.0,
            Distribution::Triangular { min, mode, max } => (min + mode + max) / 3.0,
            Distribution::Mixture { components } => {
                let total: f64 = components.iter().map(|c| c.weight).sum();
                components
                    .iter()
                    .map(|c| c.weight * c.distribution.mean())
                    .sum::<f64>()
                    / total
            }
        }
    }

    /// Value used in deterministic mode: the mean, or the median when the
    /// mean is not finite
    pub fn central_value(&self) -> f64 {
        let mean = self.mean();
        if mean.is_finite() {
            mean
        } else {
            self.inverse_cdf(0.5)
        }
    }

    /// P(X <= x)
    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            Distribution::Normal { mean, std_dev } => normal_cdf((x - mean) / std_dev),
            Distribution::LogNormal { mu, sigma } => {
                if x <= 0.0 {
                    0.0
                } else {
                    normal_cdf((x.ln() - mu) / sigma)
                }
            }
            Distribution::Beta { alpha, beta } => regularized_incomplete_beta(*alpha, *beta, x),
            Distribution::Uniform { min, max } => ((x - min) / (max - min)).clamp(0.0, 1.0),
            Distribution::Triangular { min, mode, max } => {
                if x <= *min {
                    0.0
                } else if x <= *mode {
                    (x - min).powi(2) / ((max - min) * (mode - min))
                } else if x < *max {
                    1.0 - (max - x).powi(2) / ((max - min) * (max - mode))
                } else {
                    1.0
                }
            }
            Distribution::Mixture { components } => {
                let total: f64 = components.iter().map(|c| c.weight).sum();
                components
                    .iter()
                    .map(|c| c.weight * c.distribution.cdf(x))
                    .sum::<f64>()
                    / total
            }
        }
    }

    /// Quantile function for p in (0, 1)
    pub fn inverse_cdf(&self, p: f64) -> f64 {
        match self {
            Distribution::Normal { mean, std_dev } => mean + std_dev * normal_quantile(p),
            Distribution::LogNormal { mu, sigma } => (mu + sigma * normal_quantile(p)).exp(),
            Distribution::Beta { .. } => bisect_quantile(|x| self.cdf(x), p, 0.0, 1.0),
            Distribution::Uniform { min, max } => min + p * (max - min),
            Distribution::Triangular { min, mode, max } => {
                let split = (mode - min) / (max - min);
                if p < split {
                    min + (p * (max - min) * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - p) * (max - min) * (max - mode)).sqrt()
                }
            }
            Distribution::Mixture { components } => {
                // The mixture quantile lies between the component quantiles
                let (lo, hi) = components
                    .iter()
                    .map(|c| c.distribution.inverse_cdf(p))
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), q| {
                        (lo.min(q), hi.max(q))
                    });
                if hi - lo <= f64::EPSILON * lo.abs().max(1.0) {
                    lo
                } else {
                    bisect_quantile(|x| self.cdf(x), p, lo, hi)
                }
            }
        }
    }

    /// Independent draw from `rng`
    pub fn sample(&self, rng: &mut RngManager) -> f64 {
        self.inverse_cdf(rng.next_open_f64())
    }

    /// Map a standard normal variate onto this marginal (copula step)
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        match self {
            Distribution::Normal { mean, std_dev } => mean + std_dev * z,
            Distribution::LogNormal { mu, sigma } => (mu + sigma * z).exp(),
            _ => {
                let p = normal_cdf(z).clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY);
                self.inverse_cdf(p)
            }
        }
    }
}
