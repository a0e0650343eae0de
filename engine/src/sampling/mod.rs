//! Distribution sampling
//!
//! Marginal distributions, the special functions behind their inverse CDFs,
//! correlation groups (Gaussian copula over a Cholesky factor) and the
//! per-run parameter sampler.
//!
//! # Key Principles
//!
//! 1. **Determinism**: Same seed + same model → same parameter values
//! 2. **Inverse transform only**: one uniform in, one value out
//! 3. **Deterministic mode is pure**: central values never touch an RNG
//!
//! # Example
//!
//! ```
//! use econ_model_engine::rng::RngManager;
//! use econ_model_engine::sampling::Distribution;
//!
//! let demand = Distribution::Triangular { min: 80.0, mode: 100.0, max: 140.0 };
//! assert!(demand.validate().is_ok());
//!
//! let mut rng = RngManager::new(42);
//! let value = demand.sample(&mut rng);
//! assert!((80.0..=140.0).contains(&value));
//! ```

pub mod correlation;
pub mod distribution;
pub mod sampler;
pub mod special;

pub use correlation::{spearman_correlation, CorrelationKind};
pub use distribution::{Distribution, MixtureComponent};
pub use sampler::ParameterSampler;

use thiserror::Error;

/// Errors found while preparing stochastic parameters
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Invalid distribution for '{owner}': {reason}")]
    InvalidDistribution { owner: String, reason: String },

    #[error("Parameter '{parameter}' names unknown correlation group '{group}'")]
    UnknownCorrelationGroup { parameter: String, group: String },

    #[error("Parameter '{parameter}' declares group '{group}' but is not listed in it")]
    MembershipMismatch { parameter: String, group: String },

    #[error("Correlation group '{group}' lists unknown parameter '{parameter}'")]
    UnknownGroupMember { group: String, parameter: String },

    #[error("Correlation group '{group}' lists fixed parameter '{parameter}'")]
    NonStochasticMember { group: String, parameter: String },

    #[error("Parameter '{parameter}' belongs to both '{first}' and '{second}'")]
    DuplicateMembership {
        parameter: String,
        first: String,
        second: String,
    },

    #[error("Invalid correlation matrix for group '{group}': {reason}")]
    InvalidCorrelationMatrix { group: String, reason: String },

    #[error("Correlation matrix for group '{group}' is not positive semi-definite")]
    NotPositiveSemiDefinite { group: String },
}
