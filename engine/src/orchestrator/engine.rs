//! Run Orchestrator
//!
//! Loads a model once and drives batches of runs over it.
//!
//! # Architecture
//!
//! ```text
//! Engine::new(model)
//!   ├─ organize + validate equations  (errors collected, load fails)
//!   ├─ factor correlation groups
//!   ├─ order policies
//!   └─ fingerprint the model
//!
//! Engine::execute(config)
//!   ├─ Deterministic: one run, central values, no RNG
//!   └─ Monte Carlo:   N runs (capped at max_runs), seed_i = derive(seed, i)
//!        └─ runs in parallel (rayon), sorted by index, aggregated
//! ```
//!
//! # Critical Invariants
//!
//! 1. **Reproducibility**: identical (model, seed, N, mode) serializes to
//!    identical bytes, whether runs execute in parallel or not
//! 2. **Isolation**: every run owns its state and stream; the model is
//!    shared read-only
//! 3. **No silent drops**: a capped request is recorded as a warning

use crate::equations::{organize, EquationIndex, LoadDiagnostic, ValidationError};
use crate::eval::{BuiltinFunctions, FunctionRegistry};
use crate::models::{Model, RunResult};
use crate::orchestrator::aggregate::AggregateResult;
use crate::orchestrator::fingerprint::compute_fingerprint;
use crate::policy::PolicyEngine;
use crate::rng::{derive_run_seed, RngManager};
use crate::sampling::{ParameterSampler, SamplingError};
use crate::simulation::{CancellationToken, SimulationSettings, Simulator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Single run with every distribution at its central value
    #[default]
    Deterministic,
    /// Independent seeded runs, aggregated
    MonteCarlo,
}

fn default_seed() -> u64 {
    0
}

fn default_num_runs() -> usize {
    1
}

fn default_max_runs() -> usize {
    10_000
}

fn default_max_iterations() -> usize {
    100
}

fn default_convergence_tolerance() -> f64 {
    1e-9
}

fn default_parallel() -> bool {
    true
}

/// Batch configuration
///
/// Deserializes from partial JSON; absent fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Base seed (ignored in deterministic mode)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Requested Monte Carlo runs
    #[serde(default = "default_num_runs")]
    pub num_runs: usize,

    /// Safety cap on Monte Carlo runs
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,

    /// Replaces the model's horizon when set
    #[serde(default)]
    pub time_horizon_override: Option<usize>,

    /// Fixed-point pass budget per timestep
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,

    /// Fail runs that do not converge instead of warning
    #[serde(default)]
    pub strict_convergence: bool,

    /// Execute Monte Carlo runs on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Deterministic,
            seed: default_seed(),
            num_runs: default_num_runs(),
            max_runs: default_max_runs(),
            time_horizon_override: None,
            max_iterations: default_max_iterations(),
            convergence_tolerance: default_convergence_tolerance(),
            strict_convergence: false,
            parallel: default_parallel(),
        }
    }
}

impl ExecutionConfig {
    /// Monte Carlo batch of `num_runs` runs from `seed`
    pub fn monte_carlo(seed: u64, num_runs: usize) -> Self {
        Self {
            mode: ExecutionMode::MonteCarlo,
            seed,
            num_runs,
            ..Self::default()
        }
    }

    /// Check the configuration before any run starts
    pub fn validate(&self) -> Result<(), ExecutionError> {
        let invalid = |reason: &str| Err(ExecutionError::InvalidConfig(reason.to_string()));

        if self.max_runs == 0 {
            return invalid("max_runs must be at least 1");
        }
        if self.mode == ExecutionMode::MonteCarlo && self.num_runs == 0 {
            return invalid("num_runs must be at least 1 in monte_carlo mode");
        }
        if self.time_horizon_override == Some(0) {
            return invalid("time_horizon_override must be at least 1");
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1");
        }
        if !(self.convergence_tolerance > 0.0 && self.convergence_tolerance.is_finite()) {
            return invalid("convergence_tolerance must be positive and finite");
        }
        Ok(())
    }

    fn settings(&self) -> SimulationSettings {
        SimulationSettings {
            max_iterations: self.max_iterations,
            convergence_tolerance: self.convergence_tolerance,
            strict_convergence: self.strict_convergence,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Model rejected at load time
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("Model failed validation with {} error(s): {}", .0.len(), join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error("Model cannot be fingerprinted: {0}")]
    Fingerprint(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned before any run starts
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid execution config: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every planned run executed
    Completed,
    /// The batch was cancelled; `runs` holds the runs that finished
    Cancelled,
}

/// Batch-level advisory conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionWarning {
    /// Requested run count exceeded `max_runs`
    ResourceLimitExceeded { requested: usize, max_runs: usize },

    /// Equation skipped at load time
    SkippedEquation(LoadDiagnostic),
}

/// Everything a batch produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub model_name: String,

    /// SHA-256 of the model's canonical JSON
    pub model_fingerprint: String,

    pub mode: ExecutionMode,
    pub status: ExecutionStatus,

    /// Base seed (`None` in deterministic mode)
    pub seed: Option<u64>,

    pub time_horizon: usize,
    pub time_unit: String,

    pub requested_runs: usize,
    pub executed_runs: usize,

    pub warnings: Vec<ExecutionWarning>,

    /// Sorted by run index
    pub runs: Vec<RunResult>,

    /// Monte Carlo only
    pub aggregate: Option<AggregateResult>,
}

// ============================================================================
// Engine
// ============================================================================

/// Loaded model, ready to execute any number of batches
pub struct Engine {
    model: Model,
    index: EquationIndex,
    sampler: ParameterSampler,
    policies: PolicyEngine,
    functions: Arc<dyn FunctionRegistry>,
    fingerprint: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("model", &self.model.name)
            .field("fingerprint", &self.fingerprint)
            .field("variables", &self.index.variables())
            .finish()
    }
}

impl Engine {
    /// Load `model` with the builtin function library
    pub fn new(model: Model) -> Result<Self, LoadError> {
        Self::with_functions(model, Arc::new(BuiltinFunctions))
    }

    /// Load `model`, resolving calls through `functions`
    ///
    /// # Errors
    ///
    /// Returns every validation error found, not only the first.
    pub fn with_functions(
        model: Model,
        functions: Arc<dyn FunctionRegistry>,
    ) -> Result<Self, LoadError> {
        let index = organize(&model, functions.as_ref()).map_err(LoadError::Validation)?;
        let sampler = ParameterSampler::prepare(&model)?;
        let policies = PolicyEngine::new(&model.policies);
        let fingerprint =
            compute_fingerprint(&model).map_err(|e| LoadError::Fingerprint(e.to_string()))?;

        info!(
            model = %model.name,
            variables = index.variables().len(),
            equations = model.equations.len(),
            constraints = model.constraints.len(),
            policies = model.policies.len(),
            "Model loaded"
        );

        Ok(Self {
            model,
            index,
            sampler,
            policies,
            functions,
            fingerprint,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Equations skipped at load time
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        self.index.diagnostics()
    }

    /// Execute one batch
    pub fn execute(&self, config: &ExecutionConfig) -> Result<ExecutionResult, ExecutionError> {
        self.execute_with_cancel(config, &CancellationToken::new())
    }

    /// Execute one batch, stopping early when `cancel` fires
    ///
    /// Runs finished before cancellation are kept (and aggregated).
    pub fn execute_with_cancel(
        &self,
        config: &ExecutionConfig,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError> {
        config.validate()?;

        let horizon = config
            .time_horizon_override
            .unwrap_or(self.model.time_horizon);
        let simulator = Simulator::new(
            &self.model,
            &self.index,
            &self.policies,
            self.functions.as_ref(),
            config.settings(),
            horizon,
        );

        let mut warnings: Vec<ExecutionWarning> = self
            .index
            .diagnostics()
            .iter()
            .cloned()
            .map(ExecutionWarning::SkippedEquation)
            .collect();

        let (requested_runs, seed, mut runs) = match config.mode {
            ExecutionMode::Deterministic => {
                info!(model = %self.model.name, horizon, "Starting deterministic run");
                let parameters = self.sampler.central_values();
                let runs: Vec<RunResult> = simulator
                    .run(0, None, &parameters, None, cancel)
                    .into_iter()
                    .collect();
                (1, None, runs)
            }

            ExecutionMode::MonteCarlo => {
                let planned = if config.num_runs > config.max_runs {
                    warn!(
                        requested = config.num_runs,
                        max_runs = config.max_runs,
                        "Requested runs exceed max_runs, capping"
                    );
                    warnings.push(ExecutionWarning::ResourceLimitExceeded {
                        requested: config.num_runs,
                        max_runs: config.max_runs,
                    });
                    config.max_runs
                } else {
                    config.num_runs
                };

                info!(
                    model = %self.model.name,
                    runs = planned,
                    seed = config.seed,
                    horizon,
                    parallel = config.parallel,
                    "Starting Monte Carlo batch"
                );

                let execute_one = |run_index: usize| {
                    let run_seed = derive_run_seed(config.seed, run_index as u64);
                    let _span = info_span!("run", index = run_index, seed = run_seed).entered();

                    let mut stream = RngManager::new(run_seed);
                    let parameters = self.sampler.sample(&mut stream);
                    simulator.run(run_index, Some(run_seed), &parameters, Some(stream), cancel)
                };

                let runs: Vec<RunResult> = if config.parallel {
                    (0..planned).into_par_iter().filter_map(execute_one).collect()
                } else {
                    (0..planned)
                        .take_while(|_| !cancel.is_cancelled())
                        .filter_map(execute_one)
                        .collect()
                };
                (config.num_runs, Some(config.seed), runs)
            }
        };

        runs.sort_by_key(|run| run.run_index);

        let status = if cancel.is_cancelled() {
            warn!(executed = runs.len(), "Batch cancelled");
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Completed
        };

        let aggregate = match config.mode {
            ExecutionMode::Deterministic => None,
            ExecutionMode::MonteCarlo => Some(AggregateResult::from_runs(&runs, horizon)),
        };

        if let Some(aggregate) = &aggregate {
            debug!(
                completed = aggregate.completed_runs,
                halted = aggregate.halted_runs,
                failed = aggregate.failed_runs,
                "Aggregated runs"
            );
        }
        info!(
            model = %self.model.name,
            executed = runs.len(),
            ?status,
            "Batch finished"
        );

        Ok(ExecutionResult {
            model_name: self.model.name.clone(),
            model_fingerprint: self.fingerprint.clone(),
            mode: config.mode,
            status,
            seed,
            time_horizon: horizon,
            time_unit: self.model.time_unit.clone(),
            requested_runs,
            executed_runs: runs.len(),
            warnings,
            runs,
            aggregate,
        })
    }
}

/// Load `model` and execute one batch
pub fn execute(model: &Model, config: &ExecutionConfig) -> Result<ExecutionResult, ExecutionError> {
    config.validate()?;
    Engine::new(model.clone())?.execute(config)
}
