//! Economic Model Execution Engine
//!
//! Executes a compiled economic model (time-indexed equations, constraints
//! and trigger-action policies) either once with every distribution at its
//! central value, or many times under seeded Monte Carlo sampling.
//!
//! # Architecture
//!
//! - **core**: Time management
//! - **models**: Model IR, expression tree, run state and run records
//! - **rng**: Deterministic random number generation and seed derivation
//! - **sampling**: Distributions, correlation groups (Gaussian copula)
//! - **eval**: Expression evaluator and function library
//! - **equations**: Equation organizer and load-time validation
//! - **constraint**: Constraint checking
//! - **policy**: Policy engine
//! - **simulation**: Per-run time-step state machine
//! - **orchestrator**: Engine, batches and aggregation
//!
//! # Critical Invariants
//!
//! 1. Causality: nothing at timestep t reads a value later than t
//! 2. All randomness is deterministic (seeded per run from the base seed)
//! 3. Identical inputs serialize to identical bytes
//!
//! # Example
//!
//! ```rust
//! use econ_model_engine::{execute, ExecutionConfig, Model};
//!
//! let model: Model = serde_json::from_str(r#"{
//!   "name": "growth",
//!   "time_horizon": 3,
//!   "parameters": [{"name": "revenue0", "value": {"fixed": 1000.0}}],
//!   "equations": [
//!     {"target": "revenue", "category": "initial",
//!      "expression": {"kind": "variable_ref", "name": "revenue0"}},
//!     {"target": "revenue", "category": "recurrence",
//!      "expression": {"kind": "binary_op", "op": "*",
//!        "left": {"kind": "variable_ref", "name": "revenue"},
//!        "right": {"kind": "literal", "value": 1.1}}}
//!   ]
//! }"#).unwrap();
//!
//! let result = execute(&model, &ExecutionConfig::default()).unwrap();
//! assert_eq!(result.runs[0].values("revenue").len(), 3);
//! ```

pub mod constraint;
pub mod core;
pub mod equations;
pub mod eval;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod rng;
pub mod sampling;
pub mod simulation;

// Re-exports for convenience
pub use core::time::TimeManager;
pub use equations::{EquationIndex, LoadDiagnostic, ValidationError};
pub use eval::{BuiltinFunctions, Eval, EvalError, FunctionError, FunctionRegistry};
pub use models::{Model, RunResult, RunStatus, RunWarning, SimulationState};
pub use orchestrator::{
    execute, AggregateResult, Engine, ExecutionConfig, ExecutionError, ExecutionMode,
    ExecutionResult, ExecutionStatus, ExecutionWarning, LoadError,
};
pub use rng::RngManager;
pub use sampling::{CorrelationKind, Distribution, SamplingError};
pub use simulation::{CancellationToken, SimulationError, SimulationSettings};
