//! Orchestrator - model loading, batch execution and aggregation
//!
//! See `engine.rs` for the batch lifecycle.

pub mod aggregate;
pub mod engine;
pub mod fingerprint;

pub use aggregate::{quantile_sorted, AggregateResult, QuantileSet, VariableSummary};
pub use engine::{
    execute, Engine, ExecutionConfig, ExecutionError, ExecutionMode, ExecutionResult,
    ExecutionStatus, ExecutionWarning, LoadError,
};
pub use fingerprint::compute_fingerprint;
