//! Domain models for the execution engine
//!
//! - `ir`: the compiled model handed over by the front end
//! - `expr`: expression trees inside the IR
//! - `state`: per-run time series storage
//! - `record`: what a run leaves behind

pub mod expr;
pub mod ir;
pub mod record;
pub mod state;

// Re-exports
pub use expr::{AggregateOp, BinaryOperator, Expr, TimeIndex, UnaryOperator, TIME_VARIABLE};
pub use ir::{
    Action, Constraint, CorrelationGroup, Equation, EquationCategory, Model, Parameter,
    ParameterValue, Policy, Severity, SourceLocation,
};
pub use record::{
    AppliedAction, ConstraintViolation, PolicyExecution, RunFailure, RunResult, RunStatus,
    RunWarning, SimulationPhase,
};
pub use state::{SimulationState, StateError};
