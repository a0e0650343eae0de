//! Per-run simulation
//!
//! The time-step state machine that turns a loaded model plus one set of
//! parameter values into a `RunResult`.

pub mod engine;

pub use engine::{CancellationToken, SimulationError, SimulationSettings, Simulator};
