//! Run records
//!
//! Everything a run leaves behind: its time series, constraint violations,
//! the policy audit log, warnings, and (for broken runs) a failure record.
//! All types serialize with deterministic field and key order so identical
//! runs produce identical bytes.

use crate::models::expr::BinaryOperator;
use crate::models::ir::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-run state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    Initializing,
    Evaluating,
    ConstraintChecking,
    PolicyExecuting,
    Advancing,
    Halted,
    Completed,
    Failed,
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SimulationPhase::Initializing => "initializing",
            SimulationPhase::Evaluating => "evaluating",
            SimulationPhase::ConstraintChecking => "constraint_checking",
            SimulationPhase::PolicyExecuting => "policy_executing",
            SimulationPhase::Advancing => "advancing",
            SimulationPhase::Halted => "halted",
            SimulationPhase::Completed => "completed",
            SimulationPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Terminal status of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every timestep finished without a fatal violation
    Completed,
    /// A fatal constraint stopped the run
    Halted,
    /// An evaluation fault stopped the run
    Failed,
}

/// Failed constraint check
///
/// `left`/`right` hold the operands when the condition is a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub timestep: usize,
    pub constraint: String,
    pub severity: Severity,
    pub message: String,
    pub operator: Option<BinaryOperator>,
    pub left: Option<f64>,
    pub right: Option<f64>,
}

/// Effect of one applied policy action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AppliedAction {
    Assign {
        variable: String,
        previous: Option<f64>,
        value: f64,
    },
    Multiply {
        variable: String,
        factor: f64,
        previous: f64,
        value: f64,
    },
    Add {
        variable: String,
        amount: f64,
        previous: f64,
        value: f64,
    },
    Emit {
        event: String,
        message: String,
        fields: BTreeMap<String, f64>,
    },
}

/// Policy audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyExecution {
    pub timestep: usize,
    pub policy: String,
    pub action: AppliedAction,
}

/// Advisory conditions recorded without stopping the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// Fixed-point iteration ended without resolving every equation
    NonConvergence {
        timestep: usize,
        iterations: usize,
        unresolved: Vec<String>,
    },
    /// Constraint inputs were not computed; the check was skipped
    ConstraintSkipped {
        timestep: usize,
        constraint: String,
        missing: String,
        missing_step: usize,
    },
    /// Trigger inputs were not computed; the policy was skipped
    PolicySkipped {
        timestep: usize,
        policy: String,
        missing: String,
        missing_step: usize,
    },
    /// Recurrence inputs were not computed; `variable[timestep + 1]` stays empty
    RecurrenceUnresolved {
        timestep: usize,
        variable: String,
        missing: String,
        missing_step: usize,
    },
}

/// Why and where a run failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub timestep: usize,
    pub phase: SimulationPhase,
    pub message: String,
}

/// Complete outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_index: usize,

    /// Derived stream seed (`None` in deterministic mode)
    pub seed: Option<u64>,

    pub status: RunStatus,

    /// Last timestep whose state machine was entered
    pub last_timestep: usize,

    /// Parameter values used by this run
    pub parameters: BTreeMap<String, f64>,

    /// Variable name → values at 0..T-1
    pub series: BTreeMap<String, Vec<Option<f64>>>,

    pub violations: Vec<ConstraintViolation>,

    pub policy_executions: Vec<PolicyExecution>,

    pub warnings: Vec<RunWarning>,

    pub failure: Option<RunFailure>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Value of `variable` at `step`, if computed
    pub fn value(&self, variable: &str, step: usize) -> Option<f64> {
        self.series.get(variable)?.get(step).copied().flatten()
    }

    /// Computed values of `variable`, stopping at the first gap
    pub fn values(&self, variable: &str) -> Vec<f64> {
        self.series
            .get(variable)
            .map(|series| series.iter().map_while(|v| *v).collect())
            .unwrap_or_default()
    }
}
