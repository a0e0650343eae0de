//! Monte Carlo aggregation
//!
//! Order-independent reduction over a batch's runs: outcome rates plus, for
//! every variable and timestep, percentiles and mean across the runs that
//! computed a value there.

use crate::models::{RunResult, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Linear-interpolation quantile of an ascending slice
///
/// `p` is clamped to [0, 1]. Returns NaN for an empty slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let p = p.clamp(0.0, 1.0);
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let idx = p * (n - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi || hi >= n {
        return sorted[lo.min(n - 1)];
    }
    let w = idx - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

/// Distribution summary of one variable at one timestep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileSet {
    /// Runs holding a value at this timestep
    pub samples: usize,
    pub mean: f64,
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl QuantileSet {
    /// Summarize `values`; `None` when empty
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self {
            samples: values.len(),
            mean,
            p05: quantile_sorted(&values, 0.05),
            p25: quantile_sorted(&values, 0.25),
            p50: quantile_sorted(&values, 0.50),
            p75: quantile_sorted(&values, 0.75),
            p95: quantile_sorted(&values, 0.95),
        })
    }
}

/// Per-timestep summaries of one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSummary {
    /// One entry per timestep; `None` where no run computed a value
    pub timesteps: Vec<Option<QuantileSet>>,
}

/// Batch-level statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub run_count: usize,
    pub completed_runs: usize,
    pub halted_runs: usize,
    pub failed_runs: usize,
    pub runs_with_violations: usize,

    /// Fraction of runs that completed
    pub success_rate: f64,

    /// Fraction of runs with at least one constraint violation
    pub violation_rate: f64,

    pub halted_rate: f64,
    pub failure_rate: f64,

    pub variables: BTreeMap<String, VariableSummary>,
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

impl AggregateResult {
    /// Reduce `runs` (any order) over a horizon of `horizon` timesteps
    pub fn from_runs(runs: &[RunResult], horizon: usize) -> Self {
        let count = |status: RunStatus| runs.iter().filter(|r| r.status == status).count();
        let run_count = runs.len();
        let completed_runs = count(RunStatus::Completed);
        let halted_runs = count(RunStatus::Halted);
        let failed_runs = count(RunStatus::Failed);
        let runs_with_violations = runs.iter().filter(|r| r.has_violations()).count();

        let mut columns: BTreeMap<&str, Vec<Vec<f64>>> = BTreeMap::new();
        for run in runs {
            for (variable, series) in &run.series {
                let column = columns
                    .entry(variable.as_str())
                    .or_insert_with(|| vec![Vec::new(); horizon]);
                for (step, value) in series.iter().enumerate().take(horizon) {
                    if let Some(value) = value {
                        column[step].push(*value);
                    }
                }
            }
        }

        let variables = columns
            .into_iter()
            .map(|(variable, column)| {
                let timesteps = column.into_iter().map(QuantileSet::from_values).collect();
                (variable.to_string(), VariableSummary { timesteps })
            })
            .collect();

        Self {
            run_count,
            completed_runs,
            halted_runs,
            failed_runs,
            runs_with_violations,
            success_rate: rate(completed_runs, run_count),
            violation_rate: rate(runs_with_violations, run_count),
            halted_rate: rate(halted_runs, run_count),
            failure_rate: rate(failed_runs, run_count),
            variables,
        }
    }
}
