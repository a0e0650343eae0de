//! End-to-end scenarios
//!
//! Small models loaded from IR JSON and executed through the public API,
//! checking trajectories, halting, convergence and run failures.

use econ_model_engine::models::{RunStatus, RunWarning, SimulationPhase};
use econ_model_engine::{execute, Engine, ExecutionConfig, Model};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn load(json: &str) -> Model {
    serde_json::from_str(json).expect("fixture IR should deserialize")
}

// ============================================================================
// Test 1: Revenue growth
// ============================================================================

const GROWTH: &str = r#"{
  "name": "revenue_growth",
  "time_horizon": 3,
  "time_unit": "year",
  "parameters": [
    {"name": "revenue0", "value": {"fixed": 1000.0}},
    {"name": "growth_rate", "value": {"fixed": 0.10}}
  ],
  "equations": [
    {"target": "revenue", "category": "initial",
     "expression": {"kind": "variable_ref", "name": "revenue0"}},
    {"target": "revenue", "category": "recurrence",
     "expression": {"kind": "binary_op", "op": "*",
       "left": {"kind": "indexing", "variable": "revenue", "index": {"offset": 0}},
       "right": {"kind": "binary_op", "op": "+",
         "left": {"kind": "literal", "value": 1.0},
         "right": {"kind": "variable_ref", "name": "growth_rate"}}}}
  ]
}"#;

#[test]
fn test_revenue_growth_trajectory() {
    init_tracing();
    let result = execute(&load(GROWTH), &ExecutionConfig::default()).unwrap();

    assert_eq!(result.runs.len(), 1);
    let run = &result.runs[0];
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.warnings.is_empty());

    let revenue = run.values("revenue");
    let expected = [1000.0, 1100.0, 1210.0];
    assert_eq!(revenue.len(), expected.len());
    for (actual, expected) in revenue.iter().zip(expected) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }
    assert_eq!(result.time_unit, "year");
}

// ============================================================================
// Test 2: Fatal constraint halts the run
// ============================================================================

const COUNTER: &str = r#"{
  "name": "counter",
  "time_horizon": 6,
  "equations": [
    {"target": "counter", "category": "initial",
     "expression": {"kind": "literal", "value": 0.0}},
    {"target": "counter", "category": "recurrence",
     "expression": {"kind": "binary_op", "op": "+",
       "left": {"kind": "variable_ref", "name": "counter"},
       "right": {"kind": "literal", "value": 1.0}}}
  ],
  "constraints": [
    {"name": "below_three", "severity": "fatal",
     "condition": {"kind": "binary_op", "op": "<",
       "left": {"kind": "variable_ref", "name": "counter"},
       "right": {"kind": "literal", "value": 3.0}}}
  ]
}"#;

#[test]
fn test_fatal_constraint_halts_at_first_false_step() {
    init_tracing();
    let result = execute(&load(COUNTER), &ExecutionConfig::default()).unwrap();
    let run = &result.runs[0];

    assert_eq!(run.status, RunStatus::Halted);
    assert_eq!(run.last_timestep, 3);
    assert_eq!(run.violations.len(), 1);

    let violation = &run.violations[0];
    assert_eq!(violation.timestep, 3);
    assert_eq!(violation.constraint, "below_three");
    assert_eq!(violation.left, Some(3.0));
    assert_eq!(violation.right, Some(3.0));
    assert!(violation.message.contains("below_three"));

    assert_eq!(run.values("counter"), vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(run.value("counter", 4), None);
    assert_eq!(run.value("counter", 5), None);
}

#[test]
fn test_warning_constraint_records_and_continues() {
    let json = COUNTER.replace(r#""severity": "fatal""#, r#""severity": "warning""#);
    let result = execute(&load(&json), &ExecutionConfig::default()).unwrap();
    let run = &result.runs[0];

    assert_eq!(run.status, RunStatus::Completed);
    let steps: Vec<usize> = run.violations.iter().map(|v| v.timestep).collect();
    assert_eq!(steps, vec![3, 4, 5]);
    assert_eq!(run.values("counter").len(), 6);
}

// ============================================================================
// Test 3: Same-step dependencies converge without warnings
// ============================================================================

const PROFIT: &str = r#"{
  "name": "profit",
  "time_horizon": 4,
  "parameters": [
    {"name": "margin", "value": {"fixed": 0.25}}
  ],
  "equations": [
    {"target": "profit", "category": "current",
     "expression": {"kind": "binary_op", "op": "-",
       "left": {"kind": "variable_ref", "name": "revenue"},
       "right": {"kind": "variable_ref", "name": "cost"}}},
    {"target": "cost", "category": "current",
     "expression": {"kind": "binary_op", "op": "*",
       "left": {"kind": "variable_ref", "name": "revenue"},
       "right": {"kind": "binary_op", "op": "-",
         "left": {"kind": "literal", "value": 1.0},
         "right": {"kind": "variable_ref", "name": "margin"}}}},
    {"target": "revenue", "category": "direct",
     "expression": {"kind": "binary_op", "op": "*",
       "left": {"kind": "literal", "value": 100.0},
       "right": {"kind": "binary_op", "op": "+",
         "left": {"kind": "variable_ref", "name": "t"},
         "right": {"kind": "literal", "value": 1.0}}}},
    {"target": "cumulative", "category": "current",
     "expression": {"kind": "aggregation", "op": "sum", "variable": "profit",
       "from": {"step": 0}, "to": {"offset": 0}}}
  ]
}"#;

#[test]
fn test_acyclic_current_equations_converge() {
    init_tracing();
    let result = execute(&load(PROFIT), &ExecutionConfig::default()).unwrap();
    let run = &result.runs[0];

    assert_eq!(run.status, RunStatus::Completed);
    assert!(
        !run.warnings
            .iter()
            .any(|w| matches!(w, RunWarning::NonConvergence { .. })),
        "unexpected warnings: {:?}",
        run.warnings
    );

    let profit = run.values("profit");
    assert_eq!(profit.len(), 4);
    for (t, value) in profit.iter().enumerate() {
        let expected = 25.0 * (t as f64 + 1.0);
        assert!((value - expected).abs() < 1e-9);
    }
    let cumulative = run.values("cumulative");
    assert!((cumulative[3] - 250.0).abs() < 1e-9);
}

// ============================================================================
// Test 4: Runtime faults fail the run, never the batch
// ============================================================================

const RECIPROCAL: &str = r#"{
  "name": "reciprocal",
  "time_horizon": 5,
  "equations": [
    {"target": "y", "category": "direct",
     "expression": {"kind": "binary_op", "op": "/",
       "left": {"kind": "literal", "value": 1.0},
       "right": {"kind": "binary_op", "op": "-",
         "left": {"kind": "variable_ref", "name": "t"},
         "right": {"kind": "literal", "value": 2.0}}}}
  ]
}"#;

#[test]
fn test_division_by_zero_fails_run_with_location() {
    init_tracing();
    let result = execute(&load(RECIPROCAL), &ExecutionConfig::default()).unwrap();
    let run = &result.runs[0];

    assert_eq!(run.status, RunStatus::Failed);
    let failure = run.failure.as_ref().expect("failed run records its failure");
    assert_eq!(failure.timestep, 2);
    assert_eq!(failure.phase, SimulationPhase::Evaluating);
    assert!(failure.message.contains('y'));

    assert_eq!(run.values("y"), vec![-0.5, -1.0]);
}

#[test]
fn test_failed_runs_counted_in_monte_carlo_batch() {
    let result = execute(&load(RECIPROCAL), &ExecutionConfig::monte_carlo(3, 4)).unwrap();

    assert_eq!(result.executed_runs, 4);
    let aggregate = result.aggregate.unwrap();
    assert_eq!(aggregate.failed_runs, 4);
    assert_eq!(aggregate.failure_rate, 1.0);
    assert_eq!(aggregate.success_rate, 0.0);
}

// ============================================================================
// Test 5: Current equations read values carried by recurrences
// ============================================================================

#[test]
fn test_current_equations_read_recurrence_values() {
    let json = r#"{
      "name": "market",
      "time_horizon": 3,
      "equations": [
        {"target": "price", "category": "initial",
         "expression": {"kind": "literal", "value": 1.0}},
        {"target": "price", "category": "recurrence",
         "expression": {"kind": "variable_ref", "name": "price"}},
        {"target": "demand", "category": "current",
         "expression": {"kind": "binary_op", "op": "-",
           "left": {"kind": "literal", "value": 10.0},
           "right": {"kind": "variable_ref", "name": "price"}}},
        {"target": "supply", "category": "current",
         "expression": {"kind": "binary_op", "op": "*",
           "left": {"kind": "literal", "value": 2.0},
           "right": {"kind": "variable_ref", "name": "price"}}}
      ]
    }"#;
    let engine = Engine::new(load(json)).unwrap();
    let result = engine.execute(&ExecutionConfig::default()).unwrap();
    let run = &result.runs[0];

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.values("demand"), vec![9.0, 9.0, 9.0]);
    assert_eq!(run.values("supply"), vec![2.0, 2.0, 2.0]);
}
