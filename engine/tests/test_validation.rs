//! Load-time validation
//!
//! Every problem in a model is reported together, before any run starts.

use econ_model_engine::equations::ValidationError;
use econ_model_engine::models::EquationCategory;
use econ_model_engine::sampling::SamplingError;
use econ_model_engine::{
    execute, Engine, ExecutionConfig, ExecutionError, ExecutionWarning, LoadError, Model,
};

fn load(json: &str) -> Model {
    serde_json::from_str(json).unwrap()
}

fn errors(json: &str) -> Vec<ValidationError> {
    match Engine::new(load(json)) {
        Err(LoadError::Validation(errors)) => errors,
        other => panic!("expected validation errors, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_future_read_is_rejected() {
    let errors = errors(
        r#"{
      "name": "lookahead",
      "time_horizon": 3,
      "equations": [
        {"target": "x", "category": "direct",
         "expression": {"kind": "literal", "value": 1.0}},
        {"target": "y", "category": "current",
         "expression": {"kind": "indexing", "variable": "x", "index": {"offset": 1}}}
      ]
    }"#,
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        ValidationError::CausalityViolation { variable, offset: 1, .. } if variable == "x"
    ));
}

#[test]
fn test_all_errors_are_collected() {
    let errors = errors(
        r#"{
      "name": "broken",
      "time_horizon": 0,
      "parameters": [
        {"name": "rate", "value": {"fixed": 0.1}},
        {"name": "rate", "value": {"fixed": 0.2}}
      ],
      "equations": [
        {"target": "stock", "category": "recurrence",
         "expression": {"kind": "variable_ref", "name": "stock"}},
        {"target": "flow", "category": "current",
         "expression": {"kind": "call", "function": "npv",
           "args": [{"kind": "variable_ref", "name": "missing"}]}},
        {"target": "flow", "category": "current",
         "expression": {"kind": "literal", "value": 1.0}}
      ],
      "policies": [
        {"name": "adjust", "trigger": {"kind": "literal", "value": 1.0},
         "actions": [{"action": "assign", "variable": "ghost",
                      "value": {"kind": "literal", "value": 0.0}}]}
      ]
    }"#,
    );

    assert!(errors.contains(&ValidationError::InvalidHorizon));
    assert!(errors.contains(&ValidationError::DuplicateParameter("rate".to_string())));
    assert!(errors.contains(&ValidationError::MissingInitialCondition {
        variable: "stock".to_string(),
    }));
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::DuplicateEquation { variable, category: EquationCategory::Current, .. }
            if variable == "flow"
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::UnknownFunction { name, .. } if name == "npv"
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::UndefinedReference { name, .. } if name == "missing"
    )));
    assert!(errors.contains(&ValidationError::UnknownPolicyTarget {
        policy: "adjust".to_string(),
        variable: "ghost".to_string(),
    }));
}

#[test]
fn test_conflicting_categories_are_rejected() {
    let errors = errors(
        r#"{
      "name": "conflict",
      "time_horizon": 2,
      "equations": [
        {"target": "x", "category": "direct",
         "expression": {"kind": "literal", "value": 1.0}},
        {"target": "x", "category": "current",
         "expression": {"kind": "literal", "value": 2.0}}
      ]
    }"#,
    );

    assert_eq!(
        errors,
        vec![ValidationError::ConflictingDefinitions {
            variable: "x".to_string(),
            first: EquationCategory::Direct,
            second: EquationCategory::Current,
        }]
    );
}

#[test]
fn test_invalid_distribution_is_rejected() {
    let errors = errors(
        r#"{
      "name": "bad_distribution",
      "time_horizon": 2,
      "parameters": [
        {"name": "share", "value": {"distribution":
          {"family": "beta", "alpha": -1.0, "beta": 2.0}}}
      ],
      "equations": [
        {"target": "x", "category": "direct",
         "expression": {"kind": "variable_ref", "name": "share"}}
      ]
    }"#,
    );

    assert!(matches!(
        &errors[..],
        [ValidationError::Sampling(SamplingError::InvalidDistribution { owner, .. })] if owner == "share"
    ));
}

#[test]
fn test_malformed_target_is_skipped_with_diagnostic() {
    let model = load(
        r#"{
      "name": "skipped",
      "time_horizon": 2,
      "parameters": [{"name": "rate", "value": {"fixed": 0.5}}],
      "equations": [
        {"target": "rate", "category": "direct",
         "expression": {"kind": "literal", "value": 1.0}},
        {"target": "x", "category": "direct",
         "expression": {"kind": "variable_ref", "name": "rate"}}
      ]
    }"#,
    );
    let engine = Engine::new(model).unwrap();
    assert_eq!(engine.diagnostics().len(), 1);
    assert_eq!(engine.diagnostics()[0].equation, 0);

    let result = engine.execute(&ExecutionConfig::default()).unwrap();
    assert!(matches!(
        &result.warnings[..],
        [ExecutionWarning::SkippedEquation(diagnostic)] if diagnostic.target == "rate"
    ));
    assert_eq!(result.runs[0].values("x"), vec![0.5, 0.5]);
    assert!(!result.runs[0].series.contains_key("rate"));
}

#[test]
fn test_execute_reports_load_and_config_errors() {
    let model = load(
        r#"{
      "name": "ok",
      "time_horizon": 2,
      "equations": [
        {"target": "x", "category": "direct",
         "expression": {"kind": "literal", "value": 1.0}}
      ]
    }"#,
    );

    let bad_config = ExecutionConfig {
        max_runs: 0,
        ..ExecutionConfig::default()
    };
    assert!(matches!(
        execute(&model, &bad_config),
        Err(ExecutionError::InvalidConfig(_))
    ));

    let mut broken = model.clone();
    broken.time_horizon = 0;
    assert!(matches!(
        execute(&broken, &ExecutionConfig::default()),
        Err(ExecutionError::Load(LoadError::Validation(_)))
    ));
}
