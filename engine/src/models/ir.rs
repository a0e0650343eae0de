//! Model IR
//!
//! The validated intermediate representation handed over by the compiler.
//! Everything here is plain data: read-only once loaded and shared by every
//! run of a batch.
//!
//! # Example
//!
//! ```rust
//! use econ_model_engine::models::Model;
//!
//! let json = r#"{
//!   "name": "growth",
//!   "time_horizon": 3,
//!   "time_unit": "year",
//!   "parameters": [
//!     {"name": "revenue0", "value": {"fixed": 1000.0}},
//!     {"name": "growth_rate", "value": {"fixed": 0.10}}
//!   ],
//!   "equations": [
//!     {"target": "revenue", "category": "initial",
//!      "expression": {"kind": "variable_ref", "name": "revenue0"}},
//!     {"target": "revenue", "category": "recurrence",
//!      "expression": {"kind": "binary_op", "op": "*",
//!        "left": {"kind": "indexing", "variable": "revenue", "index": {"offset": 0}},
//!        "right": {"kind": "binary_op", "op": "+",
//!          "left": {"kind": "literal", "value": 1.0},
//!          "right": {"kind": "variable_ref", "name": "growth_rate"}}}}
//!   ]
//! }"#;
//!
//! let model: Model = serde_json::from_str(json).unwrap();
//! assert_eq!(model.time_horizon, 3);
//! assert_eq!(model.equations.len(), 2);
//! ```

use crate::models::expr::Expr;
use crate::sampling::{CorrelationKind, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn default_time_unit() -> String {
    "period".to_string()
}

/// Complete compiled model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,

    /// Number of timesteps T (indexed 0..T-1)
    pub time_horizon: usize,

    #[serde(default = "default_time_unit")]
    pub time_unit: String,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    pub equations: Vec<Equation>,

    #[serde(default)]
    pub constraints: Vec<Constraint>,

    #[serde(default)]
    pub policies: Vec<Policy>,

    #[serde(default)]
    pub correlation_groups: Vec<CorrelationGroup>,
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Named model input, fixed or stochastic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
    #[serde(default)]
    pub correlation_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Fixed(f64),
    Distribution(Distribution),
}

impl Parameter {
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::Fixed(value),
            correlation_group: None,
        }
    }

    pub fn stochastic(name: impl Into<String>, distribution: Distribution) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::Distribution(distribution),
            correlation_group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.correlation_group = Some(group.into());
        self
    }

    pub fn is_stochastic(&self) -> bool {
        matches!(self.value, ParameterValue::Distribution(_))
    }
}

/// Correlation matrix over a named set of stochastic parameters
///
/// `matrix[i][j]` is the correlation between `parameters[i]` and
/// `parameters[j]`. Rank (Spearman) coefficients are the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub id: String,
    pub parameters: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub kind: CorrelationKind,
}

// ============================================================================
// EQUATIONS
// ============================================================================

/// Temporal category of an equation, fixed by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationCategory {
    /// Defines x[0]
    Initial,
    /// Defines x[t], may depend on same-step values
    Current,
    /// Defines x[t+1] from values at <= t
    Recurrence,
    /// Defines x[t] at every step, excluding all other categories
    Direct,
}

impl fmt::Display for EquationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EquationCategory::Initial => "initial",
            EquationCategory::Current => "current",
            EquationCategory::Recurrence => "recurrence",
            EquationCategory::Direct => "direct",
        };
        f.write_str(label)
    }
}

/// Position in the model source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub target: String,
    pub category: EquationCategory,
    pub expression: Expr,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

impl Equation {
    pub fn new(target: impl Into<String>, category: EquationCategory, expression: Expr) -> Self {
        Self {
            target: target.into(),
            category,
            expression,
            location: None,
        }
    }

    /// "revenue (recurrence) at model.econ:4:1" style label for messages
    pub fn describe(&self) -> String {
        match &self.location {
            Some(location) => format!("{} ({}) at {}", self.target, self.category, location),
            None => format!("{} ({})", self.target, self.category),
        }
    }
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Violation halts the run
    Fatal,
    /// Violation is recorded, the run continues
    Warning,
}

/// Boolean condition checked at every timestep
///
/// `message` may reference `{name}`, `{t}`, `{left}` and `{right}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub condition: Expr,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// POLICIES
// ============================================================================

/// Trigger-action rule
///
/// Policies run in `declaration_index` order (ties and absent indices fall
/// back to position in the IR).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub trigger: Expr,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub declaration_index: Option<usize>,
}

/// State-mutating policy action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// `variable[t] = value`
    Assign { variable: String, value: Expr },

    /// `variable[t] *= factor`
    Multiply { variable: String, factor: Expr },

    /// `variable[t] += amount`
    Add { variable: String, amount: Expr },

    /// Nested block selected by `condition`
    Conditional {
        condition: Expr,
        then: Vec<Action>,
        #[serde(default)]
        otherwise: Vec<Action>,
    },

    /// Audit event with evaluated fields
    Emit {
        event: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        fields: BTreeMap<String, Expr>,
    },
}

impl Action {
    /// Variable mutated by this action, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            Action::Assign { variable, .. }
            | Action::Multiply { variable, .. }
            | Action::Add { variable, .. } => Some(variable),
            Action::Conditional { .. } | Action::Emit { .. } => None,
        }
    }

    /// Every expression this action (and its sub-blocks) evaluates
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_expressions(&mut out);
        out
    }

    fn collect_expressions<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Action::Assign { value, .. } => out.push(value),
            Action::Multiply { factor, .. } => out.push(factor),
            Action::Add { amount, .. } => out.push(amount),
            Action::Conditional {
                condition,
                then,
                otherwise,
            } => {
                out.push(condition);
                for action in then.iter().chain(otherwise.iter()) {
                    action.collect_expressions(out);
                }
            }
            Action::Emit { fields, .. } => out.extend(fields.values()),
        }
    }

    /// Variables targeted by this action and its sub-blocks
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Action::Conditional { then, otherwise, .. } => then
                .iter()
                .chain(otherwise.iter())
                .flat_map(|action| action.targets())
                .collect(),
            other => other.target().into_iter().collect(),
        }
    }
}
