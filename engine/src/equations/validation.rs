// Model validation
//
// Pre-execution checks that the model is runnable:
// - Horizon is positive
// - Parameter names are unique and not reserved
// - Every name read by an expression resolves
// - Every called function exists in the registry
// - No expression reads a future timestep (positive relative offsets)
// - Distributions and correlation groups are well-formed
// - Policy actions target model variables
//
// All errors are collected; nothing stops at the first problem.

use crate::equations::organizer::EquationIndex;
use crate::eval::FunctionRegistry;
use crate::models::{EquationCategory, Expr, Model, TimeIndex, TIME_VARIABLE};
use crate::sampling::{ParameterSampler, SamplingError};
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Time horizon must be positive")]
    InvalidHorizon,

    #[error("Duplicate {category} equation for '{variable}' ({location})")]
    DuplicateEquation {
        variable: String,
        category: EquationCategory,
        location: String,
    },

    #[error("Recurrence for '{variable}' has no initial condition")]
    MissingInitialCondition { variable: String },

    #[error("'{variable}' has both {first} and {second} equations")]
    ConflictingDefinitions {
        variable: String,
        first: EquationCategory,
        second: EquationCategory,
    },

    #[error("Undefined reference '{name}' in {location}")]
    UndefinedReference { name: String, location: String },

    #[error("Unknown function '{name}' in {location}")]
    UnknownFunction { name: String, location: String },

    #[error("Causality violation in {location}: '{variable}' read at offset +{offset}")]
    CausalityViolation {
        variable: String,
        offset: i64,
        location: String,
    },

    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    #[error("Parameter name '{0}' is reserved")]
    ReservedParameterName(String),

    #[error("Policy '{policy}' targets unknown variable '{variable}'")]
    UnknownPolicyTarget { policy: String, variable: String },

    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

/// Validation result
pub type ValidationResult = Result<(), Vec<ValidationError>>;

struct Scope<'a> {
    index: &'a EquationIndex,
    parameters: HashSet<&'a str>,
    functions: &'a dyn FunctionRegistry,
}

impl Scope<'_> {
    fn check_expr(&self, expr: &Expr, location: &str, errors: &mut Vec<ValidationError>) {
        expr.walk(&mut |node| match node {
            Expr::VariableRef { name } => {
                if name != TIME_VARIABLE
                    && !self.index.has_variable(name)
                    && !self.parameters.contains(name.as_str())
                {
                    errors.push(ValidationError::UndefinedReference {
                        name: name.clone(),
                        location: location.to_string(),
                    });
                }
            }
            Expr::Indexing { variable, index } => {
                self.check_series(variable, location, errors);
                self.check_offset(variable, *index, location, errors);
            }
            Expr::Aggregation {
                variable, from, to, ..
            } => {
                self.check_series(variable, location, errors);
                self.check_offset(variable, *from, location, errors);
                self.check_offset(variable, *to, location, errors);
            }
            Expr::Call { function, .. } => {
                if !self.functions.contains(function) {
                    errors.push(ValidationError::UnknownFunction {
                        name: function.clone(),
                        location: location.to_string(),
                    });
                }
            }
            Expr::DistributionDraw { distribution } => {
                if let Err(reason) = distribution.validate() {
                    errors.push(
                        SamplingError::InvalidDistribution {
                            owner: location.to_string(),
                            reason,
                        }
                        .into(),
                    );
                }
            }
            Expr::Literal { .. }
            | Expr::BinaryOp { .. }
            | Expr::UnaryOp { .. }
            | Expr::Conditional { .. } => {}
        });
    }

    fn check_series(&self, variable: &str, location: &str, errors: &mut Vec<ValidationError>) {
        if !self.index.has_variable(variable) {
            errors.push(ValidationError::UndefinedReference {
                name: variable.to_string(),
                location: location.to_string(),
            });
        }
    }

    fn check_offset(
        &self,
        variable: &str,
        index: TimeIndex,
        location: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if index.reads_future() {
            errors.push(ValidationError::CausalityViolation {
                variable: variable.to_string(),
                // A future read is always relative, so this is its offset
                offset: index.resolve(0),
                location: location.to_string(),
            });
        }
    }
}

/// Validate a model against its organized equations
///
/// Runs all checks and returns all errors found. Structural equation errors
/// are reported by [`EquationIndex::build`].
pub fn validate_model(
    model: &Model,
    index: &EquationIndex,
    functions: &dyn FunctionRegistry,
) -> ValidationResult {
    let mut errors = Vec::new();

    if model.time_horizon == 0 {
        errors.push(ValidationError::InvalidHorizon);
    }

    let mut seen = HashSet::new();
    for parameter in &model.parameters {
        if parameter.name == TIME_VARIABLE {
            errors.push(ValidationError::ReservedParameterName(parameter.name.clone()));
        }
        if !seen.insert(parameter.name.as_str()) {
            errors.push(ValidationError::DuplicateParameter(parameter.name.clone()));
        }
    }

    let scope = Scope {
        index,
        parameters: seen,
        functions,
    };

    for position in index.retained() {
        let equation = &model.equations[position];
        let location = format!("equation {}", equation.describe());
        scope.check_expr(&equation.expression, &location, &mut errors);
    }

    for constraint in &model.constraints {
        let location = format!("constraint '{}'", constraint.name);
        scope.check_expr(&constraint.condition, &location, &mut errors);
    }

    for policy in &model.policies {
        let location = format!("policy '{}'", policy.name);
        scope.check_expr(&policy.trigger, &location, &mut errors);
        for action in &policy.actions {
            for expr in action.expressions() {
                scope.check_expr(expr, &location, &mut errors);
            }
            for target in action.targets() {
                if !index.has_variable(target) {
                    errors.push(ValidationError::UnknownPolicyTarget {
                        policy: policy.name.clone(),
                        variable: target.to_string(),
                    });
                }
            }
        }
    }

    errors.extend(ParameterSampler::check(model).into_iter().map(ValidationError::from));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
