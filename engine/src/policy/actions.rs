// Policy actions
//
// Applies the fixed action vocabulary (assign, multiply, add, conditional
// block, emit) to the run's state at the current timestep. Every mutation is
// written immediately, so later actions and policies see it.

use crate::eval::{evaluate, is_truthy, Eval, EvalContext, EvalError, FunctionRegistry};
use crate::models::{Action, AppliedAction, Expr, PolicyExecution, SimulationState, StateError};
use crate::rng::RngManager;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that stop policy execution (and fail the run)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Policy '{policy}' cannot {action} '{variable}' at t={step}: no value computed")]
    UnresolvedTarget {
        policy: String,
        action: &'static str,
        variable: String,
        step: usize,
    },

    #[error("Policy '{policy}' reads '{missing}' at t={step}, which is not computed")]
    UnresolvedInput {
        policy: String,
        missing: String,
        step: usize,
    },

    #[error("Policy '{policy}' produced a non-finite value for '{variable}'")]
    NonFinite { policy: String, variable: String },

    #[error("Policy '{policy}': {source}")]
    Eval {
        policy: String,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Mutable view of a run handed to policies
pub struct PolicyEnv<'a> {
    pub state: &'a mut SimulationState,
    pub parameters: &'a BTreeMap<String, f64>,
    pub functions: &'a dyn FunctionRegistry,
    pub stream: Option<&'a mut RngManager>,
    pub step: usize,
}

impl PolicyEnv<'_> {
    /// Evaluate against the current (already mutated) state
    pub fn eval(&mut self, expr: &Expr) -> Result<Eval, EvalError> {
        let mut ctx = EvalContext::new(&*self.state, self.parameters, self.functions, self.step)
            .with_stream(self.stream.as_deref_mut());
        evaluate(expr, &mut ctx)
    }

    fn ready(&mut self, policy: &str, expr: &Expr) -> Result<f64, PolicyError> {
        match self.eval(expr) {
            Ok(Eval::Ready(value)) => Ok(value),
            Ok(Eval::NotReady { variable, step }) => Err(PolicyError::UnresolvedInput {
                policy: policy.to_string(),
                missing: variable,
                step,
            }),
            Err(source) => Err(PolicyError::Eval {
                policy: policy.to_string(),
                source,
            }),
        }
    }

    fn update(
        &mut self,
        policy: &str,
        action: &'static str,
        variable: &str,
        apply: impl FnOnce(f64) -> f64,
    ) -> Result<(f64, f64), PolicyError> {
        let previous = self
            .state
            .value(variable, self.step)?
            .ok_or_else(|| PolicyError::UnresolvedTarget {
                policy: policy.to_string(),
                action,
                variable: variable.to_string(),
                step: self.step,
            })?;
        let value = apply(previous);
        if !value.is_finite() {
            return Err(PolicyError::NonFinite {
                policy: policy.to_string(),
                variable: variable.to_string(),
            });
        }
        self.state.set(variable, self.step, value)?;
        Ok((previous, value))
    }
}

/// Apply one action (recursively for conditional blocks), logging every
/// applied effect
pub fn apply_action(
    policy: &str,
    action: &Action,
    env: &mut PolicyEnv<'_>,
    log: &mut Vec<PolicyExecution>,
) -> Result<(), PolicyError> {
    let applied = match action {
        Action::Assign { variable, value } => {
            let value = env.ready(policy, value)?;
            if !value.is_finite() {
                return Err(PolicyError::NonFinite {
                    policy: policy.to_string(),
                    variable: variable.clone(),
                });
            }
            let previous = env.state.value(variable, env.step)?;
            env.state.set(variable, env.step, value)?;
            AppliedAction::Assign {
                variable: variable.clone(),
                previous,
                value,
            }
        }

        Action::Multiply { variable, factor } => {
            let factor = env.ready(policy, factor)?;
            let (previous, value) = env.update(policy, "multiply", variable, |x| x * factor)?;
            AppliedAction::Multiply {
                variable: variable.clone(),
                factor,
                previous,
                value,
            }
        }

        Action::Add { variable, amount } => {
            let amount = env.ready(policy, amount)?;
            let (previous, value) = env.update(policy, "add to", variable, |x| x + amount)?;
            AppliedAction::Add {
                variable: variable.clone(),
                amount,
                previous,
                value,
            }
        }

        Action::Conditional {
            condition,
            then,
            otherwise,
        } => {
            let branch = if is_truthy(env.ready(policy, condition)?) {
                then
            } else {
                otherwise
            };
            for nested in branch {
                apply_action(policy, nested, env, log)?;
            }
            return Ok(());
        }

        Action::Emit {
            event,
            message,
            fields,
        } => {
            let mut values = BTreeMap::new();
            for (name, expr) in fields {
                values.insert(name.clone(), env.ready(policy, expr)?);
            }
            AppliedAction::Emit {
                event: event.clone(),
                message: message.clone(),
                fields: values,
            }
        }
    };

    log.push(PolicyExecution {
        timestep: env.step,
        policy: policy.to_string(),
        action: applied,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::BuiltinFunctions;
    use crate::models::BinaryOperator;

    fn with_env<R>(x: Option<f64>, body: impl FnOnce(&mut PolicyEnv<'_>) -> R) -> (R, SimulationState) {
        let mut state = SimulationState::new(&["x".to_string()], 2);
        if let Some(value) = x {
            state.set("x", 0, value).unwrap();
        }
        let params = BTreeMap::new();
        let result = {
            let mut env = PolicyEnv {
                state: &mut state,
                parameters: &params,
                functions: &BuiltinFunctions,
                stream: None,
                step: 0,
            };
            body(&mut env)
        };
        (result, state)
    }

    #[test]
    fn test_assign_records_previous_value() {
        let action = Action::Assign {
            variable: "x".to_string(),
            value: Expr::literal(3.0),
        };
        let mut log = Vec::new();
        let (result, state) = with_env(Some(1.0), |env| apply_action("p", &action, env, &mut log));
        result.unwrap();

        assert_eq!(state.value("x", 0).unwrap(), Some(3.0));
        assert_eq!(
            log[0].action,
            AppliedAction::Assign {
                variable: "x".to_string(),
                previous: Some(1.0),
                value: 3.0,
            }
        );
    }

    #[test]
    fn test_multiply_without_value_fails() {
        let action = Action::Multiply {
            variable: "x".to_string(),
            factor: Expr::literal(2.0),
        };
        let mut log = Vec::new();
        let (result, _) = with_env(None, |env| apply_action("p", &action, env, &mut log));
        assert!(matches!(result, Err(PolicyError::UnresolvedTarget { .. })));
        assert!(log.is_empty());
    }

    #[test]
    fn test_conditional_block_sees_earlier_mutation() {
        let actions = vec![
            Action::Add {
                variable: "x".to_string(),
                amount: Expr::literal(10.0),
            },
            Action::Conditional {
                condition: Expr::binary(
                    BinaryOperator::GreaterThan,
                    Expr::var("x"),
                    Expr::literal(10.0),
                ),
                then: vec![Action::Emit {
                    event: "large".to_string(),
                    message: "x grew".to_string(),
                    fields: [("x".to_string(), Expr::var("x"))].into_iter().collect(),
                }],
                otherwise: vec![],
            },
        ];
        let mut log = Vec::new();
        let (result, _) = with_env(Some(5.0), |env| {
            actions
                .iter()
                .try_for_each(|action| apply_action("p", action, env, &mut log))
        });
        result.unwrap();

        assert_eq!(log.len(), 2);
        let AppliedAction::Emit { fields, .. } = &log[1].action else {
            panic!("expected emit");
        };
        assert_eq!(fields["x"], 15.0);
    }
}
