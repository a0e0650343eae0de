// Expression interpreter
//
// Recursive evaluation of expression trees against an `EvalContext`.
// Reads of uncomputed slots surface as `Eval::NotReady` so the fixed-point
// driver can defer the equation; every other fault is a typed `EvalError`.

use crate::eval::context::{Eval, EvalContext};
use crate::eval::functions::FunctionError;
use crate::models::{AggregateOp, BinaryOperator, Expr, StateError, UnaryOperator, TIME_VARIABLE};
use thiserror::Error;

/// Epsilon for equality and truthiness
pub const FLOAT_EPSILON: f64 = 1e-9;

/// Errors that can occur during expression evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined name: {0}")]
    UndefinedName(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Non-finite result from {0}")]
    NonFinite(String),

    #[error("Index {index} of '{variable}' outside 0..{horizon}")]
    IndexOutOfRange {
        variable: String,
        index: i64,
        horizon: usize,
    },

    #[error("Causality violation: '{variable}' read at index {index} during timestep {step}")]
    CausalityViolation {
        variable: String,
        index: i64,
        step: usize,
    },

    #[error("Empty aggregation window [{from}, {to}] over '{variable}'")]
    EmptyWindow { variable: String, from: i64, to: i64 },

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Unwrap a ready value or return the deferral to the caller
macro_rules! ready {
    ($eval:expr) => {
        match $eval? {
            Eval::Ready(value) => value,
            not_ready => return Ok(not_ready),
        }
    };
}

/// Non-zero (beyond epsilon) values are true
pub fn is_truthy(value: f64) -> bool {
    value.abs() >= FLOAT_EPSILON
}

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Apply a comparison operator
///
/// Returns `None` for non-comparison operators.
pub fn compare(op: BinaryOperator, left: f64, right: f64) -> Option<bool> {
    let equal = (left - right).abs() < FLOAT_EPSILON;
    let result = match op {
        BinaryOperator::Equal => equal,
        BinaryOperator::NotEqual => !equal,
        BinaryOperator::LessThan => left < right,
        BinaryOperator::LessOrEqual => left <= right || equal,
        BinaryOperator::GreaterThan => left > right,
        BinaryOperator::GreaterOrEqual => left >= right || equal,
        _ => return None,
    };
    Some(result)
}

fn finite(value: f64, origin: impl FnOnce() -> String) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite(origin()))
    }
}

/// Evaluate an expression at the context's timestep
///
/// # Errors
///
/// Division by zero, non-finite arithmetic, out-of-range or future reads,
/// unknown names and function faults.
pub fn evaluate(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Eval, EvalError> {
    ctx.ordinal = 0;
    eval_node(expr, ctx)
}

fn eval_node(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Eval, EvalError> {
    match expr {
        Expr::Literal { value } => Ok(Eval::Ready(*value)),

        Expr::VariableRef { name } => {
            if name == TIME_VARIABLE {
                return Ok(Eval::Ready(ctx.step as f64));
            }
            if ctx.state.has_variable(name) {
                return read(ctx, name, ctx.step as i64);
            }
            ctx.parameters
                .get(name)
                .map(|value| Eval::Ready(*value))
                .ok_or_else(|| EvalError::UndefinedName(name.clone()))
        }

        Expr::BinaryOp { op, left, right } => eval_binary(*op, left, right, ctx),

        Expr::UnaryOp { op, operand } => {
            let value = ready!(eval_node(operand, ctx));
            Ok(Eval::Ready(match op {
                UnaryOperator::Neg => -value,
                UnaryOperator::Not => bool_value(!is_truthy(value)),
            }))
        }

        Expr::Indexing { variable, index } => read(ctx, variable, index.resolve(ctx.step)),

        Expr::Call { function, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(ready!(eval_node(arg, ctx)));
            }
            let result = ctx.functions.call(function, &values)?;
            finite(result, || format!("{}()", function)).map(Eval::Ready)
        }

        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            let flag = ready!(eval_node(condition, ctx));
            if is_truthy(flag) {
                eval_node(then_branch, ctx)
            } else {
                eval_node(else_branch, ctx)
            }
        }

        Expr::Aggregation {
            op,
            variable,
            from,
            to,
        } => {
            let start = from.resolve(ctx.step);
            let end = to.resolve(ctx.step);
            // Validate the whole window before reading any slot
            check_index(ctx, variable, end)?;
            check_index(ctx, variable, start)?;
            if start > end {
                return Err(EvalError::EmptyWindow {
                    variable: variable.clone(),
                    from: start,
                    to: end,
                });
            }
            let mut values = Vec::with_capacity((end - start + 1) as usize);
            for index in start..=end {
                values.push(ready!(read(ctx, variable, index)));
            }
            let result = aggregate(*op, &values);
            finite(result, || format!("{:?} over '{}'", op, variable)).map(Eval::Ready)
        }

        Expr::DistributionDraw { distribution } => {
            let ordinal = ctx.ordinal;
            ctx.ordinal += 1;
            let step = ctx.step;
            let value = match (&mut ctx.stream, &mut ctx.draw_cache) {
                (None, _) => distribution.central_value(),
                (Some(rng), Some((cache, owner))) => {
                    cache.get_or_insert_with((*owner, step, ordinal), || distribution.sample(rng))
                }
                (Some(rng), None) => distribution.sample(rng),
            };
            Ok(Eval::Ready(value))
        }
    }
}

fn eval_binary(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    ctx: &mut EvalContext<'_>,
) -> Result<Eval, EvalError> {
    let lhs = ready!(eval_node(left, ctx));

    // Logical operators short-circuit
    match op {
        BinaryOperator::And if !is_truthy(lhs) => return Ok(Eval::Ready(0.0)),
        BinaryOperator::Or if is_truthy(lhs) => return Ok(Eval::Ready(1.0)),
        _ => {}
    }

    let rhs = ready!(eval_node(right, ctx));

    let value = match op {
        BinaryOperator::Add => lhs + rhs,
        BinaryOperator::Subtract => lhs - rhs,
        BinaryOperator::Multiply => lhs * rhs,
        BinaryOperator::Divide => {
            // Overflow from tiny divisors is caught below as non-finite
            if rhs == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            lhs / rhs
        }
        BinaryOperator::Power => lhs.powf(rhs),
        BinaryOperator::And | BinaryOperator::Or => bool_value(is_truthy(rhs)),
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterOrEqual => {
            let flag = compare(op, lhs, rhs).unwrap_or(false);
            return Ok(Eval::Ready(bool_value(flag)));
        }
    };

    finite(value, || format!("'{}'", op.symbol())).map(Eval::Ready)
}

fn check_index(ctx: &EvalContext<'_>, variable: &str, index: i64) -> Result<(), EvalError> {
    if !ctx.state.has_variable(variable) {
        return Err(EvalError::UndefinedName(variable.to_string()));
    }
    if index > ctx.step as i64 {
        return Err(EvalError::CausalityViolation {
            variable: variable.to_string(),
            index,
            step: ctx.step,
        });
    }
    if index < 0 {
        return Err(EvalError::IndexOutOfRange {
            variable: variable.to_string(),
            index,
            horizon: ctx.state.horizon(),
        });
    }
    Ok(())
}

fn read(ctx: &EvalContext<'_>, variable: &str, index: i64) -> Result<Eval, EvalError> {
    check_index(ctx, variable, index)?;
    let step = index as usize;
    Ok(match ctx.state.value(variable, step)? {
        Some(value) => Eval::Ready(value),
        None => Eval::NotReady {
            variable: variable.to_string(),
            step,
        },
    })
}

fn aggregate(op: AggregateOp, values: &[f64]) -> f64 {
    match op {
        AggregateOp::Sum => values.iter().sum(),
        AggregateOp::Mean => values.iter().sum::<f64>() / values.len() as f64,
        AggregateOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateOp::Product => values.iter().product(),
    }
}
