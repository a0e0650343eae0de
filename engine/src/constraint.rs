//! Constraint checking
//!
//! Pure evaluation of a constraint's condition at one timestep. When the
//! condition's root is a comparison both operands are captured so the
//! violation record shows what failed. Severity is left to the caller: the
//! checker only reports.

use crate::eval::{compare, evaluate, is_truthy, Eval, EvalContext, EvalError};
use crate::models::{BinaryOperator, Constraint, ConstraintViolation, Expr};

/// Result of checking one constraint
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintOutcome {
    Satisfied,
    Violated(ConstraintViolation),

    /// An input was not computed at this timestep
    Skipped { missing: String, step: usize },
}

/// Check `constraint` at the context's timestep
///
/// # Errors
///
/// Evaluation faults (division by zero, causality) propagate unchanged.
pub fn check(constraint: &Constraint, ctx: &mut EvalContext<'_>) -> Result<ConstraintOutcome, EvalError> {
    let (holds, operator, left, right) = match &constraint.condition {
        Expr::BinaryOp { op, left, right } if op.is_comparison() => {
            let lhs = match evaluate(left, ctx)? {
                Eval::Ready(value) => value,
                Eval::NotReady { variable, step } => return Ok(skipped(variable, step)),
            };
            let rhs = match evaluate(right, ctx)? {
                Eval::Ready(value) => value,
                Eval::NotReady { variable, step } => return Ok(skipped(variable, step)),
            };
            let holds = compare(*op, lhs, rhs).unwrap_or(false);
            (holds, Some(*op), Some(lhs), Some(rhs))
        }
        condition => match evaluate(condition, ctx)? {
            Eval::Ready(value) => (is_truthy(value), None, None, None),
            Eval::NotReady { variable, step } => return Ok(skipped(variable, step)),
        },
    };

    if holds {
        return Ok(ConstraintOutcome::Satisfied);
    }

    let step = ctx.step();
    Ok(ConstraintOutcome::Violated(ConstraintViolation {
        timestep: step,
        constraint: constraint.name.clone(),
        severity: constraint.severity,
        message: render_message(constraint, step, operator, left, right),
        operator,
        left,
        right,
    }))
}

fn skipped(missing: String, step: usize) -> ConstraintOutcome {
    ConstraintOutcome::Skipped { missing, step }
}

fn format_operand(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Fill `{name}`, `{t}`, `{left}` and `{right}` in the constraint's message
///
/// An empty template renders a default message.
pub fn render_message(
    constraint: &Constraint,
    step: usize,
    operator: Option<BinaryOperator>,
    left: Option<f64>,
    right: Option<f64>,
) -> String {
    if constraint.message.is_empty() {
        return match operator {
            Some(op) => format!(
                "Constraint '{}' violated at t={}: {} {} {} is false",
                constraint.name,
                step,
                format_operand(left),
                op.symbol(),
                format_operand(right)
            ),
            None => format!("Constraint '{}' violated at t={}", constraint.name, step),
        };
    }

    constraint
        .message
        .replace("{name}", &constraint.name)
        .replace("{t}", &step.to_string())
        .replace("{left}", &format_operand(left))
        .replace("{right}", &format_operand(right))
}
