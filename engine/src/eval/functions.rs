// Function registry
//
// Expressions call named functions through this trait. The standard library
// of economic functions lives outside the engine; `BuiltinFunctions` covers
// the numeric basics so models run without it.

use thiserror::Error;

/// Errors raised by a function call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function '{function}' expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("Function '{function}': {reason}")]
    Domain { function: String, reason: String },
}

/// Named numeric functions callable from expressions
///
/// Implementations must be pure: the same arguments always give the same
/// result. Registries are shared across parallel runs.
pub trait FunctionRegistry: Send + Sync {
    /// Whether `name` can be called (checked at model load)
    fn contains(&self, name: &str) -> bool;

    /// Invoke `name` with evaluated arguments
    fn call(&self, name: &str, args: &[f64]) -> Result<f64, FunctionError>;
}

/// Numeric builtins
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFunctions;

const BUILTIN_NAMES: [&str; 13] = [
    "min", "max", "abs", "exp", "ln", "log10", "sqrt", "pow", "floor", "ceil", "round", "clamp",
    "safe_div",
];

fn expect_arity(name: &str, args: &[f64], expected: usize) -> Result<(), FunctionError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(FunctionError::Arity {
            function: name.to_string(),
            expected: expected.to_string(),
            found: args.len(),
        })
    }
}

fn domain(name: &str, reason: impl Into<String>) -> FunctionError {
    FunctionError::Domain {
        function: name.to_string(),
        reason: reason.into(),
    }
}

impl FunctionRegistry for BuiltinFunctions {
    fn contains(&self, name: &str) -> bool {
        BUILTIN_NAMES.contains(&name)
    }

    fn call(&self, name: &str, args: &[f64]) -> Result<f64, FunctionError> {
        match name {
            "min" | "max" => {
                if args.is_empty() {
                    return Err(FunctionError::Arity {
                        function: name.to_string(),
                        expected: "at least 1".to_string(),
                        found: 0,
                    });
                }
                let fold = if name == "min" { f64::min } else { f64::max };
                Ok(args[1..].iter().copied().fold(args[0], fold))
            }
            "abs" | "exp" | "floor" | "ceil" | "round" => {
                expect_arity(name, args, 1)?;
                let x = args[0];
                Ok(match name {
                    "abs" => x.abs(),
                    "exp" => x.exp(),
                    "floor" => x.floor(),
                    "ceil" => x.ceil(),
                    _ => x.round(),
                })
            }
            "ln" | "log10" => {
                expect_arity(name, args, 1)?;
                if args[0] <= 0.0 {
                    return Err(domain(name, format!("argument {} must be positive", args[0])));
                }
                Ok(if name == "ln" {
                    args[0].ln()
                } else {
                    args[0].log10()
                })
            }
            "sqrt" => {
                expect_arity(name, args, 1)?;
                if args[0] < 0.0 {
                    return Err(domain(name, format!("argument {} is negative", args[0])));
                }
                Ok(args[0].sqrt())
            }
            "pow" => {
                expect_arity(name, args, 2)?;
                Ok(args[0].powf(args[1]))
            }
            "clamp" => {
                expect_arity(name, args, 3)?;
                let (x, lo, hi) = (args[0], args[1], args[2]);
                if lo > hi {
                    return Err(domain(name, format!("lower bound {} exceeds upper bound {}", lo, hi)));
                }
                Ok(x.clamp(lo, hi))
            }
            "safe_div" => {
                // safe_div(a, b[, fallback]) returns fallback (default 0) when b is zero
                if args.len() != 2 && args.len() != 3 {
                    return Err(FunctionError::Arity {
                        function: name.to_string(),
                        expected: "2 or 3".to_string(),
                        found: args.len(),
                    });
                }
                let fallback = args.get(2).copied().unwrap_or(0.0);
                if args[1].abs() < f64::EPSILON {
                    Ok(fallback)
                } else {
                    Ok(args[0] / args[1])
                }
            }
            other => Err(FunctionError::UnknownFunction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_evaluate() {
        let functions = BuiltinFunctions;
        assert_eq!(functions.call("min", &[3.0, 1.0, 2.0]), Ok(1.0));
        assert_eq!(functions.call("max", &[3.0, 1.0, 2.0]), Ok(3.0));
        assert_eq!(functions.call("clamp", &[5.0, 0.0, 2.0]), Ok(2.0));
        assert_eq!(functions.call("pow", &[2.0, 10.0]), Ok(1024.0));
        assert_eq!(functions.call("safe_div", &[1.0, 0.0]), Ok(0.0));
        assert_eq!(functions.call("safe_div", &[1.0, 0.0, -1.0]), Ok(-1.0));
        assert_eq!(functions.call("round", &[2.5]), Ok(3.0));
    }

    #[test]
    fn test_domain_and_arity_errors() {
        let functions = BuiltinFunctions;
        assert!(matches!(
            functions.call("ln", &[0.0]),
            Err(FunctionError::Domain { .. })
        ));
        assert!(matches!(
            functions.call("abs", &[1.0, 2.0]),
            Err(FunctionError::Arity { found: 2, .. })
        ));
        assert!(matches!(
            functions.call("max", &[]),
            Err(FunctionError::Arity { found: 0, .. })
        ));
        assert_eq!(
            functions.call("npv", &[1.0]),
            Err(FunctionError::UnknownFunction("npv".to_string()))
        );
    }

    #[test]
    fn test_contains_matches_call_table() {
        let functions = BuiltinFunctions;
        for name in BUILTIN_NAMES {
            assert!(functions.contains(name));
        }
        assert!(!functions.contains("npv"));
    }
}
