//! Expression evaluation
//!
//! - `interpreter`: recursive evaluation and the typed `EvalError`
//! - `context`: per-timestep read view, random stream and draw cache
//! - `functions`: the function registry trait and numeric builtins
//!
//! # Example
//!
//! ```
//! use econ_model_engine::eval::{evaluate, BuiltinFunctions, Eval, EvalContext};
//! use econ_model_engine::models::{BinaryOperator, Expr};
//! use econ_model_engine::SimulationState;
//! use std::collections::BTreeMap;
//!
//! let mut state = SimulationState::new(&["revenue".to_string()], 2);
//! state.set("revenue", 0, 1000.0).unwrap();
//!
//! let mut parameters = BTreeMap::new();
//! parameters.insert("growth_rate".to_string(), 0.1);
//!
//! let expr = Expr::binary(
//!     BinaryOperator::Multiply,
//!     Expr::at("revenue", 0),
//!     Expr::binary(BinaryOperator::Add, Expr::literal(1.0), Expr::var("growth_rate")),
//! );
//!
//! let mut ctx = EvalContext::new(&state, &parameters, &BuiltinFunctions, 0);
//! assert_eq!(evaluate(&expr, &mut ctx).unwrap(), Eval::Ready(1100.0));
//! ```

pub mod context;
pub mod functions;
pub mod interpreter;

pub use context::{DrawCache, Eval, EvalContext};
pub use functions::{BuiltinFunctions, FunctionError, FunctionRegistry};
pub use interpreter::{compare, evaluate, is_truthy, EvalError, FLOAT_EPSILON};
