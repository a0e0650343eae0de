// Expression trees
//
// Closed tagged union over every node kind the compiler emits. Nodes are
// deserialized straight from the IR JSON and evaluated by exhaustive `match`
// in `eval::interpreter`.

use crate::sampling::Distribution;
use serde::{Deserialize, Serialize};

/// Reserved name that evaluates to the current timestep index
pub const TIME_VARIABLE: &str = "t";

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Expression node
///
/// Every node evaluates to an `f64`. Booleans are encoded as `1.0` / `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Numeric constant
    Literal { value: f64 },

    /// Variable at the current timestep, a parameter, or `t`
    VariableRef { name: String },

    /// Arithmetic, comparison or logical operator
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Negation or logical not
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },

    /// Time-indexed variable read (`x[t-1]`, `x[0]`)
    Indexing { variable: String, index: TimeIndex },

    /// Call into the function registry
    Call {
        function: String,
        #[serde(default)]
        args: Vec<Expr>,
    },

    /// `if condition then then_branch else else_branch`
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Reduction of a variable over an inclusive time window
    Aggregation {
        op: AggregateOp,
        variable: String,
        from: TimeIndex,
        to: TimeIndex,
    },

    /// Inline stochastic draw
    DistributionDraw { distribution: Distribution },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "^")]
    Power,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
}

impl BinaryOperator {
    /// True for the six comparison operators
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterOrEqual
        )
    }

    /// Source symbol, used in diagnostics
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Neg,
    Not,
}

/// Reductions available to [`Expr::Aggregation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Sum,
    Mean,
    Min,
    Max,
    Product,
}

/// Time index of a variable read
///
/// `{"offset": -1}` is `x[t-1]`; `{"step": 0}` is `x[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeIndex {
    Relative { offset: i64 },
    Absolute { step: usize },
}

impl TimeIndex {
    /// Resolve against the current timestep
    ///
    /// Returns a signed index; negative values fall before t = 0.
    pub fn resolve(self, current_step: usize) -> i64 {
        match self {
            TimeIndex::Relative { offset } => current_step as i64 + offset,
            TimeIndex::Absolute { step } => step as i64,
        }
    }

    /// Positive relative offsets read the future
    pub fn reads_future(self) -> bool {
        matches!(self, TimeIndex::Relative { offset } if offset > 0)
    }
}

// ============================================================================
// CONSTRUCTORS & TRAVERSAL
// ============================================================================

impl Expr {
    pub fn literal(value: f64) -> Self {
        Expr::Literal { value }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::VariableRef { name: name.into() }
    }

    /// `variable[t + offset]`
    pub fn at(variable: impl Into<String>, offset: i64) -> Self {
        Expr::Indexing {
            variable: variable.into(),
            index: TimeIndex::Relative { offset },
        }
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            function: function.into(),
            args,
        }
    }

    pub fn conditional(condition: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    /// Visit this node and every descendant, parents first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal { .. }
            | Expr::VariableRef { .. }
            | Expr::Indexing { .. }
            | Expr::Aggregation { .. }
            | Expr::DistributionDraw { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::UnaryOp { operand, .. } => operand.walk(visit),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.walk(visit);
                then_branch.walk(visit);
                else_branch.walk(visit);
            }
        }
    }
}
