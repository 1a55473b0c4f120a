//! Expression and ordering AST.
//!
//! These types form the declarative half of the engine: pipeline stage
//! descriptors embed [`Expr`] trees and [`SortKey`]s, and the whole
//! descriptor serializes with serde (see [`crate::reltab::pipeline`]).
//!
//! Expressions reference columns by name and domain thresholds by parameter
//! name; both are resolved and type-checked against the input schema at
//! pipeline-build time, before any row is evaluated.

use serde::{Deserialize, Serialize};

/// Literal values embedded in expressions.
///
/// Decimal, date and timestamp literals travel as strings so the descriptor
/// format stays plain JSON; they are parsed during validation and evaluation
/// (`"123.45"`, `"2023-02-01"`, `"2023-02-01 09:30:00"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralValue {
    Integer(i64),
    Float(f64),
    Decimal(String),
    String(String),
    Boolean(bool),
    Date(String),
    Timestamp(String),
    Null,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    /// Three-valued logical NOT
    Not,
    /// Arithmetic negation
    Negate,
    /// Explicit null test (does not propagate null)
    IsNull,
    /// Explicit non-null test (does not propagate null)
    IsNotNull,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical (three-valued)
    And,
    Or,
}

/// A scalar expression tree evaluated per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Column reference
    Column(String),
    /// Literal value
    Literal(LiteralValue),
    /// Named pipeline parameter, resolved from the caller-supplied parameter
    /// map (business thresholds are parameters, never engine constants)
    Param(String),
    /// Unary operation
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },
    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// Scalar function call: DATEDIFF, DATE_BUCKET, COALESCE, ABS, ROUND
    Function { name: String, args: Vec<Expr> },
    /// CASE expression: the first when-clause whose condition is strictly
    /// true wins; otherwise the else clause, or null
    Case {
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Column reference.
    pub fn column(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    /// Named parameter reference.
    pub fn param(name: impl Into<String>) -> Expr {
        Expr::Param(name.into())
    }

    /// Integer literal.
    pub fn integer(value: i64) -> Expr {
        Expr::Literal(LiteralValue::Integer(value))
    }

    /// Float literal.
    pub fn float(value: f64) -> Expr {
        Expr::Literal(LiteralValue::Float(value))
    }

    /// Text literal.
    pub fn string(value: impl Into<String>) -> Expr {
        Expr::Literal(LiteralValue::String(value.into()))
    }

    /// Date literal from a `YYYY-MM-DD` string.
    pub fn date(value: impl Into<String>) -> Expr {
        Expr::Literal(LiteralValue::Date(value.into()))
    }

    /// Null literal.
    pub fn null() -> Expr {
        Expr::Literal(LiteralValue::Null)
    }

    /// Binary operation.
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Scalar function call.
    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Function {
            name: name.into(),
            args,
        }
    }
}

/// An output column: a name bound to an expression. Used by projection
/// stages and by GROUP BY keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub name: String,
    pub expr: Expr,
}

impl NamedExpr {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// Sort direction for ordering keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// One component of an ordering key. Nulls sort last regardless of
/// direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: OrderDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }
}
