//! Per-row expression evaluation with three-valued logic.
//!
//! Evaluation assumes the expression already passed
//! [`ExpressionValidator`](super::validate::ExpressionValidator) against the
//! input schema; column and parameter misses here still error, but the
//! primary check happens at pipeline-build time.

use crate::reltab::ast::{BinaryOperator, Expr, LiteralValue, UnaryOperator};
use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::table::Row;
use crate::reltab::types::{compare_values, FieldValue};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Named pipeline parameters: business thresholds and other report
/// configuration resolved at run time, never hard-coded in the engine.
pub type Params = HashMap<String, FieldValue>;

/// Evaluates scalar expressions against a row plus a parameter map.
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate an expression to a scalar.
    ///
    /// Null propagation: arithmetic and comparison with a null operand yield
    /// null; AND/OR follow SQL three-valued logic; CASE takes a branch only
    /// when its condition is strictly true; IS NULL / IS NOT NULL and
    /// COALESCE test null explicitly.
    pub fn evaluate(expr: &Expr, row: &Row, params: &Params) -> EngineResult<FieldValue> {
        match expr {
            Expr::Column(name) => row.get(name).cloned().ok_or_else(|| {
                EngineError::schema_error("Unknown column", Some(name))
            }),
            Expr::Literal(literal) => Self::literal_value(literal),
            Expr::Param(name) => params.get(name).cloned().ok_or_else(|| {
                EngineError::schema_error(format!("Unknown parameter '{}'", name), None)
            }),
            Expr::UnaryOp { op, expr } => {
                let value = Self::evaluate(expr, row, params)?;
                Self::apply_unary(*op, value)
            }
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And | BinaryOperator::Or => {
                    Self::evaluate_logical(*op, left, right, row, params)
                }
                _ => {
                    let lhs = Self::evaluate(left, row, params)?;
                    let rhs = Self::evaluate(right, row, params)?;
                    Self::apply_binary(*op, &lhs, &rhs)
                }
            },
            Expr::Function { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(Self::evaluate(arg, row, params)?);
                }
                super::functions::BuiltinFunctions::evaluate(name, &values)
            }
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                for (condition, result) in when_clauses {
                    let cond = Self::evaluate(condition, row, params)?;
                    if Self::as_bool3(&cond)? == Some(true) {
                        return Self::evaluate(result, row, params);
                    }
                }
                match else_clause {
                    Some(expr) => Self::evaluate(expr, row, params),
                    None => Ok(FieldValue::Null),
                }
            }
        }
    }

    /// Evaluate a filter predicate: SQL WHERE semantics, so a null result
    /// excludes the row.
    pub fn evaluate_predicate(expr: &Expr, row: &Row, params: &Params) -> EngineResult<bool> {
        let value = Self::evaluate(expr, row, params)?;
        match Self::as_bool3(&value)? {
            Some(b) => Ok(b),
            None => Ok(false),
        }
    }

    /// Convert a literal to a value, parsing decimal/date/timestamp strings.
    pub(crate) fn literal_value(literal: &LiteralValue) -> EngineResult<FieldValue> {
        match literal {
            LiteralValue::Integer(i) => Ok(FieldValue::Integer(*i)),
            LiteralValue::Float(f) => Ok(FieldValue::Float(*f)),
            LiteralValue::String(s) => Ok(FieldValue::String(s.clone())),
            LiteralValue::Boolean(b) => Ok(FieldValue::Boolean(*b)),
            LiteralValue::Null => Ok(FieldValue::Null),
            LiteralValue::Decimal(s) => Decimal::from_str(s)
                .map(FieldValue::Decimal)
                .map_err(|_| {
                    EngineError::schema_error(format!("Invalid decimal literal '{}'", s), None)
                }),
            LiteralValue::Date(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| {
                    EngineError::schema_error(
                        format!("Invalid date literal '{}', expected YYYY-MM-DD", s),
                        None,
                    )
                }),
            LiteralValue::Timestamp(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(FieldValue::Timestamp)
                .map_err(|_| {
                    EngineError::schema_error(
                        format!(
                            "Invalid timestamp literal '{}', expected YYYY-MM-DD HH:MM:SS",
                            s
                        ),
                        None,
                    )
                }),
        }
    }

    fn apply_unary(op: UnaryOperator, value: FieldValue) -> EngineResult<FieldValue> {
        match op {
            UnaryOperator::IsNull => Ok(FieldValue::Boolean(value.is_null())),
            UnaryOperator::IsNotNull => Ok(FieldValue::Boolean(!value.is_null())),
            UnaryOperator::Negate => value.negate(),
            UnaryOperator::Not => match Self::as_bool3(&value)? {
                Some(b) => Ok(FieldValue::Boolean(!b)),
                None => Ok(FieldValue::Null),
            },
        }
    }

    fn apply_binary(
        op: BinaryOperator,
        lhs: &FieldValue,
        rhs: &FieldValue,
    ) -> EngineResult<FieldValue> {
        match op {
            BinaryOperator::Add => lhs.add(rhs),
            BinaryOperator::Subtract => lhs.subtract(rhs),
            BinaryOperator::Multiply => lhs.multiply(rhs),
            BinaryOperator::Divide => lhs.divide(rhs),
            BinaryOperator::Modulo => lhs.modulo(rhs),
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => Self::apply_comparison(op, lhs, rhs),
            BinaryOperator::And | BinaryOperator::Or => unreachable!("handled in evaluate"),
        }
    }

    /// Comparison with a null operand is null, not false.
    fn apply_comparison(
        op: BinaryOperator,
        lhs: &FieldValue,
        rhs: &FieldValue,
    ) -> EngineResult<FieldValue> {
        if lhs.is_null() || rhs.is_null() {
            return Ok(FieldValue::Null);
        }
        let ordering = compare_values(lhs, rhs).ok_or_else(|| {
            EngineError::schema_error(
                format!(
                    "Cannot compare {} with {}",
                    lhs.type_name(),
                    rhs.type_name()
                ),
                None,
            )
        })?;
        let result = match op {
            BinaryOperator::Equal => ordering == Ordering::Equal,
            BinaryOperator::NotEqual => ordering != Ordering::Equal,
            BinaryOperator::LessThan => ordering == Ordering::Less,
            BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
            BinaryOperator::GreaterThan => ordering == Ordering::Greater,
            BinaryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            _ => unreachable!(),
        };
        Ok(FieldValue::Boolean(result))
    }

    /// Three-valued AND/OR with short-circuiting where the outcome is
    /// already determined: `false AND x = false`, `true OR x = true`.
    fn evaluate_logical(
        op: BinaryOperator,
        left: &Expr,
        right: &Expr,
        row: &Row,
        params: &Params,
    ) -> EngineResult<FieldValue> {
        let lhs = Self::as_bool3(&Self::evaluate(left, row, params)?)?;
        match (op, lhs) {
            (BinaryOperator::And, Some(false)) => return Ok(FieldValue::Boolean(false)),
            (BinaryOperator::Or, Some(true)) => return Ok(FieldValue::Boolean(true)),
            _ => {}
        }
        let rhs = Self::as_bool3(&Self::evaluate(right, row, params)?)?;
        let result = match op {
            BinaryOperator::And => match (lhs, rhs) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            BinaryOperator::Or => match (lhs, rhs) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            _ => unreachable!(),
        };
        Ok(match result {
            Some(b) => FieldValue::Boolean(b),
            None => FieldValue::Null,
        })
    }

    /// Boolean view under three-valued logic: null is "unknown".
    fn as_bool3(value: &FieldValue) -> EngineResult<Option<bool>> {
        match value {
            FieldValue::Boolean(b) => Ok(Some(*b)),
            FieldValue::Null => Ok(None),
            other => Err(EngineError::schema_error(
                format!("Expected a boolean expression, got {}", other.type_name()),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reltab::ast::Expr as E;

    fn row_with(pairs: &[(&str, FieldValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_comparison_with_null_is_null_and_filters_false() {
        let row = row_with(&[("salary", FieldValue::Null)]);
        let expr = E::binary(
            E::column("salary"),
            BinaryOperator::GreaterThan,
            E::integer(1000),
        );
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &row, &Params::new()).unwrap(),
            FieldValue::Null
        );
        assert!(!ExpressionEvaluator::evaluate_predicate(&expr, &row, &Params::new()).unwrap());
    }

    #[test]
    fn test_three_valued_and_or() {
        let row = row_with(&[("flag", FieldValue::Null)]);
        let null_cmp = E::binary(E::column("flag"), BinaryOperator::Equal, E::integer(1));

        // false AND null = false
        let expr = E::binary(
            E::binary(E::integer(1), BinaryOperator::Equal, E::integer(2)),
            BinaryOperator::And,
            null_cmp.clone(),
        );
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &row, &Params::new()).unwrap(),
            FieldValue::Boolean(false)
        );

        // true OR null = true
        let expr = E::binary(
            E::binary(E::integer(1), BinaryOperator::Equal, E::integer(1)),
            BinaryOperator::Or,
            null_cmp.clone(),
        );
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &row, &Params::new()).unwrap(),
            FieldValue::Boolean(true)
        );

        // true AND null = null
        let expr = E::binary(
            E::binary(E::integer(1), BinaryOperator::Equal, E::integer(1)),
            BinaryOperator::And,
            null_cmp,
        );
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &row, &Params::new()).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_case_takes_branch_only_when_strictly_true() {
        let row = row_with(&[("amount", FieldValue::Null)]);
        // CASE WHEN amount > 100 THEN 'high' ELSE 'low' END
        let expr = Expr::Case {
            when_clauses: vec![(
                E::binary(E::column("amount"), BinaryOperator::GreaterThan, E::integer(100)),
                E::string("high"),
            )],
            else_clause: Some(Box::new(E::string("low"))),
        };
        // Null condition falls through to ELSE
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &row, &Params::new()).unwrap(),
            FieldValue::String("low".to_string())
        );
    }

    #[test]
    fn test_param_resolution() {
        let row = row_with(&[("amount", FieldValue::Integer(60_000))]);
        let mut params = Params::new();
        params.insert("threshold".to_string(), FieldValue::Integer(50_000));
        let expr = E::binary(
            E::column("amount"),
            BinaryOperator::GreaterThan,
            E::param("threshold"),
        );
        assert!(ExpressionEvaluator::evaluate_predicate(&expr, &row, &params).unwrap());

        let err =
            ExpressionEvaluator::evaluate(&E::param("missing"), &row, &params).unwrap_err();
        assert!(matches!(err, EngineError::SchemaError { .. }));
    }

    #[test]
    fn test_is_null_does_not_propagate() {
        let row = row_with(&[("x", FieldValue::Null)]);
        let expr = Expr::UnaryOp {
            op: UnaryOperator::IsNull,
            expr: Box::new(E::column("x")),
        };
        assert_eq!(
            ExpressionEvaluator::evaluate(&expr, &row, &Params::new()).unwrap(),
            FieldValue::Boolean(true)
        );
    }

    #[test]
    fn test_date_literal_parsing() {
        let row = Row::new();
        let value =
            ExpressionEvaluator::evaluate(&E::date("2023-02-01"), &row, &Params::new()).unwrap();
        assert_eq!(
            value,
            FieldValue::Date(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap())
        );
    }
}
