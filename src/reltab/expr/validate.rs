//! Build-time expression validation.
//!
//! Every expression in a pipeline descriptor is type-checked against the
//! input schema before execution begins: unknown columns, unknown
//! parameters, unknown functions and operand type mismatches all surface as
//! [`EngineError::SchemaError`] here, never mid-row.
//!
//! Inferred types are `Option<FieldType>`: `None` means "null literal /
//! unknown", which is compatible with every type but cannot name an output
//! column type on its own.

use crate::reltab::ast::{BinaryOperator, Expr, LiteralValue, UnaryOperator};
use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::expr::evaluator::{ExpressionEvaluator, Params};
use crate::reltab::expr::functions::{DATEDIFF_UNITS, DATE_BUCKET_GRANULARITIES};
use crate::reltab::schema::{FieldType, Schema};

/// Static expression checker used by pipeline validation.
pub struct ExpressionValidator;

impl ExpressionValidator {
    /// Infer the result type of an expression against a schema, validating
    /// every column, parameter and function reference along the way.
    pub fn infer(
        expr: &Expr,
        schema: &Schema,
        params: &Params,
    ) -> EngineResult<Option<FieldType>> {
        match expr {
            Expr::Column(name) => schema.require(name).map(Some),
            Expr::Literal(literal) => {
                let value = ExpressionEvaluator::literal_value(literal)?;
                Ok(FieldType::of(&value))
            }
            Expr::Param(name) => match params.get(name) {
                Some(value) => Ok(FieldType::of(value)),
                None => Err(EngineError::schema_error(
                    format!("Unknown parameter '{}'", name),
                    None,
                )),
            },
            Expr::UnaryOp { op, expr } => {
                let operand = Self::infer(expr, schema, params)?;
                Self::infer_unary(*op, operand)
            }
            Expr::BinaryOp { left, op, right } => {
                let lhs = Self::infer(left, schema, params)?;
                let rhs = Self::infer(right, schema, params)?;
                Self::infer_binary(*op, lhs, rhs)
            }
            Expr::Function { name, args } => Self::infer_function(name, args, schema, params),
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                let mut result: Option<FieldType> = None;
                for (condition, branch) in when_clauses {
                    Self::expect_boolean(condition, schema, params, "CASE condition")?;
                    let branch_type = Self::infer(branch, schema, params)?;
                    result = Self::unify(result, branch_type, "CASE branches")?;
                }
                if let Some(else_expr) = else_clause {
                    let else_type = Self::infer(else_expr, schema, params)?;
                    result = Self::unify(result, else_type, "CASE branches")?;
                }
                Ok(result)
            }
        }
    }

    /// Infer and insist on a concrete type, for output column declarations.
    pub fn infer_concrete(
        expr: &Expr,
        schema: &Schema,
        params: &Params,
        context: &str,
    ) -> EngineResult<FieldType> {
        Self::infer(expr, schema, params)?.ok_or_else(|| {
            EngineError::schema_error(
                format!("Cannot infer a column type for {} (all-null expression)", context),
                None,
            )
        })
    }

    /// Validate that an expression is boolean-valued (filter predicates,
    /// CASE conditions).
    pub fn expect_boolean(
        expr: &Expr,
        schema: &Schema,
        params: &Params,
        context: &str,
    ) -> EngineResult<()> {
        match Self::infer(expr, schema, params)? {
            Some(FieldType::Boolean) | None => Ok(()),
            Some(other) => Err(EngineError::schema_error(
                format!("{} must be boolean, got {}", context, other.name()),
                None,
            )),
        }
    }

    fn infer_unary(
        op: UnaryOperator,
        operand: Option<FieldType>,
    ) -> EngineResult<Option<FieldType>> {
        match op {
            UnaryOperator::IsNull | UnaryOperator::IsNotNull => Ok(Some(FieldType::Boolean)),
            UnaryOperator::Not => match operand {
                Some(FieldType::Boolean) | None => Ok(Some(FieldType::Boolean)),
                Some(other) => Err(EngineError::schema_error(
                    format!("NOT requires a boolean operand, got {}", other.name()),
                    None,
                )),
            },
            UnaryOperator::Negate => match operand {
                Some(ty) if ty.is_numeric() => Ok(Some(ty)),
                None => Ok(None),
                Some(other) => Err(EngineError::schema_error(
                    format!("Negation requires a numeric operand, got {}", other.name()),
                    None,
                )),
            },
        }
    }

    fn infer_binary(
        op: BinaryOperator,
        lhs: Option<FieldType>,
        rhs: Option<FieldType>,
    ) -> EngineResult<Option<FieldType>> {
        use BinaryOperator::*;
        match op {
            Add | Subtract | Multiply => {
                Self::expect_numeric(lhs, op)?;
                Self::expect_numeric(rhs, op)?;
                Ok(Self::promote_numeric(lhs, rhs))
            }
            Divide => {
                Self::expect_numeric(lhs, op)?;
                Self::expect_numeric(rhs, op)?;
                // Integer division keeps its fractional part
                match (lhs, rhs) {
                    (Some(FieldType::Decimal), _) | (_, Some(FieldType::Decimal)) => {
                        Ok(Some(FieldType::Decimal))
                    }
                    _ => Ok(Some(FieldType::Float)),
                }
            }
            Modulo => {
                Self::expect_numeric(lhs, op)?;
                Self::expect_numeric(rhs, op)?;
                match (lhs, rhs) {
                    (Some(FieldType::Integer), Some(FieldType::Integer)) => {
                        Ok(Some(FieldType::Integer))
                    }
                    _ => Ok(Some(FieldType::Float)),
                }
            }
            Equal | NotEqual | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
                if let (Some(a), Some(b)) = (lhs, rhs) {
                    if !a.comparable_with(&b) {
                        return Err(EngineError::schema_error(
                            format!("Cannot compare {} with {}", a.name(), b.name()),
                            None,
                        ));
                    }
                }
                Ok(Some(FieldType::Boolean))
            }
            And | Or => {
                for operand in [lhs, rhs] {
                    match operand {
                        Some(FieldType::Boolean) | None => {}
                        Some(other) => {
                            return Err(EngineError::schema_error(
                                format!(
                                    "Logical operators require boolean operands, got {}",
                                    other.name()
                                ),
                                None,
                            ));
                        }
                    }
                }
                Ok(Some(FieldType::Boolean))
            }
        }
    }

    fn infer_function(
        name: &str,
        args: &[Expr],
        schema: &Schema,
        params: &Params,
    ) -> EngineResult<Option<FieldType>> {
        match name.to_uppercase().as_str() {
            "DATEDIFF" => {
                if args.len() != 3 {
                    return Err(EngineError::schema_error(
                        "DATEDIFF requires exactly three arguments: DATEDIFF(unit, start, end)",
                        None,
                    ));
                }
                Self::expect_keyword_literal(&args[0], DATEDIFF_UNITS, "DATEDIFF unit")?;
                Self::expect_temporal(&args[1], schema, params, "DATEDIFF")?;
                Self::expect_temporal(&args[2], schema, params, "DATEDIFF")?;
                Ok(Some(FieldType::Integer))
            }
            "DATE_BUCKET" => {
                if args.len() != 2 {
                    return Err(EngineError::schema_error(
                        "DATE_BUCKET requires exactly two arguments: DATE_BUCKET(granularity, date)",
                        None,
                    ));
                }
                Self::expect_keyword_literal(
                    &args[0],
                    DATE_BUCKET_GRANULARITIES,
                    "DATE_BUCKET granularity",
                )?;
                Self::expect_temporal(&args[1], schema, params, "DATE_BUCKET")?;
                Ok(Some(FieldType::Text))
            }
            "COALESCE" => {
                if args.is_empty() {
                    return Err(EngineError::schema_error(
                        "COALESCE requires at least one argument",
                        None,
                    ));
                }
                let mut result: Option<FieldType> = None;
                for arg in args {
                    let arg_type = Self::infer(arg, schema, params)?;
                    result = Self::unify(result, arg_type, "COALESCE arguments")?;
                }
                Ok(result)
            }
            "ABS" => {
                if args.len() != 1 {
                    return Err(EngineError::schema_error(
                        "ABS requires exactly one argument",
                        None,
                    ));
                }
                let operand = Self::infer(&args[0], schema, params)?;
                Self::expect_numeric(operand, BinaryOperator::Add)?;
                Ok(operand)
            }
            "ROUND" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(EngineError::schema_error(
                        "ROUND requires one or two arguments: ROUND(value [, digits])",
                        None,
                    ));
                }
                let operand = Self::infer(&args[0], schema, params)?;
                match operand {
                    Some(ty) if ty.is_numeric() => {}
                    None => {}
                    Some(other) => {
                        return Err(EngineError::schema_error(
                            format!("ROUND requires a numeric argument, got {}", other.name()),
                            None,
                        ));
                    }
                }
                if let Some(digits) = args.get(1) {
                    match Self::infer(digits, schema, params)? {
                        Some(FieldType::Integer) | None => {}
                        Some(other) => {
                            return Err(EngineError::schema_error(
                                format!("ROUND digits must be an integer, got {}", other.name()),
                                None,
                            ));
                        }
                    }
                }
                Ok(operand)
            }
            other => Err(EngineError::schema_error(
                format!(
                    "Unknown function '{}'. Supported functions: DATEDIFF, DATE_BUCKET, COALESCE, ABS, ROUND",
                    other
                ),
                None,
            )),
        }
    }

    /// Unit/granularity arguments must be string literals so they can be
    /// checked here instead of failing one row at a time.
    fn expect_keyword_literal(
        expr: &Expr,
        allowed: &[&str],
        context: &str,
    ) -> EngineResult<()> {
        match expr {
            Expr::Literal(LiteralValue::String(s)) => {
                if allowed.contains(&s.to_lowercase().as_str()) {
                    Ok(())
                } else {
                    Err(EngineError::schema_error(
                        format!(
                            "Unsupported {} '{}'. Supported: {}",
                            context,
                            s,
                            allowed.join(", ")
                        ),
                        None,
                    ))
                }
            }
            _ => Err(EngineError::schema_error(
                format!("{} must be a string literal", context),
                None,
            )),
        }
    }

    fn expect_temporal(
        expr: &Expr,
        schema: &Schema,
        params: &Params,
        function: &str,
    ) -> EngineResult<()> {
        match Self::infer(expr, schema, params)? {
            Some(ty) if ty.is_temporal() => Ok(()),
            None => Ok(()),
            Some(other) => Err(EngineError::schema_error(
                format!(
                    "{} requires date or timestamp arguments, got {}",
                    function,
                    other.name()
                ),
                None,
            )),
        }
    }

    fn expect_numeric(operand: Option<FieldType>, op: BinaryOperator) -> EngineResult<()> {
        match operand {
            Some(ty) if ty.is_numeric() => Ok(()),
            None => Ok(()),
            Some(other) => Err(EngineError::schema_error(
                format!("{:?} requires numeric operands, got {}", op, other.name()),
                None,
            )),
        }
    }

    /// Numeric promotion: Decimal > Float > Integer.
    fn promote_numeric(lhs: Option<FieldType>, rhs: Option<FieldType>) -> Option<FieldType> {
        match (lhs, rhs) {
            (None, other) | (other, None) => other,
            (Some(FieldType::Decimal), _) | (_, Some(FieldType::Decimal)) => {
                Some(FieldType::Decimal)
            }
            (Some(FieldType::Float), _) | (_, Some(FieldType::Float)) => Some(FieldType::Float),
            _ => Some(FieldType::Integer),
        }
    }

    /// Unify two inferred types: equal types, one unknown side, or a common
    /// numeric promotion. Anything else is a schema error.
    fn unify(
        a: Option<FieldType>,
        b: Option<FieldType>,
        context: &str,
    ) -> EngineResult<Option<FieldType>> {
        match (a, b) {
            (None, other) | (other, None) => Ok(other),
            (Some(x), Some(y)) if x == y => Ok(Some(x)),
            (Some(x), Some(y)) if x.is_numeric() && y.is_numeric() => {
                Ok(Self::promote_numeric(Some(x), Some(y)))
            }
            (Some(x), Some(y)) => Err(EngineError::schema_error(
                format!("{} mix {} and {}", context, x.name(), y.name()),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reltab::ast::Expr as E;

    fn schema() -> Schema {
        Schema::new(vec![
            ("salary".to_string(), FieldType::Integer),
            ("dept".to_string(), FieldType::Text),
            ("hired".to_string(), FieldType::Date),
        ])
        .unwrap()
    }

    #[test]
    fn test_unknown_column_is_schema_error() {
        let err = ExpressionValidator::infer(
            &E::column("salry"),
            &schema(),
            &Params::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::schema_error("Unknown column", Some("salry"))
        );
    }

    #[test]
    fn test_arithmetic_promotion_and_division() {
        let expr = E::binary(
            E::column("salary"),
            BinaryOperator::Divide,
            E::integer(12),
        );
        assert_eq!(
            ExpressionValidator::infer(&expr, &schema(), &Params::new()).unwrap(),
            Some(FieldType::Float)
        );
    }

    #[test]
    fn test_incomparable_types_rejected() {
        let expr = E::binary(E::column("dept"), BinaryOperator::LessThan, E::integer(3));
        assert!(ExpressionValidator::infer(&expr, &schema(), &Params::new()).is_err());
    }

    #[test]
    fn test_datediff_unit_checked_at_build_time() {
        let expr = E::func(
            "DATEDIFF",
            vec![E::string("fortnights"), E::column("hired"), E::column("hired")],
        );
        let err = ExpressionValidator::infer(&expr, &schema(), &Params::new()).unwrap_err();
        assert!(matches!(err, EngineError::SchemaError { .. }));
    }

    #[test]
    fn test_null_literal_has_no_concrete_type() {
        assert_eq!(
            ExpressionValidator::infer(&E::null(), &schema(), &Params::new()).unwrap(),
            None
        );
        assert!(ExpressionValidator::infer_concrete(
            &E::null(),
            &schema(),
            &Params::new(),
            "projected column"
        )
        .is_err());
    }

    #[test]
    fn test_coalesce_unifies_numeric_types() {
        let expr = E::func("COALESCE", vec![E::column("salary"), E::float(0.0)]);
        assert_eq!(
            ExpressionValidator::infer(&expr, &schema(), &Params::new()).unwrap(),
            Some(FieldType::Float)
        );
    }
}
