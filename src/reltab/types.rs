//! Core scalar value types for the analytics engine.
//!
//! This module contains the fundamental value type used throughout the
//! engine:
//! - [`FieldValue`] - the tagged scalar supporting SQL-style data types,
//!   including a first-class `Null` variant for three-valued logic
//! - [`GroupKey`] - a hash-precomputed tuple of values used for GROUP BY
//!   partitioning and hash joins
//!
//! Null propagation is threaded explicitly through every arithmetic and
//! comparison operator rather than relying on implicit coercions: any
//! arithmetic or comparison with a null operand yields null.

use crate::reltab::error::{EngineError, EngineResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value in a table cell.
///
/// This enum represents all scalar types the engine evaluates over. `Null`
/// is a variant of the value itself, not an absent entry, so every operator
/// handles it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Exact decimal for financial amounts
    Decimal(Decimal),
    /// UTF-8 string
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Calendar date (no time component)
    Date(NaiveDate),
    /// Date and time (no timezone)
    Timestamp(NaiveDateTime),
    /// SQL NULL
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::Timestamp(t) => write!(f, "{}", t),
        }
    }
}

/// Hash implementation so values can participate in [`GroupKey`]s.
///
/// `f64` hashes by bit representation, which handles NaN, infinity and -0.0
/// deterministically.
impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FieldValue::Integer(i) => i.hash(state),
            FieldValue::Float(f) => f.to_bits().hash(state),
            FieldValue::Decimal(d) => d.hash(state),
            FieldValue::String(s) => s.hash(state),
            FieldValue::Boolean(b) => b.hash(state),
            FieldValue::Date(d) => {
                d.year().hash(state);
                d.month().hash(state);
                d.day().hash(state);
            }
            FieldValue::Timestamp(ts) => ts.and_utc().timestamp_millis().hash(state),
            FieldValue::Null => {}
        }
    }
}

impl FieldValue {
    /// Returns true for the `Null` variant.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Returns true for `Integer`, `Float` and `Decimal`.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldValue::Integer(_) | FieldValue::Float(_) | FieldValue::Decimal(_)
        )
    }

    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "Integer",
            FieldValue::Float(_) => "Float",
            FieldValue::Decimal(_) => "Decimal",
            FieldValue::String(_) => "Text",
            FieldValue::Boolean(_) => "Boolean",
            FieldValue::Date(_) => "Date",
            FieldValue::Timestamp(_) => "Timestamp",
            FieldValue::Null => "Null",
        }
    }

    /// Lossy numeric view, used by averaging aggregates and moving-average
    /// frames. Returns `None` for null and non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Addition with SQL null propagation.
    pub fn add(&self, other: &FieldValue) -> EngineResult<FieldValue> {
        self.numeric_binop(other, "add", |a, b| a.checked_add(b), |a, b| Some(a + b), |a, b| {
            a.checked_add(b)
        })
    }

    /// Subtraction with SQL null propagation.
    pub fn subtract(&self, other: &FieldValue) -> EngineResult<FieldValue> {
        self.numeric_binop(other, "subtract", |a, b| a.checked_sub(b), |a, b| Some(a - b), |a, b| {
            a.checked_sub(b)
        })
    }

    /// Multiplication with SQL null propagation.
    pub fn multiply(&self, other: &FieldValue) -> EngineResult<FieldValue> {
        self.numeric_binop(other, "multiply", |a, b| a.checked_mul(b), |a, b| Some(a * b), |a, b| {
            a.checked_mul(b)
        })
    }

    /// Division with SQL null propagation.
    ///
    /// Integer operands divide as floats so that analytic ratios like
    /// `sum / count` keep their fractional part. Division by zero is an
    /// [`EngineError::ArithmeticError`], never a null.
    pub fn divide(&self, other: &FieldValue) -> EngineResult<FieldValue> {
        if self.is_null() || other.is_null() {
            return Ok(FieldValue::Null);
        }
        match (self, other) {
            (FieldValue::Decimal(_), _) | (_, FieldValue::Decimal(_)) => {
                let a = self.to_decimal_operand("divide")?;
                let b = other.to_decimal_operand("divide")?;
                if b.is_zero() {
                    return Err(EngineError::arithmetic_error("Division by zero"));
                }
                a.checked_div(b)
                    .map(FieldValue::Decimal)
                    .ok_or_else(|| EngineError::arithmetic_error("Decimal division overflow"))
            }
            _ => {
                let a = self.to_f64_operand("divide")?;
                let b = other.to_f64_operand("divide")?;
                if b == 0.0 {
                    return Err(EngineError::arithmetic_error("Division by zero"));
                }
                Ok(FieldValue::Float(a / b))
            }
        }
    }

    /// Modulo with SQL null propagation; zero divisor is an arithmetic error.
    pub fn modulo(&self, other: &FieldValue) -> EngineResult<FieldValue> {
        if self.is_null() || other.is_null() {
            return Ok(FieldValue::Null);
        }
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => {
                if *b == 0 {
                    Err(EngineError::arithmetic_error("Modulo by zero"))
                } else {
                    Ok(FieldValue::Integer(a % b))
                }
            }
            _ => {
                let a = self.to_f64_operand("modulo")?;
                let b = other.to_f64_operand("modulo")?;
                if b == 0.0 {
                    Err(EngineError::arithmetic_error("Modulo by zero"))
                } else {
                    Ok(FieldValue::Float(a % b))
                }
            }
        }
    }

    /// Arithmetic negation with null propagation.
    pub fn negate(&self) -> EngineResult<FieldValue> {
        match self {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Integer(i) => i
                .checked_neg()
                .map(FieldValue::Integer)
                .ok_or_else(|| EngineError::arithmetic_error("Integer overflow in negate")),
            FieldValue::Float(f) => Ok(FieldValue::Float(-f)),
            FieldValue::Decimal(d) => Ok(FieldValue::Decimal(-*d)),
            other => Err(EngineError::arithmetic_error(format!(
                "Cannot negate {} value",
                other.type_name()
            ))),
        }
    }

    /// Shared implementation of add/subtract/multiply over the numeric
    /// variants, with Integer → Float → Decimal promotion.
    fn numeric_binop(
        &self,
        other: &FieldValue,
        op_name: &str,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> Option<f64>,
        decimal_op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> EngineResult<FieldValue> {
        if self.is_null() || other.is_null() {
            return Ok(FieldValue::Null);
        }
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => int_op(*a, *b)
                .map(FieldValue::Integer)
                .ok_or_else(|| {
                    EngineError::arithmetic_error(format!("Integer overflow in {}", op_name))
                }),
            (FieldValue::Decimal(_), _) | (_, FieldValue::Decimal(_)) => {
                let a = self.to_decimal_operand(op_name)?;
                let b = other.to_decimal_operand(op_name)?;
                decimal_op(a, b).map(FieldValue::Decimal).ok_or_else(|| {
                    EngineError::arithmetic_error(format!("Decimal overflow in {}", op_name))
                })
            }
            _ => {
                let a = self.to_f64_operand(op_name)?;
                let b = other.to_f64_operand(op_name)?;
                float_op(a, b).map(FieldValue::Float).ok_or_else(|| {
                    EngineError::arithmetic_error(format!("Float overflow in {}", op_name))
                })
            }
        }
    }

    fn to_f64_operand(&self, op_name: &str) -> EngineResult<f64> {
        self.as_f64().ok_or_else(|| {
            EngineError::arithmetic_error(format!(
                "Cannot {} non-numeric {} value",
                op_name,
                self.type_name()
            ))
        })
    }

    fn to_decimal_operand(&self, op_name: &str) -> EngineResult<Decimal> {
        match self {
            FieldValue::Integer(i) => Ok(Decimal::from(*i)),
            FieldValue::Float(f) => Decimal::from_f64(*f).ok_or_else(|| {
                EngineError::arithmetic_error(format!("Float {} not representable as Decimal", f))
            }),
            FieldValue::Decimal(d) => Ok(*d),
            other => Err(EngineError::arithmetic_error(format!(
                "Cannot {} non-numeric {} value",
                op_name,
                other.type_name()
            ))),
        }
    }
}

/// Compare two non-null values of compatible types.
///
/// Returns `None` when the values are incomparable (mixed classes such as
/// Text vs Integer) or when either side is null: null comparison semantics
/// belong to the caller, since ordering ("nulls last") and predicate
/// evaluation ("unknown") disagree on what a null means.
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> Option<Ordering> {
    use FieldValue::*;
    match (a, b) {
        (Null, _) | (_, Null) => None,
        (Integer(a), Integer(b)) => Some(a.cmp(b)),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
        (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Integer(a), Decimal(b)) => Some(rust_decimal::Decimal::from(*a).cmp(b)),
        (Decimal(a), Integer(b)) => Some(a.cmp(&rust_decimal::Decimal::from(*b))),
        (Float(a), Decimal(b)) => b.to_f64().and_then(|b| a.partial_cmp(&b)),
        (Decimal(a), Float(b)) => a.to_f64().and_then(|a| a.partial_cmp(b)),
        (String(a), String(b)) => Some(a.cmp(b)),
        (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
        (Date(a), Date(b)) => Some(a.cmp(b)),
        (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
        // A date compares to a timestamp as midnight of that day
        (Date(a), Timestamp(b)) => a.and_hms_opt(0, 0, 0).map(|a| a.cmp(b)),
        (Timestamp(a), Date(b)) => b.and_hms_opt(0, 0, 0).map(|b| a.cmp(&b)),
        _ => None,
    }
}

/// Hash-precomputed group key for GROUP BY partitioning and hash joins.
///
/// Uses `Arc<[FieldValue]>` so a key can be shared between the partition map
/// and the first-occurrence ordering vector without cloning its values, and
/// pre-computes its `FxHasher` digest once since each key is looked up many
/// times. Nulls participate in keys by value, so all-null keys group
/// together as one partition (SQL GROUP BY semantics).
#[derive(Debug, Clone)]
pub struct GroupKey {
    hash: u64,
    values: Arc<[FieldValue]>,
}

impl GroupKey {
    /// Create a key from the evaluated grouping tuple.
    pub fn new(values: Vec<FieldValue>) -> Self {
        let mut hasher = rustc_hash::FxHasher::default();
        for value in &values {
            value.hash(&mut hasher);
        }
        let hash = hasher.finish();
        Self {
            hash,
            values: Arc::from(values.into_boxed_slice()),
        }
    }

    /// The field values forming the key.
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        self.values.as_ref() == other.values.as_ref()
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
