//! Built-in scalar functions.
//!
//! The engine carries a deliberately small catalog, shaped by the reports it
//! reproduces:
//! - **DATEDIFF(unit, start, end)** - signed difference between two
//!   date/timestamp values in years, months, days, hours, minutes or seconds
//! - **DATE_BUCKET(granularity, d)** - truncate a date/timestamp to a
//!   coarser text bucket for grouping: `year` → "2023", `month` → "2023-02",
//!   `weekday` → "Monday"
//! - **COALESCE(a, b, ...)** - first non-null argument
//! - **ABS(x)**, **ROUND(x [, digits])** - numeric helpers
//!
//! All functions propagate null: a null argument (other than to COALESCE)
//! yields null.

use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::types::FieldValue;
use chrono::{Datelike, NaiveDateTime};
use rust_decimal::prelude::*;

/// Units accepted by DATEDIFF.
pub const DATEDIFF_UNITS: &[&str] = &["years", "months", "days", "hours", "minutes", "seconds"];

/// Granularities accepted by DATE_BUCKET.
pub const DATE_BUCKET_GRANULARITIES: &[&str] = &["year", "month", "weekday"];

/// Scalar function dispatch over already-evaluated arguments.
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    /// Evaluate a function by name. Unknown names are rejected here as a
    /// backstop; pipeline validation rejects them before execution starts.
    pub fn evaluate(name: &str, args: &[FieldValue]) -> EngineResult<FieldValue> {
        match name.to_uppercase().as_str() {
            "DATEDIFF" => Self::datediff(args),
            "DATE_BUCKET" => Self::date_bucket(args),
            "COALESCE" => Self::coalesce(args),
            "ABS" => Self::abs(args),
            "ROUND" => Self::round(args),
            other => Err(EngineError::schema_error(
                format!(
                    "Unknown function '{}'. Supported functions: DATEDIFF, DATE_BUCKET, COALESCE, ABS, ROUND",
                    other
                ),
                None,
            )),
        }
    }

    /// DATEDIFF(unit, start, end): signed `end - start` in whole units.
    /// Months and years count calendar boundaries, not elapsed duration.
    fn datediff(args: &[FieldValue]) -> EngineResult<FieldValue> {
        if args.len() != 3 {
            return Err(EngineError::schema_error(
                "DATEDIFF requires exactly three arguments: DATEDIFF(unit, start, end)",
                None,
            ));
        }
        let unit = match &args[0] {
            FieldValue::String(s) => s.to_lowercase(),
            other => {
                return Err(EngineError::schema_error(
                    format!("DATEDIFF unit must be a string, got {}", other.type_name()),
                    None,
                ));
            }
        };
        let (start, end) = match (&args[1], &args[2]) {
            (FieldValue::Null, _) | (_, FieldValue::Null) => return Ok(FieldValue::Null),
            (s, e) => (Self::to_datetime(s, "DATEDIFF")?, Self::to_datetime(e, "DATEDIFF")?),
        };

        let result = match unit.as_str() {
            "seconds" => (end - start).num_seconds(),
            "minutes" => (end - start).num_minutes(),
            "hours" => (end - start).num_hours(),
            "days" => (end - start).num_days(),
            "months" => Self::month_span(start, end),
            "years" => Self::month_span(start, end) / 12,
            other => {
                return Err(EngineError::arithmetic_error(format!(
                    "Unsupported DATEDIFF unit '{}'. Supported units: {}",
                    other,
                    DATEDIFF_UNITS.join(", ")
                )));
            }
        };
        Ok(FieldValue::Integer(result))
    }

    /// DATE_BUCKET(granularity, d): truncate to a text bucket for grouping.
    fn date_bucket(args: &[FieldValue]) -> EngineResult<FieldValue> {
        if args.len() != 2 {
            return Err(EngineError::schema_error(
                "DATE_BUCKET requires exactly two arguments: DATE_BUCKET(granularity, date)",
                None,
            ));
        }
        let granularity = match &args[0] {
            FieldValue::String(s) => s.to_lowercase(),
            other => {
                return Err(EngineError::schema_error(
                    format!(
                        "DATE_BUCKET granularity must be a string, got {}",
                        other.type_name()
                    ),
                    None,
                ));
            }
        };
        if args[1].is_null() {
            return Ok(FieldValue::Null);
        }
        let dt = Self::to_datetime(&args[1], "DATE_BUCKET")?;

        let bucket = match granularity.as_str() {
            "year" => format!("{:04}", dt.year()),
            "month" => dt.format("%Y-%m").to_string(),
            "weekday" => dt.format("%A").to_string(),
            other => {
                return Err(EngineError::arithmetic_error(format!(
                    "Unsupported DATE_BUCKET granularity '{}'. Supported: {}",
                    other,
                    DATE_BUCKET_GRANULARITIES.join(", ")
                )));
            }
        };
        Ok(FieldValue::String(bucket))
    }

    /// COALESCE: first non-null argument, or null.
    fn coalesce(args: &[FieldValue]) -> EngineResult<FieldValue> {
        if args.is_empty() {
            return Err(EngineError::schema_error(
                "COALESCE requires at least one argument",
                None,
            ));
        }
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(FieldValue::Null))
    }

    /// ABS over the numeric variants, null-propagating.
    fn abs(args: &[FieldValue]) -> EngineResult<FieldValue> {
        if args.len() != 1 {
            return Err(EngineError::schema_error(
                "ABS requires exactly one argument",
                None,
            ));
        }
        match &args[0] {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Integer(i) => i
                .checked_abs()
                .map(FieldValue::Integer)
                .ok_or_else(|| EngineError::arithmetic_error("Integer overflow in ABS")),
            FieldValue::Float(f) => Ok(FieldValue::Float(f.abs())),
            FieldValue::Decimal(d) => Ok(FieldValue::Decimal(d.abs())),
            other => Err(EngineError::schema_error(
                format!("ABS requires a numeric argument, got {}", other.type_name()),
                None,
            )),
        }
    }

    /// ROUND(x [, digits]), null-propagating. Integers round to themselves.
    fn round(args: &[FieldValue]) -> EngineResult<FieldValue> {
        if args.is_empty() || args.len() > 2 {
            return Err(EngineError::schema_error(
                "ROUND requires one or two arguments: ROUND(value [, digits])",
                None,
            ));
        }
        let digits = match args.get(1) {
            None => 0i64,
            Some(FieldValue::Integer(d)) => *d,
            Some(FieldValue::Null) => return Ok(FieldValue::Null),
            Some(other) => {
                return Err(EngineError::schema_error(
                    format!("ROUND digits must be an integer, got {}", other.type_name()),
                    None,
                ));
            }
        };
        if !(0..=28).contains(&digits) {
            return Err(EngineError::arithmetic_error(format!(
                "ROUND digits out of range: {}",
                digits
            )));
        }
        match &args[0] {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Integer(i) => Ok(FieldValue::Integer(*i)),
            FieldValue::Float(f) => {
                let factor = 10f64.powi(digits as i32);
                Ok(FieldValue::Float((f * factor).round() / factor))
            }
            FieldValue::Decimal(d) => Ok(FieldValue::Decimal(d.round_dp(digits as u32))),
            other => Err(EngineError::schema_error(
                format!("ROUND requires a numeric argument, got {}", other.type_name()),
                None,
            )),
        }
    }

    /// Promote a date or timestamp to a timestamp (dates become midnight).
    fn to_datetime(value: &FieldValue, function: &str) -> EngineResult<NaiveDateTime> {
        match value {
            FieldValue::Date(d) => d.and_hms_opt(0, 0, 0).ok_or_else(|| {
                EngineError::arithmetic_error(format!("Invalid date in {}", function))
            }),
            FieldValue::Timestamp(ts) => Ok(*ts),
            other => Err(EngineError::schema_error(
                format!(
                    "{} requires date or timestamp arguments, got {}",
                    function,
                    other.type_name()
                ),
                None,
            )),
        }
    }

    /// Whole calendar months from `start` to `end` (negative when reversed).
    fn month_span(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        (end.year() as i64 - start.year() as i64) * 12
            + (end.month() as i64 - start.month() as i64)
    }
}
