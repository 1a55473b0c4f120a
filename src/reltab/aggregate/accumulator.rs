//! Per-partition aggregate state.
//!
//! A [`GroupAccumulator`] carries the running state for one partition: a row
//! count, per-aggregate non-null counts, sums, Welford mean/M2 state for
//! avg/stdev, and running min/max. State is keyed by the aggregate's output
//! column name, reset at partition start (a fresh accumulator per key) and
//! read once when the partition is finalized.

use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::types::{compare_values, FieldValue};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Running sum that keeps the input's numeric type: integer sums stay
/// integers, decimal sums stay exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SumState {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
}

impl SumState {
    /// Fold one non-null numeric value into the sum, promoting
    /// Int → Float / Int → Decimal when the inputs mix types. Overflow is an
    /// [`EngineError::ArithmeticError`], matching scalar addition.
    fn add(self, value: &FieldValue) -> EngineResult<SumState> {
        let state = match (self, value) {
            (SumState::Int(acc), FieldValue::Integer(i)) => {
                SumState::Int(Self::checked_int(acc.checked_add(*i))?)
            }
            (SumState::Int(acc), FieldValue::Float(f)) => SumState::Float(acc as f64 + f),
            (SumState::Int(acc), FieldValue::Decimal(d)) => {
                SumState::Decimal(Self::checked_decimal(Decimal::from(acc).checked_add(*d))?)
            }
            (SumState::Float(acc), FieldValue::Integer(i)) => SumState::Float(acc + *i as f64),
            (SumState::Float(acc), FieldValue::Float(f)) => SumState::Float(acc + f),
            (SumState::Float(acc), FieldValue::Decimal(d)) => {
                SumState::Float(acc + Self::decimal_to_f64(d)?)
            }
            (SumState::Decimal(acc), FieldValue::Integer(i)) => {
                SumState::Decimal(Self::checked_decimal(acc.checked_add(Decimal::from(*i)))?)
            }
            (SumState::Decimal(acc), FieldValue::Decimal(d)) => {
                SumState::Decimal(Self::checked_decimal(acc.checked_add(*d))?)
            }
            (SumState::Decimal(acc), FieldValue::Float(f)) => {
                SumState::Float(Self::decimal_to_f64(&acc)? + f)
            }
            (acc, _) => acc,
        };
        Ok(state)
    }

    fn checked_int(result: Option<i64>) -> EngineResult<i64> {
        result.ok_or_else(|| EngineError::arithmetic_error("Integer overflow in sum"))
    }

    fn checked_decimal(result: Option<Decimal>) -> EngineResult<Decimal> {
        result.ok_or_else(|| EngineError::arithmetic_error("Decimal overflow in sum"))
    }

    fn decimal_to_f64(d: &Decimal) -> EngineResult<f64> {
        d.to_f64().ok_or_else(|| {
            EngineError::arithmetic_error("Decimal not representable as Float in sum")
        })
    }

    fn from_value(value: &FieldValue) -> Option<SumState> {
        match value {
            FieldValue::Integer(i) => Some(SumState::Int(*i)),
            FieldValue::Float(f) => Some(SumState::Float(*f)),
            FieldValue::Decimal(d) => Some(SumState::Decimal(*d)),
            _ => None,
        }
    }

    fn into_value(self) -> FieldValue {
        match self {
            SumState::Int(i) => FieldValue::Integer(i),
            SumState::Float(f) => FieldValue::Float(f),
            SumState::Decimal(d) => FieldValue::Decimal(d),
        }
    }
}

/// Welford's online mean/variance state: O(1) memory for AVG and STDEV.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WelfordState {
    count: u64,
    mean: f64,
    m2: f64,
}

impl WelfordState {
    /// Fold one non-null observation.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Mean over the non-null observations; null with zero observations.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }

    /// Sample standard deviation; null with fewer than 2 observations.
    pub fn stddev_samp(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some((self.m2 / (self.count - 1) as f64).sqrt())
        }
    }
}

/// Accumulated state for a single partition, keyed by aggregate output name.
#[derive(Debug, Clone, Default)]
pub struct GroupAccumulator {
    /// Rows seen in this partition, nulls included (`count(*)`)
    pub count: u64,
    /// Non-null input counts per `count(expr)` aggregate
    pub non_null_counts: HashMap<String, i64>,
    /// Running sums per `sum(expr)` aggregate; absent until the first
    /// non-null input, so an all-null sum finalizes to null
    pub sums: HashMap<String, SumState>,
    /// Welford state per avg/stdev aggregate
    pub welford: HashMap<String, WelfordState>,
    /// Running minima and maxima, nulls skipped
    pub mins: HashMap<String, FieldValue>,
    pub maxs: HashMap<String, FieldValue>,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one row into the partition (every row, null inputs included).
    pub fn increment_count(&mut self) {
        self.count += 1;
    }

    /// Count a non-null input for a `count(expr)` aggregate.
    pub fn add_non_null(&mut self, name: &str) {
        *self.non_null_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Fold a non-null numeric value into a sum.
    pub fn add_sum(&mut self, name: &str, value: &FieldValue) -> EngineResult<()> {
        match self.sums.get(name) {
            Some(state) => {
                let updated = state.add(value)?;
                self.sums.insert(name.to_string(), updated);
            }
            None => {
                if let Some(state) = SumState::from_value(value) {
                    self.sums.insert(name.to_string(), state);
                }
            }
        }
        Ok(())
    }

    /// Fold a non-null observation into Welford state for avg/stdev.
    pub fn update_welford(&mut self, name: &str, value: f64) {
        self.welford
            .entry(name.to_string())
            .or_default()
            .update(value);
    }

    /// Track a running minimum, skipping nulls.
    pub fn update_min(&mut self, name: &str, value: FieldValue) {
        match self.mins.get(name) {
            Some(current) if compare_values(&value, current) != Some(Ordering::Less) => {}
            _ => {
                self.mins.insert(name.to_string(), value);
            }
        }
    }

    /// Track a running maximum, skipping nulls.
    pub fn update_max(&mut self, name: &str, value: FieldValue) {
        match self.maxs.get(name) {
            Some(current) if compare_values(&value, current) != Some(Ordering::Greater) => {}
            _ => {
                self.maxs.insert(name.to_string(), value);
            }
        }
    }

    /// Finalized sum; null when the partition had no non-null inputs.
    pub fn sum_value(&self, name: &str) -> FieldValue {
        self.sums
            .get(name)
            .map(|s| s.into_value())
            .unwrap_or(FieldValue::Null)
    }

    /// Finalized average; null when the partition had no non-null inputs.
    pub fn avg_value(&self, name: &str) -> FieldValue {
        self.welford
            .get(name)
            .and_then(|w| w.mean())
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Null)
    }

    /// Finalized sample stdev; null with fewer than 2 non-null inputs.
    pub fn stddev_value(&self, name: &str) -> FieldValue {
        self.welford
            .get(name)
            .and_then(|w| w.stddev_samp())
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Null)
    }
}
