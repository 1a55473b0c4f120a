//! Window functions over ordered partitions.
//!
//! Computes one output value per input row without reducing row count:
//! - **Rank** - standard RANK: ties share a rank, the next distinct
//!   ordering-key value skips ahead by the tie count
//! - **Lag** - the target expression n rows earlier in the same ordered
//!   partition, null when no such row exists
//! - **MovingAvg** - mean of the target over a trailing frame of
//!   (k preceding, current), fewer rows at partition start, nulls skipped
//!
//! Implementation is sort-then-scan: rows are bucketed by partition key
//! (first-occurrence order), each bucket's row indices are sorted by the
//! ordering key, and a single cursor pass computes the function. The moving
//! average slides a running sum/count instead of recomputing its frame.
//! Output rows keep the input row order; the window value is mapped back by
//! original row index.

use crate::reltab::ast::{Expr, SortKey};
use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::expr::{ExpressionEvaluator, ExpressionValidator, Params};
use crate::reltab::schema::{FieldType, Schema};
use crate::reltab::sort::SortProcessor;
use crate::reltab::table::Table;
use crate::reltab::types::{FieldValue, GroupKey};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The window function to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum WindowFunction {
    /// Standard RANK over the ordering key
    Rank,
    /// Value of `target` from `offset` rows earlier in the partition
    Lag { target: Expr, offset: usize },
    /// Trailing moving average of `target` over (preceding, current)
    MovingAvg { target: Expr, preceding: usize },
}

/// A complete window computation: partitioning, ordering, function and the
/// output column it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Output column name, appended to the input schema
    pub output: String,
    /// Function to compute per row
    pub function: WindowFunction,
    /// Partition columns; empty means one partition over the whole table
    pub partition_by: Vec<String>,
    /// Ordering within each partition; nulls sort last
    pub order_by: Vec<SortKey>,
}

/// Window stage executor.
pub struct WindowProcessor;

impl WindowProcessor {
    /// Validate all column references and compute the output schema (input
    /// schema plus the window's output column). Runs at pipeline-build time,
    /// before any row is evaluated.
    pub fn validate(spec: &WindowSpec, schema: &Schema, params: &Params) -> EngineResult<Schema> {
        for column in &spec.partition_by {
            schema.require(column)?;
        }
        SortProcessor::validate(&spec.order_by, schema)?;

        let output_type = match &spec.function {
            WindowFunction::Rank => {
                if spec.order_by.is_empty() {
                    return Err(EngineError::schema_error(
                        "Rank requires an ordering key",
                        None,
                    ));
                }
                FieldType::Integer
            }
            WindowFunction::Lag { target, offset } => {
                if *offset == 0 {
                    return Err(EngineError::schema_error(
                        "Lag offset must be at least 1",
                        None,
                    ));
                }
                ExpressionValidator::infer_concrete(
                    target,
                    schema,
                    params,
                    &format!("window column '{}'", spec.output),
                )?
            }
            WindowFunction::MovingAvg { target, .. } => {
                match ExpressionValidator::infer(target, schema, params)? {
                    Some(ty) if !ty.is_numeric() => {
                        return Err(EngineError::schema_error(
                            format!(
                                "Moving average requires a numeric target, got {}",
                                ty.name()
                            ),
                            None,
                        ));
                    }
                    _ => {}
                }
                FieldType::Float
            }
        };
        schema.with_column(&spec.output, output_type)
    }

    /// Compute the window column and append it to every row.
    pub fn process(table: &Table, spec: &WindowSpec, params: &Params) -> EngineResult<Table> {
        let output_schema = Self::validate(spec, table.schema(), params)?;
        let rows = table.rows();

        // Evaluate ordering tuples once per row
        let mut order_values: Vec<Vec<FieldValue>> = Vec::with_capacity(rows.len());
        for row in rows {
            let tuple = spec
                .order_by
                .iter()
                .map(|key| row.get(&key.column).cloned().unwrap_or(FieldValue::Null))
                .collect();
            order_values.push(tuple);
        }

        // Bucket row indices by partition key, keeping first-occurrence order
        let mut partition_order: Vec<GroupKey> = Vec::new();
        let mut partitions: FxHashMap<GroupKey, Vec<usize>> = FxHashMap::default();
        for (idx, row) in rows.iter().enumerate() {
            let key_values = spec
                .partition_by
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or(FieldValue::Null))
                .collect();
            let key = GroupKey::new(key_values);
            partitions
                .entry(key.clone())
                .or_insert_with(|| {
                    partition_order.push(key);
                    Vec::new()
                })
                .push(idx);
        }

        let mut output: Vec<FieldValue> = vec![FieldValue::Null; rows.len()];
        for key in &partition_order {
            let mut indices = partitions[key].clone();
            // Stable, so equal ordering keys keep input order
            indices.sort_by(|&a, &b| {
                SortProcessor::compare_value_tuples(
                    &order_values[a],
                    &order_values[b],
                    &spec.order_by,
                )
            });
            Self::scan_partition(&indices, &order_values, spec, table, params, &mut output)?;
        }

        let mut out_rows = Vec::with_capacity(rows.len());
        for (row, value) in rows.iter().zip(output) {
            let mut row = row.clone();
            row.insert(spec.output.clone(), value);
            out_rows.push(row);
        }
        Ok(Table::from_validated(output_schema, out_rows))
    }

    /// One cursor pass over an ordered partition.
    fn scan_partition(
        indices: &[usize],
        order_values: &[Vec<FieldValue>],
        spec: &WindowSpec,
        table: &Table,
        params: &Params,
        output: &mut [FieldValue],
    ) -> EngineResult<()> {
        match &spec.function {
            WindowFunction::Rank => {
                let mut rank = 0i64;
                for (pos, &idx) in indices.iter().enumerate() {
                    let tied_with_previous = pos > 0
                        && SortProcessor::compare_value_tuples(
                            &order_values[indices[pos - 1]],
                            &order_values[idx],
                            &spec.order_by,
                        ) == std::cmp::Ordering::Equal;
                    if !tied_with_previous {
                        rank = pos as i64 + 1;
                    }
                    output[idx] = FieldValue::Integer(rank);
                }
            }
            WindowFunction::Lag { target, offset } => {
                for (pos, &idx) in indices.iter().enumerate() {
                    output[idx] = if pos >= *offset {
                        let source = indices[pos - offset];
                        ExpressionEvaluator::evaluate(target, &table.rows()[source], params)
                            .map_err(|e| e.with_row(source))?
                    } else {
                        FieldValue::Null
                    };
                }
            }
            WindowFunction::MovingAvg { target, preceding } => {
                // Sliding frame: running sum/count of the non-null values in
                // the trailing (preceding + 1) rows
                let frame = preceding + 1;
                let mut values: Vec<Option<f64>> = Vec::with_capacity(indices.len());
                let mut sum = 0.0f64;
                let mut count = 0usize;
                for (pos, &idx) in indices.iter().enumerate() {
                    let value =
                        ExpressionEvaluator::evaluate(target, &table.rows()[idx], params)
                            .map_err(|e| e.with_row(idx))?;
                    let numeric = value.as_f64();
                    if let Some(v) = numeric {
                        sum += v;
                        count += 1;
                    }
                    values.push(numeric);
                    if pos >= frame {
                        if let Some(Some(expired)) = values.get(pos - frame) {
                            sum -= expired;
                            count -= 1;
                        }
                    }
                    output[idx] = if count > 0 {
                        FieldValue::Float(sum / count as f64)
                    } else {
                        FieldValue::Null
                    };
                }
            }
        }
        Ok(())
    }
}
