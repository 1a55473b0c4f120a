//! Grouping and aggregation.
//!
//! Partitions rows by an evaluated grouping tuple and computes aggregates
//! per partition. SQL semantics throughout: nulls group together as one
//! partition; aggregates skip null inputs except `count(*)`; output keeps
//! the first-occurrence order of each partition key unless an explicit Sort
//! stage follows.

pub mod accumulator;

pub use accumulator::{GroupAccumulator, SumState, WelfordState};

use crate::reltab::ast::{Expr, NamedExpr};
use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::expr::{ExpressionEvaluator, ExpressionValidator, Params};
use crate::reltab::schema::{FieldType, Schema};
use crate::reltab::table::{Row, Table};
use crate::reltab::types::{FieldValue, GroupKey};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An aggregate function applied over one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum AggregateFunction {
    /// `count(*)`: all rows, null inputs included
    CountStar,
    /// `count(expr)`: non-null inputs only
    Count { expr: Expr },
    /// Sum of non-null inputs; null when there are none
    Sum { expr: Expr },
    /// Mean of non-null inputs; null when there are none
    Avg { expr: Expr },
    /// Minimum non-null input
    Min { expr: Expr },
    /// Maximum non-null input
    Max { expr: Expr },
    /// Sample standard deviation; null with fewer than 2 non-null inputs
    Stddev { expr: Expr },
}

impl AggregateFunction {
    /// The input expression, when the function takes one.
    fn input(&self) -> Option<&Expr> {
        match self {
            AggregateFunction::CountStar => None,
            AggregateFunction::Count { expr }
            | AggregateFunction::Sum { expr }
            | AggregateFunction::Avg { expr }
            | AggregateFunction::Min { expr }
            | AggregateFunction::Max { expr }
            | AggregateFunction::Stddev { expr } => Some(expr),
        }
    }
}

/// One named aggregate output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Output column name
    pub name: String,
    /// Aggregate to compute
    pub function: AggregateFunction,
}

impl AggregateSpec {
    pub fn new(name: impl Into<String>, function: AggregateFunction) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

/// GROUP BY stage executor.
pub struct GroupByProcessor;

impl GroupByProcessor {
    /// Validate grouping keys and aggregates against the input schema and
    /// compute the output schema: key columns first, aggregates after.
    pub fn validate(
        keys: &[NamedExpr],
        aggregates: &[AggregateSpec],
        schema: &Schema,
        params: &Params,
    ) -> EngineResult<Schema> {
        if keys.is_empty() && aggregates.is_empty() {
            return Err(EngineError::schema_error(
                "GROUP BY stage needs at least one key or aggregate",
                None,
            ));
        }
        let mut columns = Vec::with_capacity(keys.len() + aggregates.len());
        for key in keys {
            let key_type = ExpressionValidator::infer_concrete(
                &key.expr,
                schema,
                params,
                &format!("grouping key '{}'", key.name),
            )?;
            columns.push((key.name.clone(), key_type));
        }
        for spec in aggregates {
            let out_type = match &spec.function {
                AggregateFunction::CountStar | AggregateFunction::Count { .. } => {
                    FieldType::Integer
                }
                AggregateFunction::Avg { .. } | AggregateFunction::Stddev { .. } => {
                    FieldType::Float
                }
                AggregateFunction::Sum { expr }
                | AggregateFunction::Min { expr }
                | AggregateFunction::Max { expr } => ExpressionValidator::infer_concrete(
                    expr,
                    schema,
                    params,
                    &format!("aggregate '{}'", spec.name),
                )?,
            };
            if let Some(expr) = spec.function.input() {
                let input_type = ExpressionValidator::infer(expr, schema, params)?;
                match (&spec.function, input_type) {
                    (
                        AggregateFunction::Sum { .. }
                        | AggregateFunction::Avg { .. }
                        | AggregateFunction::Stddev { .. },
                        Some(ty),
                    ) if !ty.is_numeric() => {
                        return Err(EngineError::schema_error(
                            format!(
                                "Aggregate '{}' requires a numeric input, got {}",
                                spec.name,
                                ty.name()
                            ),
                            None,
                        ));
                    }
                    _ => {}
                }
            }
            columns.push((spec.name.clone(), out_type));
        }
        Schema::new(columns)
    }

    /// Partition the table and compute the aggregates: one output row per
    /// partition, in first-occurrence order of the grouping key.
    pub fn process(
        table: &Table,
        keys: &[NamedExpr],
        aggregates: &[AggregateSpec],
        params: &Params,
    ) -> EngineResult<Table> {
        let output_schema = Self::validate(keys, aggregates, table.schema(), params)?;

        let mut order: Vec<GroupKey> = Vec::new();
        let mut groups: FxHashMap<GroupKey, GroupAccumulator> = FxHashMap::default();

        for (idx, row) in table.rows().iter().enumerate() {
            let mut key_values = Vec::with_capacity(keys.len());
            for key in keys {
                key_values.push(
                    ExpressionEvaluator::evaluate(&key.expr, row, params)
                        .map_err(|e| e.with_row(idx))?,
                );
            }
            let key = GroupKey::new(key_values);
            let accumulator = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                GroupAccumulator::new()
            });
            accumulator.increment_count();

            for spec in aggregates {
                Self::accumulate(accumulator, spec, row, params).map_err(|e| e.with_row(idx))?;
            }
        }

        let mut rows = Vec::with_capacity(order.len());
        for key in &order {
            let accumulator = &groups[key];
            let mut row = Row::with_capacity(keys.len() + aggregates.len());
            for (named, value) in keys.iter().zip(key.values()) {
                row.insert(named.name.clone(), value.clone());
            }
            for spec in aggregates {
                row.insert(spec.name.clone(), Self::finalize(accumulator, spec));
            }
            rows.push(row);
        }

        Ok(Table::from_validated(output_schema, rows))
    }

    /// Fold one row into the partition's accumulator.
    fn accumulate(
        accumulator: &mut GroupAccumulator,
        spec: &AggregateSpec,
        row: &Row,
        params: &Params,
    ) -> EngineResult<()> {
        let value = match spec.function.input() {
            // count(*) rides on the per-partition row count
            None => return Ok(()),
            Some(expr) => ExpressionEvaluator::evaluate(expr, row, params)?,
        };
        if value.is_null() {
            return Ok(());
        }
        match &spec.function {
            AggregateFunction::Count { .. } => accumulator.add_non_null(&spec.name),
            AggregateFunction::Sum { .. } => accumulator.add_sum(&spec.name, &value)?,
            AggregateFunction::Avg { .. } | AggregateFunction::Stddev { .. } => {
                match value.as_f64() {
                    Some(f) => accumulator.update_welford(&spec.name, f),
                    None => {
                        return Err(EngineError::arithmetic_error(format!(
                            "Aggregate '{}' saw non-numeric value {}",
                            spec.name, value
                        )));
                    }
                }
            }
            AggregateFunction::Min { .. } => accumulator.update_min(&spec.name, value),
            AggregateFunction::Max { .. } => accumulator.update_max(&spec.name, value),
            AggregateFunction::CountStar => {}
        }
        Ok(())
    }

    /// Read one aggregate's final value out of the accumulator.
    fn finalize(accumulator: &GroupAccumulator, spec: &AggregateSpec) -> FieldValue {
        match &spec.function {
            AggregateFunction::CountStar => FieldValue::Integer(accumulator.count as i64),
            AggregateFunction::Count { .. } => FieldValue::Integer(
                accumulator
                    .non_null_counts
                    .get(&spec.name)
                    .copied()
                    .unwrap_or(0),
            ),
            AggregateFunction::Sum { .. } => accumulator.sum_value(&spec.name),
            AggregateFunction::Avg { .. } => accumulator.avg_value(&spec.name),
            AggregateFunction::Stddev { .. } => accumulator.stddev_value(&spec.name),
            AggregateFunction::Min { .. } => accumulator
                .mins
                .get(&spec.name)
                .cloned()
                .unwrap_or(FieldValue::Null),
            AggregateFunction::Max { .. } => accumulator
                .maxs
                .get(&spec.name)
                .cloned()
                .unwrap_or(FieldValue::Null),
        }
    }
}
