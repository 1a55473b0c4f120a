//! Immutable in-memory tables.
//!
//! A [`Table`] is an ordered sequence of rows sharing a [`Schema`]. Row
//! count and column set never change after construction; every pipeline
//! stage produces a new `Table`, so an intermediate result can safely be
//! shared (behind `Arc`) across multiple downstream reports and threads.

use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::schema::{FieldType, Schema};
use crate::reltab::types::FieldValue;
use std::collections::HashMap;

/// A single row: column name → scalar value.
pub type Row = HashMap<String, FieldValue>;

/// An immutable-after-load relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from a schema and rows, validating that every row
    /// conforms: exactly the schema's columns, each value either null or of
    /// the declared type.
    pub fn new(schema: Schema, rows: Vec<Row>) -> EngineResult<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(EngineError::table_error(
                    "<input>",
                    format!(
                        "Row {} has {} fields, schema declares {}",
                        idx,
                        row.len(),
                        schema.len()
                    ),
                ));
            }
            for (column, declared) in schema.columns() {
                let value = row.get(column).ok_or_else(|| {
                    EngineError::table_error(
                        "<input>",
                        format!("Row {} is missing column '{}'", idx, column),
                    )
                })?;
                if let Some(actual) = FieldType::of(value) {
                    if actual != *declared {
                        return Err(EngineError::table_error(
                            "<input>",
                            format!(
                                "Row {} column '{}': expected {}, got {}",
                                idx,
                                column,
                                declared.name(),
                                actual.name()
                            ),
                        ));
                    }
                }
            }
        }
        Ok(Self { schema, rows })
    }

    /// Build a table from rows already known to conform, e.g. rows produced
    /// by a pipeline stage whose output schema was computed alongside them.
    pub(crate) fn from_validated(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// The table's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The rows in table order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
