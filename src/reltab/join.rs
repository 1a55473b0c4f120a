//! Equality joins between two tables.
//!
//! Single-pass hash join supporting inner, left and full-outer joins on one
//! or more column pairs. SQL semantics: a row whose join key contains null
//! never matches; multiple right-side matches fan out into the full cross
//! product; unmatched sides are null-filled.
//!
//! Hash matching uses exact value equality, so each key pair must have the
//! same column type on both sides; an Integer-vs-Float pair could never
//! match and is rejected at validation instead of returning an empty result.
//!
//! Key pairs that share a column name on both sides merge into one output
//! column carrying the non-null side's value (USING-style), which is what a
//! full-outer month calendar join needs. Any other duplicated column name
//! across the two inputs is a schema error at build time: rename through a
//! Project stage first.

use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::schema::Schema;
use crate::reltab::table::{Row, Table};
use crate::reltab::types::{FieldValue, GroupKey};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Supported join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    FullOuter,
}

/// One equality key pair: `left` column on the left table equals `right`
/// column on the right table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOn {
    pub left: String,
    pub right: String,
}

impl JoinOn {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Join stage executor.
pub struct JoinProcessor;

impl JoinProcessor {
    /// Validate key columns and types and compute the output schema: all
    /// left columns, then the right columns that are not merged-away keys.
    pub fn validate(
        left: &Schema,
        right: &Schema,
        on: &[JoinOn],
    ) -> EngineResult<Schema> {
        if on.is_empty() {
            return Err(EngineError::schema_error(
                "Join requires at least one key pair",
                None,
            ));
        }
        for pair in on {
            let left_type = left.require(&pair.left)?;
            let right_type = right.require(&pair.right)?;
            if left_type != right_type {
                return Err(EngineError::join_key_error(
                    &pair.left,
                    &pair.right,
                    format!(
                        "Join keys must have the same type, got {} vs {}",
                        left_type.name(),
                        right_type.name()
                    ),
                ));
            }
        }

        let mut columns = left.columns().to_vec();
        for (name, field_type) in right.columns() {
            if Self::is_merged_key(name, on) {
                continue;
            }
            if left.contains(name) {
                return Err(EngineError::schema_error(
                    "Column exists on both sides of the join; rename it via a Project stage",
                    Some(name),
                ));
            }
            columns.push((name.clone(), *field_type));
        }
        Schema::new(columns)
    }

    /// Execute the join.
    pub fn process(
        left: &Table,
        right: &Table,
        join_type: JoinType,
        on: &[JoinOn],
    ) -> EngineResult<Table> {
        let output_schema = Self::validate(left.schema(), right.schema(), on)?;
        let right_copy_columns: Vec<String> = right
            .schema()
            .columns()
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| !Self::is_merged_key(name, on))
            .collect();

        // Build side: hash the right table's key tuples; null keys stay out
        // of the map so they can never match
        let mut build: FxHashMap<GroupKey, Vec<usize>> = FxHashMap::default();
        for (idx, row) in right.rows().iter().enumerate() {
            if let Some(key) = Self::key_of(row, on, |pair| &pair.right) {
                build.entry(key).or_default().push(idx);
            }
        }

        let mut matched_right = vec![false; right.row_count()];
        let mut out_rows: Vec<Row> = Vec::with_capacity(left.row_count());

        // Probe side: every left row, fanning out over all matches
        for left_row in left.rows() {
            let matches = Self::key_of(left_row, on, |pair| &pair.left)
                .and_then(|key| build.get(&key));
            match matches {
                Some(indices) => {
                    for &right_idx in indices {
                        matched_right[right_idx] = true;
                        let mut row = left_row.clone();
                        let right_row = &right.rows()[right_idx];
                        for column in &right_copy_columns {
                            row.insert(
                                column.clone(),
                                right_row.get(column).cloned().unwrap_or(FieldValue::Null),
                            );
                        }
                        out_rows.push(row);
                    }
                }
                None => {
                    if matches!(join_type, JoinType::Left | JoinType::FullOuter) {
                        let mut row = left_row.clone();
                        for column in &right_copy_columns {
                            row.insert(column.clone(), FieldValue::Null);
                        }
                        out_rows.push(row);
                    }
                }
            }
        }

        // Full outer: append right rows nobody matched, left side null-filled
        // and merged key columns taking the right row's key values
        if join_type == JoinType::FullOuter {
            for (idx, right_row) in right.rows().iter().enumerate() {
                if matched_right[idx] {
                    continue;
                }
                let mut row = Row::with_capacity(output_schema.len());
                for (name, _) in left.schema().columns() {
                    row.insert(name.clone(), FieldValue::Null);
                }
                for pair in on {
                    if pair.left == pair.right {
                        row.insert(
                            pair.left.clone(),
                            right_row.get(&pair.right).cloned().unwrap_or(FieldValue::Null),
                        );
                    }
                }
                for column in &right_copy_columns {
                    row.insert(
                        column.clone(),
                        right_row.get(column).cloned().unwrap_or(FieldValue::Null),
                    );
                }
                out_rows.push(row);
            }
        }

        Ok(Table::from_validated(output_schema, out_rows))
    }

    /// Whether a right-side column is a join key merged into its same-named
    /// left column.
    fn is_merged_key(right_column: &str, on: &[JoinOn]) -> bool {
        on.iter()
            .any(|pair| pair.right == right_column && pair.left == pair.right)
    }

    /// Key tuple for a row, or `None` when any component is null.
    fn key_of<'a>(
        row: &Row,
        on: &'a [JoinOn],
        side: impl Fn(&'a JoinOn) -> &'a String,
    ) -> Option<GroupKey> {
        let mut values = Vec::with_capacity(on.len());
        for pair in on {
            match row.get(side(pair)) {
                Some(value) if !value.is_null() => values.push(value.clone()),
                _ => return None,
            }
        }
        Some(GroupKey::new(values))
    }
}
