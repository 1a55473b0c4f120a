//! ORDER BY sorting.
//!
//! Stable sort over ordering keys of (column, direction) pairs. Nulls sort
//! last regardless of direction, which is why null handling happens before
//! the direction reversal is applied.

use crate::reltab::ast::{OrderDirection, SortKey};
use crate::reltab::error::EngineResult;
use crate::reltab::schema::Schema;
use crate::reltab::table::{Row, Table};
use crate::reltab::types::{compare_values, FieldValue};
use std::cmp::Ordering;

/// Sort stage executor.
pub struct SortProcessor;

impl SortProcessor {
    /// Validate that every ordering column exists in the schema.
    pub fn validate(keys: &[SortKey], schema: &Schema) -> EngineResult<()> {
        for key in keys {
            schema.require(&key.column)?;
        }
        Ok(())
    }

    /// Produce a sorted copy of the table. Stable, so rows that compare
    /// equal keep their input order.
    pub fn process(table: &Table, keys: &[SortKey]) -> EngineResult<Table> {
        Self::validate(keys, table.schema())?;
        let mut rows = table.rows().to_vec();
        rows.sort_by(|a, b| Self::compare_rows(a, b, keys));
        Ok(Table::from_validated(table.schema().clone(), rows))
    }

    /// Compare two rows over the ordering key.
    pub fn compare_rows(left: &Row, right: &Row, keys: &[SortKey]) -> Ordering {
        for key in keys {
            let lhs = left.get(&key.column).unwrap_or(&FieldValue::Null);
            let rhs = right.get(&key.column).unwrap_or(&FieldValue::Null);
            let ordering = Self::compare_nulls_last(lhs, rhs, key.direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Compare two already-evaluated key tuples aligned with `keys`. Used by
    /// the window operator, which evaluates its ordering expressions once
    /// per row up front.
    pub(crate) fn compare_value_tuples(
        left: &[FieldValue],
        right: &[FieldValue],
        keys: &[SortKey],
    ) -> Ordering {
        for ((lhs, rhs), key) in left.iter().zip(right).zip(keys) {
            let ordering = Self::compare_nulls_last(lhs, rhs, key.direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Nulls compare last whatever the direction; non-null values compare
    /// by value with the direction applied.
    fn compare_nulls_last(
        lhs: &FieldValue,
        rhs: &FieldValue,
        direction: OrderDirection,
    ) -> Ordering {
        match (lhs.is_null(), rhs.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ordering = compare_values(lhs, rhs).unwrap_or(Ordering::Equal);
                match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            }
        }
    }
}
