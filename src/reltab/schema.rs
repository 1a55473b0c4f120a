//! Column types and table schemas.
//!
//! A [`Schema`] is an ordered list of named, typed columns, fixed at table
//! creation. Pipeline validation threads schemas between stages so that
//! every column reference is checked before any row is evaluated.

use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::types::FieldValue;

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    Date,
    Timestamp,
}

impl FieldType {
    /// Type of a concrete value; `None` for null, which conforms to any
    /// column type.
    pub fn of(value: &FieldValue) -> Option<FieldType> {
        match value {
            FieldValue::Integer(_) => Some(FieldType::Integer),
            FieldValue::Float(_) => Some(FieldType::Float),
            FieldValue::Decimal(_) => Some(FieldType::Decimal),
            FieldValue::String(_) => Some(FieldType::Text),
            FieldValue::Boolean(_) => Some(FieldType::Boolean),
            FieldValue::Date(_) => Some(FieldType::Date),
            FieldValue::Timestamp(_) => Some(FieldType::Timestamp),
            FieldValue::Null => None,
        }
    }

    /// Integer, Float and Decimal columns are mutually comparable and
    /// support arithmetic.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float | FieldType::Decimal)
    }

    /// Date and Timestamp columns are mutually comparable.
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Timestamp)
    }

    /// Whether values of two types can be compared. Join keys are stricter:
    /// they hash by exact value and require identical types.
    pub fn comparable_with(&self, other: &FieldType) -> bool {
        self == other
            || (self.is_numeric() && other.is_numeric())
            || (self.is_temporal() && other.is_temporal())
    }

    /// Human-readable name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::Decimal => "Decimal",
            FieldType::Text => "Text",
            FieldType::Boolean => "Boolean",
            FieldType::Date => "Date",
            FieldType::Timestamp => "Timestamp",
        }
    }
}

/// Ordered mapping from column name to column type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<(String, FieldType)>,
}

impl Schema {
    /// Create a schema, rejecting duplicate column names.
    pub fn new(columns: Vec<(String, FieldType)>) -> EngineResult<Self> {
        for (i, (name, _)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(EngineError::schema_error(
                    "Duplicate column name in schema",
                    Some(name),
                ));
            }
        }
        Ok(Self { columns })
    }

    /// The columns in declaration order.
    pub fn columns(&self) -> &[(String, FieldType)] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(col, _)| col == name)
    }

    /// Type of a column, if present.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, ty)| *ty)
    }

    /// Type of a column, or a schema error naming it.
    pub fn require(&self, name: &str) -> EngineResult<FieldType> {
        self.field_type(name).ok_or_else(|| {
            EngineError::schema_error("Unknown column", Some(name))
        })
    }

    /// Extend the schema with one more column, rejecting collisions. Used by
    /// window stages, which append their output column to the input schema.
    pub fn with_column(&self, name: &str, field_type: FieldType) -> EngineResult<Schema> {
        if self.contains(name) {
            return Err(EngineError::schema_error(
                "Output column collides with an existing column",
                Some(name),
            ));
        }
        let mut columns = self.columns.clone();
        columns.push((name.to_string(), field_type));
        Ok(Schema { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_column_rejected() {
        let err = Schema::new(vec![
            ("id".to_string(), FieldType::Integer),
            ("id".to_string(), FieldType::Text),
        ])
        .unwrap_err();
        assert!(matches!(err, EngineError::SchemaError { .. }));
    }

    #[test]
    fn test_comparability_classes() {
        assert!(FieldType::Integer.comparable_with(&FieldType::Decimal));
        assert!(FieldType::Date.comparable_with(&FieldType::Timestamp));
        assert!(!FieldType::Text.comparable_with(&FieldType::Integer));
    }
}
