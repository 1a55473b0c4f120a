/*!
# Engine Error Handling

Error types for the tabular analytics engine. All engine operations return
well-structured errors with enough context to point at the offending column,
row, or join key.

## Error Categories

- **Schema Errors**: unknown columns, type mismatches, duplicate column names
  and malformed pipeline descriptors, raised during pipeline validation before
  any row is processed
- **Arithmetic Errors**: division by zero and invalid date arithmetic, raised
  during row evaluation and carrying the offending row index when known
- **Join Key Errors**: join key type mismatches between the two input tables,
  raised at join-stage validation
- **Table Errors**: unknown source table names and row/schema conformance
  failures at table construction

No error is silently swallowed: any evaluation error aborts the entire
pipeline run rather than producing partial output.
*/

use std::fmt;

/// Errors produced by table construction, pipeline validation and execution.
///
/// Each variant includes context specific to the error category, enabling
/// detailed error reporting without string parsing on the caller side.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Schema validation failure: unknown column, type mismatch, duplicate
    /// column name, unknown function/parameter, or a bad descriptor version.
    ///
    /// Always raised at pipeline-build/validation time, before any row is
    /// processed.
    SchemaError {
        /// Description of the schema validation failure
        message: String,
        /// Name of the column that caused the error, if applicable
        column: Option<String>,
    },

    /// Runtime arithmetic failure: division by zero or invalid date
    /// arithmetic.
    ///
    /// Raised during row evaluation; `row` identifies the offending input
    /// row by index when one is in scope.
    ArithmeticError {
        /// Description of the arithmetic failure
        message: String,
        /// Zero-based index of the row being evaluated, when known
        row: Option<usize>,
    },

    /// Join key type mismatch between the left and right input tables.
    ///
    /// Raised at join-stage validation, before the join executes.
    JoinKeyError {
        /// Join key column on the left table
        left_column: String,
        /// Join key column on the right table
        right_column: String,
        /// Description of the mismatch
        message: String,
    },

    /// Table registry and construction failures: unknown source table name,
    /// or a row that does not conform to the declared schema.
    TableError {
        /// Name of the table involved
        table: String,
        /// Description of the failure
        message: String,
    },
}

/// Result type used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create a schema error with an optional offending column name.
    pub fn schema_error(message: impl Into<String>, column: Option<&str>) -> Self {
        EngineError::SchemaError {
            message: message.into(),
            column: column.map(|c| c.to_string()),
        }
    }

    /// Create an arithmetic error; the row index is attached later via
    /// [`EngineError::with_row`] by whichever stage knows it.
    pub fn arithmetic_error(message: impl Into<String>) -> Self {
        EngineError::ArithmeticError {
            message: message.into(),
            row: None,
        }
    }

    /// Create a join key error for a mismatched key column pair.
    pub fn join_key_error(
        left_column: impl Into<String>,
        right_column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EngineError::JoinKeyError {
            left_column: left_column.into(),
            right_column: right_column.into(),
            message: message.into(),
        }
    }

    /// Create a table error for the named table.
    pub fn table_error(table: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::TableError {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Attach the offending row index to an arithmetic error, if it does not
    /// already carry one. Other variants pass through unchanged.
    pub fn with_row(self, row_index: usize) -> Self {
        match self {
            EngineError::ArithmeticError { message, row: None } => {
                EngineError::ArithmeticError {
                    message,
                    row: Some(row_index),
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SchemaError { message, column } => match column {
                Some(col) => write!(f, "Schema error for column '{}': {}", col, message),
                None => write!(f, "Schema error: {}", message),
            },
            EngineError::ArithmeticError { message, row } => match row {
                Some(idx) => write!(f, "Arithmetic error at row {}: {}", idx, message),
                None => write!(f, "Arithmetic error: {}", message),
            },
            EngineError::JoinKeyError {
                left_column,
                right_column,
                message,
            } => write!(
                f,
                "Join key error on '{}' = '{}': {}",
                left_column, right_column, message
            ),
            EngineError::TableError { table, message } => {
                write!(f, "Table error for '{}': {}", table, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}
