//! # reltab
//!
//! An in-memory tabular analytics engine for reproducing the class of report
//! an analyst would write as ad hoc SQL: grouping, ranking, windowed
//! aggregation, time-bucketing and rule-based flags over already-loaded
//! tables.
//!
//! ## Features
//!
//! - **Immutable Tables**: every pipeline stage produces a new table, so
//!   intermediate results can be shared across reports and threads
//! - **Three-Valued Logic**: null is a first-class scalar variant, with SQL
//!   null propagation threaded explicitly through every operator
//! - **Grouping & Windows**: hash-partitioned aggregation plus RANK, LAG and
//!   trailing moving averages over ordered partitions
//! - **Declarative Reports**: a report is a versioned, serde-serializable
//!   list of stage descriptors interpreted by a fixed set of executors;
//!   business thresholds travel as pipeline parameters
//! - **Fail-Fast Validation**: all column, parameter and join key references
//!   are checked against schemas before any row is evaluated
//!
//! ## Quick Start
//!
//! ```rust
//! use reltab::{
//!     AggregateFunction, AggregateSpec, Expr, FieldType, FieldValue, NamedExpr, Params,
//!     PipelineSpec, ReportEngine, Row, Schema, Table,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::new(vec![
//!         ("dept".to_string(), FieldType::Text),
//!         ("salary".to_string(), FieldType::Integer),
//!     ])?;
//!     let rows: Vec<Row> = [("Eng", 30_000), ("Eng", 50_000), ("HR", 40_000)]
//!         .iter()
//!         .map(|(dept, salary)| {
//!             Row::from([
//!                 ("dept".to_string(), FieldValue::String(dept.to_string())),
//!                 ("salary".to_string(), FieldValue::Integer(*salary)),
//!             ])
//!         })
//!         .collect();
//!
//!     let mut engine = ReportEngine::new();
//!     engine.register_table("employees", Table::new(schema, rows)?);
//!
//!     // Average salary per department
//!     let report = PipelineSpec::new("employees").group_by(
//!         vec![NamedExpr::new("dept", Expr::column("dept"))],
//!         vec![AggregateSpec::new(
//!             "avg_salary",
//!             AggregateFunction::Avg { expr: Expr::column("salary") },
//!         )],
//!     );
//!     let result = engine.execute(&report, &Params::new())?;
//!     assert_eq!(result.row_count(), 2);
//!     Ok(())
//! }
//! ```

pub mod reltab;

// Re-export the main API at the crate root
pub use crate::reltab::{
    AggregateFunction, AggregateSpec, BinaryOperator, EngineError, EngineResult, Expr,
    ExpressionEvaluator, FieldType, FieldValue, JoinOn, JoinType, LiteralValue, NamedExpr,
    OrderDirection, Params, PipelineSpec, ReportEngine, Row, Schema, SortKey, Stage, Table,
    UnaryOperator, WindowFunction, WindowSpec, DESCRIPTOR_VERSION,
};
