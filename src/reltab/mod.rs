// Tabular analytics engine.
// Evaluates declarative report pipelines over immutable in-memory tables.

pub mod aggregate;
pub mod ast;
pub mod error;
pub mod expr;
pub mod join;
pub mod pipeline;
pub mod schema;
pub mod sort;
pub mod table;
pub mod types;
pub mod window;

// Re-export main API
pub use aggregate::{AggregateFunction, AggregateSpec};
pub use ast::{
    BinaryOperator, Expr, LiteralValue, NamedExpr, OrderDirection, SortKey, UnaryOperator,
};
pub use error::{EngineError, EngineResult};
pub use expr::{ExpressionEvaluator, Params};
pub use join::{JoinOn, JoinType};
pub use pipeline::{PipelineSpec, ReportEngine, Stage, DESCRIPTOR_VERSION};
pub use schema::{FieldType, Schema};
pub use table::{Row, Table};
pub use types::FieldValue;
pub use window::{WindowFunction, WindowSpec};

// Version and feature info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FEATURES: &[&str] = &[
    "grouping_aggregation", // COUNT, COUNT(*), SUM, AVG, MIN, MAX, STDDEV
    "window_functions",     // RANK, LAG, trailing moving average
    "equality_joins",       // inner, left, full outer with fan-out
    "date_functions",       // DATEDIFF, DATE_BUCKET
    "three_valued_logic",   // explicit NULL propagation everywhere
    "report_pipelines",     // versioned, serde-serializable stage descriptors
    "pipeline_parameters",  // business thresholds as parameters
];
