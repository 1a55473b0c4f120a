//! Report pipelines: declarative stage descriptors and their executor.
//!
//! A report is data, not code: an ordered list of stage descriptors
//! (filter → join → group-or-window → project → sort → limit) interpreted
//! by a fixed set of stage executors. The descriptor format is the engine's
//! one stable wire contract — it serializes with serde, carries a version
//! number, and any unknown version is rejected at validation.
//!
//! Execution is two-pass:
//! 1. **Validation** walks the stage list threading schemas, so every
//!    column, parameter and join key reference fails fast
//!    ([`EngineError::SchemaError`] / [`EngineError::JoinKeyError`]) before
//!    a single row is touched.
//! 2. **Execution** delegates each stage to its processor; each stage
//!    consumes and produces an immutable [`Table`].

use crate::reltab::aggregate::{AggregateSpec, GroupByProcessor};
use crate::reltab::ast::{Expr, NamedExpr, SortKey};
use crate::reltab::error::{EngineError, EngineResult};
use crate::reltab::expr::{ExpressionEvaluator, ExpressionValidator, Params};
use crate::reltab::join::{JoinOn, JoinProcessor, JoinType};
use crate::reltab::schema::Schema;
use crate::reltab::sort::SortProcessor;
use crate::reltab::table::{Row, Table};
use crate::reltab::window::{WindowProcessor, WindowSpec};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Current pipeline descriptor version. Bump on any incompatible change to
/// the stage descriptor format.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// One pipeline stage descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Keep rows whose predicate is strictly true
    Filter { predicate: Expr },
    /// Equality-join against another registered table
    Join {
        table: String,
        join_type: JoinType,
        on: Vec<JoinOn>,
    },
    /// Partition by key expressions and aggregate per partition
    GroupBy {
        keys: Vec<NamedExpr>,
        aggregates: Vec<AggregateSpec>,
    },
    /// Append a window function column without collapsing rows
    Window { window: WindowSpec },
    /// Project to a new set of named, derived columns
    Project { columns: Vec<NamedExpr> },
    /// Sort by (column, direction) pairs; nulls last
    Sort { keys: Vec<SortKey> },
    /// Keep the first n rows
    Limit { rows: usize },
}

impl Stage {
    /// Stage kind for logging.
    fn kind(&self) -> &'static str {
        match self {
            Stage::Filter { .. } => "filter",
            Stage::Join { .. } => "join",
            Stage::GroupBy { .. } => "group_by",
            Stage::Window { .. } => "window",
            Stage::Project { .. } => "project",
            Stage::Sort { .. } => "sort",
            Stage::Limit { .. } => "limit",
        }
    }
}

/// A complete report definition: source table plus ordered stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Descriptor format version; must equal [`DESCRIPTOR_VERSION`]
    pub version: u32,
    /// Name of the registered source table
    pub source: String,
    /// Stages applied in order
    pub stages: Vec<Stage>,
}

impl PipelineSpec {
    /// Start a pipeline over a registered source table.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            source: source.into(),
            stages: Vec::new(),
        }
    }

    /// Append a filter stage.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.stages.push(Stage::Filter { predicate });
        self
    }

    /// Append a join stage.
    pub fn join(mut self, table: impl Into<String>, join_type: JoinType, on: Vec<JoinOn>) -> Self {
        self.stages.push(Stage::Join {
            table: table.into(),
            join_type,
            on,
        });
        self
    }

    /// Append a group-by stage.
    pub fn group_by(mut self, keys: Vec<NamedExpr>, aggregates: Vec<AggregateSpec>) -> Self {
        self.stages.push(Stage::GroupBy { keys, aggregates });
        self
    }

    /// Append a window stage.
    pub fn window(mut self, window: WindowSpec) -> Self {
        self.stages.push(Stage::Window { window });
        self
    }

    /// Append a projection stage.
    pub fn project(mut self, columns: Vec<NamedExpr>) -> Self {
        self.stages.push(Stage::Project { columns });
        self
    }

    /// Append a sort stage.
    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.stages.push(Stage::Sort { keys });
        self
    }

    /// Append a row-limit stage.
    pub fn limit(mut self, rows: usize) -> Self {
        self.stages.push(Stage::Limit { rows });
        self
    }

    /// Parse a descriptor from its JSON wire form.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            EngineError::schema_error(format!("Invalid pipeline descriptor: {}", e), None)
        })
    }

    /// Serialize the descriptor to its JSON wire form.
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            EngineError::schema_error(format!("Cannot serialize pipeline descriptor: {}", e), None)
        })
    }
}

/// The engine: a registry of named, immutable source tables plus the
/// pipeline executor.
///
/// Tables live behind `Arc`, so independent threads may run independent
/// pipelines over shared sources without coordination; no stage ever
/// mutates a table in place.
#[derive(Debug, Default)]
pub struct ReportEngine {
    tables: HashMap<String, Arc<Table>>,
}

impl ReportEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source table under a name, replacing any previous table
    /// with that name. Returns the shared handle.
    pub fn register_table(&mut self, name: impl Into<String>, table: Table) -> Arc<Table> {
        let name = name.into();
        let table = Arc::new(table);
        debug!(
            "registered table '{}' ({} rows, {} columns)",
            name,
            table.row_count(),
            table.schema().len()
        );
        self.tables.insert(name, table.clone());
        table
    }

    /// Shared handle to a registered table.
    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    /// Validate a pipeline without executing it, returning the output
    /// schema. All column, parameter, function and join key references are
    /// checked here, before any row is processed.
    pub fn validate(&self, spec: &PipelineSpec, params: &Params) -> EngineResult<Schema> {
        if spec.version != DESCRIPTOR_VERSION {
            return Err(EngineError::schema_error(
                format!(
                    "Unsupported pipeline descriptor version {} (engine supports {})",
                    spec.version, DESCRIPTOR_VERSION
                ),
                None,
            ));
        }
        let source = self.require_table(&spec.source)?;
        let mut schema = source.schema().clone();
        for stage in &spec.stages {
            schema = self.validate_stage(stage, &schema, params)?;
        }
        Ok(schema)
    }

    /// Validate, then run the pipeline to completion and return its result
    /// table. Any evaluation error aborts the whole run.
    pub fn execute(&self, spec: &PipelineSpec, params: &Params) -> EngineResult<Table> {
        self.validate(spec, params)?;
        let source = self.require_table(&spec.source)?;
        debug!(
            "executing pipeline over '{}': {} stages",
            spec.source,
            spec.stages.len()
        );

        let mut current: Table = source.as_ref().clone();
        for stage in &spec.stages {
            let in_rows = current.row_count();
            current = self.execute_stage(stage, current, params)?;
            debug!(
                "stage {}: {} rows in, {} rows out",
                stage.kind(),
                in_rows,
                current.row_count()
            );
        }
        Ok(current)
    }

    fn require_table(&self, name: &str) -> EngineResult<Arc<Table>> {
        self.table(name)
            .ok_or_else(|| EngineError::table_error(name, "Table is not registered"))
    }

    fn validate_stage(
        &self,
        stage: &Stage,
        schema: &Schema,
        params: &Params,
    ) -> EngineResult<Schema> {
        match stage {
            Stage::Filter { predicate } => {
                ExpressionValidator::expect_boolean(predicate, schema, params, "Filter predicate")?;
                Ok(schema.clone())
            }
            Stage::Join {
                table,
                join_type: _,
                on,
            } => {
                let right = self.require_table(table)?;
                JoinProcessor::validate(schema, right.schema(), on)
            }
            Stage::GroupBy { keys, aggregates } => {
                GroupByProcessor::validate(keys, aggregates, schema, params)
            }
            Stage::Window { window } => WindowProcessor::validate(window, schema, params),
            Stage::Project { columns } => Self::validate_projection(columns, schema, params),
            Stage::Sort { keys } => {
                SortProcessor::validate(keys, schema)?;
                Ok(schema.clone())
            }
            Stage::Limit { .. } => Ok(schema.clone()),
        }
    }

    fn execute_stage(&self, stage: &Stage, input: Table, params: &Params) -> EngineResult<Table> {
        match stage {
            Stage::Filter { predicate } => {
                let mut rows = Vec::new();
                for (idx, row) in input.rows().iter().enumerate() {
                    if ExpressionEvaluator::evaluate_predicate(predicate, row, params)
                        .map_err(|e| e.with_row(idx))?
                    {
                        rows.push(row.clone());
                    }
                }
                Ok(Table::from_validated(input.schema().clone(), rows))
            }
            Stage::Join {
                table,
                join_type,
                on,
            } => {
                let right = self.require_table(table)?;
                JoinProcessor::process(&input, &right, *join_type, on)
            }
            Stage::GroupBy { keys, aggregates } => {
                GroupByProcessor::process(&input, keys, aggregates, params)
            }
            Stage::Window { window } => WindowProcessor::process(&input, window, params),
            Stage::Project { columns } => {
                let schema = Self::validate_projection(columns, input.schema(), params)?;
                let mut rows = Vec::with_capacity(input.row_count());
                for (idx, row) in input.rows().iter().enumerate() {
                    let mut out = Row::with_capacity(columns.len());
                    for column in columns {
                        let value = ExpressionEvaluator::evaluate(&column.expr, row, params)
                            .map_err(|e| e.with_row(idx))?;
                        out.insert(column.name.clone(), value);
                    }
                    rows.push(out);
                }
                Ok(Table::from_validated(schema, rows))
            }
            Stage::Sort { keys } => SortProcessor::process(&input, keys),
            Stage::Limit { rows } => {
                let kept = input.rows().iter().take(*rows).cloned().collect();
                Ok(Table::from_validated(input.schema().clone(), kept))
            }
        }
    }

    fn validate_projection(
        columns: &[NamedExpr],
        schema: &Schema,
        params: &Params,
    ) -> EngineResult<Schema> {
        if columns.is_empty() {
            return Err(EngineError::schema_error(
                "Project stage needs at least one column",
                None,
            ));
        }
        let mut out = Vec::with_capacity(columns.len());
        for column in columns {
            let field_type = ExpressionValidator::infer_concrete(
                &column.expr,
                schema,
                params,
                &format!("projected column '{}'", column.name),
            )?;
            out.push((column.name.clone(), field_type));
        }
        Schema::new(out)
    }
}
