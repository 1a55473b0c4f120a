//! Expression evaluation: per-row scalar evaluation, scalar functions, and
//! build-time validation against a schema.

pub mod evaluator;
pub mod functions;
pub mod validate;

pub use evaluator::{ExpressionEvaluator, Params};
pub use functions::BuiltinFunctions;
pub use validate::ExpressionValidator;
