//! Expression module.
//!
//! Evaluates `{{ expr }}` spans with a sandboxed minijinja expression
//! environment. Expressions can read variables but cannot run host code.

mod engine;

pub use engine::{is_template, single_expression, ExpressionEngine};
