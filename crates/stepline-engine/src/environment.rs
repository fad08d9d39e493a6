//! Workflow environment: the variable store every step reads and writes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::EngineResult;
use crate::expression::ExpressionEngine;
use crate::result::StepOutput;

/// Variable key holding the current element inside an iteration scope.
pub const ITEM_KEY: &str = "item";

/// Mutable key/value state of one workflow run (or one iteration scope).
///
/// Scoped children are full copies of their parent. Nothing written to a
/// child reaches the parent unless the executor exports it explicitly.
#[derive(Clone)]
pub struct Environment {
    variables: HashMap<String, Value>,
    expressions: Arc<ExpressionEngine>,
}

impl Environment {
    /// Create an environment with a fresh expression engine.
    pub fn new(variables: HashMap<String, Value>) -> Self {
        Self::with_engine(variables, Arc::new(ExpressionEngine::new()))
    }

    /// Create an environment sharing an existing expression engine.
    pub fn with_engine(variables: HashMap<String, Value>, expressions: Arc<ExpressionEngine>) -> Self {
        Self {
            variables,
            expressions,
        }
    }

    /// Build the initial environment of a run.
    ///
    /// Caller overrides win over the document's own `env` block.
    pub fn merged(
        document_env: &serde_json::Map<String, Value>,
        overrides: &HashMap<String, Value>,
        expressions: Arc<ExpressionEngine>,
    ) -> Self {
        let mut variables: HashMap<String, Value> = document_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in overrides {
            variables.insert(k.clone(), v.clone());
        }
        Self::with_engine(variables, expressions)
    }

    /// Substitute `{{ expr }}` spans with their textual values.
    ///
    /// Non-string values and strings without spans are returned unchanged.
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.expressions.render(s, &self.variables)),
            _ => value.clone(),
        }
    }

    /// Resolve a value, keeping the native type of single-span strings.
    pub fn resolve_typed(&self, value: &Value) -> Value {
        self.expressions.render_value(value, &self.variables)
    }

    /// Evaluate a bare expression against the current variables.
    pub fn evaluate(&self, expr: &str) -> EngineResult<Value> {
        self.expressions.evaluate(expr, &self.variables)
    }

    /// The expression engine shared by this environment and its scopes.
    pub fn expressions(&self) -> &ExpressionEngine {
        &self.expressions
    }

    /// Set a variable value, overwriting any previous one.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Get a variable value.
    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// All variables.
    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// Write every output field as `"<step>.<field>"`.
    pub fn record_step_output(&mut self, step_name: &str, output: &StepOutput) {
        for (field, value) in output.fields() {
            self.variables
                .insert(format!("{}.{}", step_name, field), value.clone());
        }
    }

    /// Shallow copy of the variable mapping.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.variables.clone()
    }

    /// Create an iteration scope: a snapshot of this environment plus `item`.
    pub fn scoped(&self, item: Value) -> Environment {
        let mut variables = self.snapshot();
        variables.insert(ITEM_KEY.to_string(), item);
        Self::with_engine(variables, Arc::clone(&self.expressions))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("variables", &self.variables)
            .finish()
    }
}
