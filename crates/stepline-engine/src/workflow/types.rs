//! Workflow document types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A parsed workflow document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Initial variables, overridable by the caller.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub env: Map<String, Value>,

    /// Steps executed in document order.
    pub steps: Vec<Step>,
}

/// One declared unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within its nesting level.
    pub name: String,

    /// Registry key of the handler to run.
    pub action: String,

    /// Handler inputs, possibly templated.
    #[serde(default, rename = "with", skip_serializing_if = "Map::is_empty")]
    pub with: Map<String, Value>,

    /// Guard: expression or one of `always()`, `success()`, `failure()`.
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,

    /// Activation flag, evaluated independently of the guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<Value>,

    /// Expression yielding a list; each element runs the step once.
    #[serde(default, rename = "forEach", skip_serializing_if = "Option::is_none")]
    pub for_each: Option<Value>,

    /// Sub-steps, used by control actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    /// `env key -> result field` exports into the parent scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<BTreeMap<String, String>>,
}

impl Step {
    /// Create a step with no inputs or guards.
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    /// Set an input.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    /// Copy of this step with another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy of this step for the 0-based iteration `index`: `"<name>#<index+1>"`.
    ///
    /// The copy carries no `forEach` so it runs exactly once.
    pub fn iteration(&self, index: usize) -> Self {
        Self {
            name: iteration_name(&self.name, index),
            for_each: None,
            ..self.clone()
        }
    }

    /// Copy of this step with its inputs replaced.
    pub fn with_inputs(&self, inputs: Map<String, Value>) -> Self {
        Self {
            with: inputs,
            ..self.clone()
        }
    }
}

/// Name of the 0-based iteration `index` of `name`.
pub fn iteration_name(name: &str, index: usize) -> String {
    format!("{}#{}", name, index + 1)
}
