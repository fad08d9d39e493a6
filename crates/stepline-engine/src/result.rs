//! Step results and run-wide status.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named fields produced by a handler.
///
/// Every field is re-exported into the environment as `"<step>.<field>"`.
/// The `success` field decides the step outcome and defaults to `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOutput {
    fields: Map<String, Value>,
}

impl StepOutput {
    /// Create an output without any fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an output carrying `success: true`.
    pub fn success() -> Self {
        Self::new().with("success", true)
    }

    /// Create an output carrying `success: false`.
    pub fn failure() -> Self {
        Self::new().with("success", false)
    }

    /// Add or replace a field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set a field in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns false only when `success` is explicitly `false`.
    pub fn is_success(&self) -> bool {
        self.fields
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Returns true if the output has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the fields.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// The output as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Map<String, Value>> for StepOutput {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Outcome of a single step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// Guard or activation flag prevented execution.
    Skipped,
    /// Handler ran and reported success.
    Succeeded,
    /// Action unresolved, input invalid, handler error or `success: false`.
    Failed,
}

impl StepOutcome {
    /// Map a handler's success flag to an outcome.
    pub fn from_success(success: bool) -> Self {
        if success {
            StepOutcome::Succeeded
        } else {
            StepOutcome::Failed
        }
    }
}

/// Run-wide status used by `success()`, `failure()` and `always()` guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Success,
    Failure,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunStatus::Failure)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Mutable state of one workflow run.
///
/// The status starts at `Success` and only ever moves to `Failure`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    status: RunStatus,
    executed: usize,
    skipped: usize,
    failed: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a step outcome into the run.
    pub fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Succeeded => self.executed += 1,
            StepOutcome::Failed => {
                self.executed += 1;
                self.failed += 1;
                self.status = RunStatus::Failure;
            }
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Steps whose handler was reached or whose action failed to resolve.
    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}
