//! Per-step decisions: guard, activation and input resolution.

use serde_json::{Map, Value};

use crate::environment::Environment;
use crate::result::RunStatus;
use crate::workflow::types::Step;

/// Guard tokens evaluated against the run-wide status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedGuard {
    Always,
    Success,
    Failure,
}

impl ReservedGuard {
    /// Recognize a reserved token, ignoring surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "always()" => Some(ReservedGuard::Always),
            "success()" => Some(ReservedGuard::Success),
            "failure()" => Some(ReservedGuard::Failure),
            _ => None,
        }
    }

    pub fn passes(self, status: RunStatus) -> bool {
        match self {
            ReservedGuard::Always => true,
            ReservedGuard::Success => status.is_success(),
            ReservedGuard::Failure => status.is_failure(),
        }
    }
}

/// Decide whether the step's `if` guard lets it run.
pub fn guard_passes(step: &Step, env: &Environment, status: RunStatus) -> bool {
    let Some(ref raw) = step.condition else {
        return true;
    };
    if let Some(token) = raw.as_str().and_then(ReservedGuard::parse) {
        return token.passes(status);
    }
    match env.resolve(raw) {
        Value::Bool(b) => b,
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

/// Decide whether the step's `active` flag enables it.
pub fn is_active(step: &Step, env: &Environment) -> bool {
    let Some(ref raw) = step.active else {
        return true;
    };
    match env.resolve(raw) {
        Value::Bool(b) => b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Resolve every `with` entry against the environment.
pub fn resolve_inputs(step: &Step, env: &Environment) -> Map<String, Value> {
    step.with
        .iter()
        .map(|(key, value)| (key.clone(), env.resolve_typed(value)))
        .collect()
}
