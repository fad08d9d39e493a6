//! Engine error types.

use thiserror::Error;

/// Errors raised while loading or executing a workflow.
///
/// Per-step variants (`UnknownAction`, `InvalidInput`, `Execution`, ...) are
/// absorbed by the executor into the run-wide status. Only `DocumentLoad`
/// escapes a run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Step names an action absent from the registry.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Resolved inputs do not match the handler's declared shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Handler operation failed.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Template or guard expression failed to evaluate.
    #[error("Expression error: {0}")]
    Expression(String),

    /// Workflow document could not be read, parsed or validated.
    #[error("Failed to load workflow '{path}': {reason}")]
    DocumentLoad { path: String, reason: String },

    /// External handler bundle could not be loaded.
    #[error("Bundle error: {0}")]
    Bundle(String),

    /// Process spawn error.
    #[error("Process error: {0}")]
    Process(String),

    /// Handler operation timed out.
    #[error("Execution timed out after {0} seconds")]
    Timeout(u64),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML parse error.
    #[error("YAML error: {0}")]
    Yaml(String),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Build a document load error for the given path.
    pub fn document(path: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::DocumentLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Json(e.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::Yaml(e.to_string())
    }
}

impl From<minijinja::Error> for EngineError {
    fn from(e: minijinja::Error) -> Self {
        EngineError::Expression(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::UnknownAction("nonexistent.action".to_string());
        assert_eq!(err.to_string(), "Unknown action: nonexistent.action");

        let err = EngineError::document("flow.yaml", "missing field `steps`");
        assert_eq!(
            err.to_string(),
            "Failed to load workflow 'flow.yaml': missing field `steps`"
        );

        let err = EngineError::Timeout(5);
        assert_eq!(err.to_string(), "Execution timed out after 5 seconds");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_error_from_yaml() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{ not: a list").unwrap_err();
        let err: EngineError = yaml_err.into();
        assert!(matches!(err, EngineError::Yaml(_)));
    }
}
