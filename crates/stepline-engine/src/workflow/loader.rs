//! Workflow document loader.
//!
//! Reads a YAML document and checks its shape before the driver runs it:
//! - `steps` is required, `env` is an optional mapping
//! - every step has a non-empty `name` and `action`
//! - step names are unique within their nesting level

use std::collections::HashSet;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::workflow::types::{Step, Workflow};

/// Read and parse a workflow file.
pub fn load_workflow_file(path: impl AsRef<Path>) -> EngineResult<Workflow> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let content = std::fs::read_to_string(path)
        .map_err(|e| EngineError::document(&label, format!("cannot read file: {}", e)))?;
    parse_workflow_named(&content, &label)
}

/// Parse a workflow document from YAML.
pub fn parse_workflow(yaml_content: &str) -> EngineResult<Workflow> {
    parse_workflow_named(yaml_content, "<inline>")
}

fn parse_workflow_named(yaml_content: &str, label: &str) -> EngineResult<Workflow> {
    let workflow: Workflow = serde_yaml::from_str(yaml_content)
        .map_err(|e| EngineError::document(label, format!("invalid workflow YAML: {}", e)))?;
    validate_steps(&workflow.steps, "steps").map_err(|reason| EngineError::document(label, reason))?;
    Ok(workflow)
}

fn validate_steps(steps: &[Step], path: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    for (idx, step) in steps.iter().enumerate() {
        let at = format!("{}[{}]", path, idx);
        if step.name.trim().is_empty() {
            return Err(format!("{}: step name must not be empty", at));
        }
        if step.action.trim().is_empty() {
            return Err(format!("{} ('{}'): action must not be empty", at, step.name));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(format!("{}: duplicate step name '{}'", at, step.name));
        }
        if let Some(ref nested) = step.steps {
            validate_steps(nested, &format!("{}.steps", at))?;
        }
    }
    Ok(())
}
