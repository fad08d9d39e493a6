//! `local.file.copy`: copy a local file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::context::StepContext;
use crate::error::EngineResult;
use crate::registry::Handler;
use crate::result::StepOutput;
use crate::schema::{self, scalar_string};
use crate::workflow::Step;

#[derive(Debug, Serialize, Deserialize)]
struct FileCopyInput {
    #[serde(deserialize_with = "scalar_string")]
    source: String,
    #[serde(deserialize_with = "scalar_string")]
    destination: String,
}

/// Copies `source` to `destination`, creating missing parent directories.
///
/// A missing source or a failed copy is reported as `success: false`
/// rather than a handler error.
pub struct FileCopyHandler;

impl FileCopyHandler {
    async fn copy(source: &Path, destination: &Path) -> std::io::Result<u64> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::copy(source, destination).await
    }
}

#[async_trait]
impl Handler for FileCopyHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<FileCopyInput>(raw)
    }

    async fn run(&self, step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: FileCopyInput = schema::parse_inputs(&step.with)?;
        let source = Path::new(&input.source);
        let destination = Path::new(&input.destination);

        let success = if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            tracing::error!(step = %step.name, source = %input.source, "❌ source file not found");
            false
        } else {
            match Self::copy(source, destination).await {
                Ok(bytes) => {
                    tracing::info!(source = %input.source, destination = %input.destination, bytes, "file copied");
                    true
                }
                Err(e) => {
                    tracing::error!(step = %step.name, error = %e, "❌ file copy failed");
                    false
                }
            }
        };

        Ok(StepOutput::new()
            .with("success", success)
            .with("source", input.source)
            .with("destination", input.destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::handlers::testing::run_handler;
    use serde_json::json;

    #[tokio::test]
    async fn test_copy_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.txt");
        let destination = dir.path().join("nested/out.txt");
        std::fs::write(&source, "payload").unwrap();

        let step = Step::new("cp", "local.file.copy")
            .with_input("source", source.display().to_string())
            .with_input("destination", destination.display().to_string());
        let output = run_handler(&FileCopyHandler, &step, &mut Environment::default())
            .await
            .unwrap();

        assert!(output.is_success());
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_missing_source_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("absent.txt").display().to_string();

        let step = Step::new("cp", "local.file.copy")
            .with_input("source", source.clone())
            .with_input("destination", dir.path().join("out.txt").display().to_string());
        let output = run_handler(&FileCopyHandler, &step, &mut Environment::default())
            .await
            .unwrap();

        assert!(!output.is_success());
        assert_eq!(output.get("source"), Some(&json!(source)));
    }
}
