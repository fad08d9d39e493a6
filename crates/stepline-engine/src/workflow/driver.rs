//! Workflow driver: the top-level step loop of one run.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Frame;
use crate::environment::Environment;
use crate::error::EngineResult;
use crate::expression::ExpressionEngine;
use crate::registry::HandlerRegistry;
use crate::result::RunState;
use crate::workflow::executor::StepExecutor;
use crate::workflow::loader::load_workflow_file;
use crate::workflow::types::Workflow;

/// Runs workflows against a handler registry.
///
/// Steps execute strictly in document order, one at a time. A failing
/// step downgrades the run-wide status but never stops the loop.
#[derive(Debug, Clone)]
pub struct WorkflowDriver {
    executor: StepExecutor,
    expressions: Arc<ExpressionEngine>,
}

impl WorkflowDriver {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            executor: StepExecutor::new(registry),
            expressions: Arc::new(ExpressionEngine::new()),
        }
    }

    /// Run a parsed workflow. Overrides win over the document's `env`.
    pub async fn run(&self, workflow: &Workflow, overrides: &HashMap<String, Value>) -> RunState {
        let mut env = Environment::merged(&workflow.env, overrides, Arc::clone(&self.expressions));
        self.execute(workflow, &mut env).await
    }

    /// Load a workflow file and run it.
    ///
    /// Only loading can fail; step failures are reported in the returned
    /// state.
    pub async fn run_file(
        &self,
        path: impl AsRef<Path>,
        overrides: &HashMap<String, Value>,
    ) -> EngineResult<RunState> {
        let path = path.as_ref();
        let workflow = load_workflow_file(path)?;
        tracing::info!(path = %path.display(), steps = workflow.steps.len(), "📄 workflow loaded");
        Ok(self.run(&workflow, overrides).await)
    }

    /// Run a workflow's steps against an existing environment.
    pub async fn execute(&self, workflow: &Workflow, env: &mut Environment) -> RunState {
        let mut run = RunState::new();
        tracing::info!(steps = workflow.steps.len(), "🚀 starting workflow");

        for step in &workflow.steps {
            self.executor.run_step(step, &mut run, Frame::ambient(&mut *env)).await;
        }

        if run.status().is_success() {
            tracing::info!(
                executed = run.executed(),
                skipped = run.skipped(),
                "✅ workflow completed"
            );
        } else {
            tracing::error!(
                executed = run.executed(),
                skipped = run.skipped(),
                failed = run.failed(),
                "❌ workflow failed"
            );
        }
        run
    }
}

/// Load and run a workflow file with the given registry.
pub async fn run_workflow(
    path: impl AsRef<Path>,
    overrides: &HashMap<String, Value>,
    registry: Arc<HandlerRegistry>,
) -> EngineResult<RunState> {
    WorkflowDriver::new(registry).run_file(path, overrides).await
}
