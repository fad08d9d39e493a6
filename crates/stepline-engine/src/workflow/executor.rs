//! Step execution: iteration, resolution, dispatch and output propagation.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::{Frame, StepContext};
use crate::registry::HandlerRegistry;
use crate::result::{RunState, StepOutcome, StepOutput};
use crate::workflow::resolver;
use crate::workflow::types::Step;

/// Executes single steps against a frame and folds their outcome into the
/// run state.
#[derive(Debug, Clone)]
pub struct StepExecutor {
    registry: Arc<HandlerRegistry>,
}

impl StepExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run a step, expanding `forEach` into one execution per element.
    ///
    /// Iterations never short-circuit; each one runs against its own scoped
    /// copy of the frame's resolving environment and writes into the
    /// frame's parent.
    pub fn run_step<'a>(&'a self, step: &'a Step, run: &'a mut RunState, mut frame: Frame<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(ref raw) = step.for_each else {
                self.execute_step(step, run, frame).await;
                return;
            };

            let resolved = frame.scope().resolve_typed(raw);
            match resolved {
                Value::Array(items) => {
                    if items.is_empty() {
                        tracing::info!(step = %step.name, "forEach resolved to an empty list, nothing to run");
                    }
                    for (index, item) in items.into_iter().enumerate() {
                        let iteration = step.iteration(index);
                        let mut scope = frame.scope().scoped(item);
                        self.execute_step(&iteration, &mut *run, Frame::scoped(&mut scope, frame.parent()))
                            .await;
                    }
                }
                other => {
                    tracing::warn!(
                        step = %step.name,
                        value = %other,
                        "⚠️ forEach did not resolve to a list, running once"
                    );
                    self.execute_step(step, run, frame).await;
                }
            }
        })
    }

    /// Execute one step body and record its outcome.
    pub fn execute_step<'a>(
        &'a self,
        step: &'a Step,
        run: &'a mut RunState,
        mut frame: Frame<'a>,
    ) -> BoxFuture<'a, StepOutcome> {
        Box::pin(async move {
            let outcome = self.dispatch(step, &mut *run, &mut frame).await;
            run.record(outcome);
            outcome
        })
    }

    async fn dispatch(&self, step: &Step, run: &mut RunState, frame: &mut Frame<'_>) -> StepOutcome {
        if !resolver::guard_passes(step, frame.scope(), run.status()) {
            tracing::info!(step = %step.name, "⏭️ step skipped: condition \"if\" not met");
            return StepOutcome::Skipped;
        }

        tracing::info!(step = %step.name, action = %step.action, "🔄 running step");

        if !resolver::is_active(step, frame.scope()) {
            tracing::info!(step = %step.name, "⏭️ step skipped: inactive");
            return StepOutcome::Skipped;
        }

        let handler = match self.registry.lookup(&step.action) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(step = %step.name, error = %e, "❌ unknown action");
                return record_failure(step, frame);
            }
        };

        let raw = resolver::resolve_inputs(step, frame.scope());
        let inputs = match handler.validate_input(raw) {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::error!(step = %step.name, error = %e, "❌ invalid input");
                return record_failure(step, frame);
            }
        };
        let resolved = step.with_inputs(inputs);

        let result = {
            let mut ctx = StepContext::new(frame.scope(), &mut *run, self);
            handler.run(&resolved, &mut ctx).await
        };
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(step = %step.name, error = %e, "❌ step failed");
                return record_failure(step, frame);
            }
        };

        tracing::debug!(step = %step.name, output = %output.to_value(), "🧪 step returned");

        let parent = frame.parent();
        parent.record_step_output(&step.name, &output);
        if let Some(ref exports) = step.output {
            for (env_key, field) in exports {
                if let Some(value) = output.get(field) {
                    tracing::info!(step = %step.name, key = %env_key, field = %field, "📦 exporting output");
                    parent.set_variable(env_key.clone(), value.clone());
                }
            }
        }

        StepOutcome::from_success(output.is_success())
    }
}

fn record_failure(step: &Step, frame: &mut Frame<'_>) -> StepOutcome {
    frame.parent().record_step_output(&step.name, &StepOutput::failure());
    StepOutcome::Failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::{EngineError, EngineResult};
    use crate::registry::Handler;
    use crate::result::RunStatus;
    use async_trait::async_trait;
    use serde_json::{json, Map};

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn run(&self, step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
            let value = step.with.get("value").cloned().unwrap_or(Value::Null);
            Ok(StepOutput::success().with("value", value))
        }
    }

    struct Outcome(bool);

    #[async_trait]
    impl Handler for Outcome {
        async fn run(&self, _step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
            Ok(StepOutput::new().with("success", self.0))
        }
    }

    struct Broken;

    #[async_trait]
    impl Handler for Broken {
        async fn run(&self, _step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
            Err(EngineError::Execution("boom".to_string()))
        }
    }

    struct NeedsValue;

    #[async_trait]
    impl Handler for NeedsValue {
        fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
            match raw.get("value") {
                Some(Value::String(_)) => Ok(raw),
                _ => Err(EngineError::InvalidInput("value must be a string".to_string())),
            }
        }

        async fn run(&self, _step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
            Ok(StepOutput::success())
        }
    }

    fn executor() -> StepExecutor {
        let mut registry = HandlerRegistry::new();
        registry.register("test.echo", Echo);
        registry.register("test.pass", Outcome(true));
        registry.register("test.fail", Outcome(false));
        registry.register("test.broken", Broken);
        registry.register("test.strict", NeedsValue);
        StepExecutor::new(Arc::new(registry))
    }

    async fn run_one(executor: &StepExecutor, step: &Step, env: &mut Environment, run: &mut RunState) {
        executor.run_step(step, run, Frame::ambient(env)).await;
    }

    #[tokio::test]
    async fn test_records_output_fields() {
        let executor = executor();
        let mut env = Environment::default();
        env.set_variable("x", json!(5));
        let mut run = RunState::new();

        let step = Step::new("a", "test.echo").with_input("value", "{{ env.x }}");
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(env.get_variable("a.success"), Some(&json!(true)));
        assert_eq!(env.get_variable("a.value"), Some(&json!(5)));
        assert_eq!(run.status(), RunStatus::Success);
        assert_eq!(run.executed(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_fails_step() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        run_one(&executor, &Step::new("a", "nope.missing"), &mut env, &mut run).await;

        assert_eq!(run.status(), RunStatus::Failure);
        assert_eq!(run.failed(), 1);
        assert_eq!(env.get_variable("a.success"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn test_handler_error_is_step_failure() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        run_one(&executor, &Step::new("a", "test.broken"), &mut env, &mut run).await;
        run_one(&executor, &Step::new("b", "test.pass"), &mut env, &mut run).await;

        assert_eq!(run.status(), RunStatus::Failure);
        assert_eq!(run.executed(), 2);
        assert_eq!(env.get_variable("b.success"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_invalid_input_is_step_failure() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        let step = Step::new("a", "test.strict").with_input("value", 3);
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(run.status(), RunStatus::Failure);
        assert_eq!(env.get_variable("a.success"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn test_skipped_steps_do_not_change_status() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        let mut guarded = Step::new("a", "test.fail");
        guarded.condition = Some(json!("false"));
        let mut inactive = Step::new("b", "test.fail");
        inactive.active = Some(json!(false));

        run_one(&executor, &guarded, &mut env, &mut run).await;
        run_one(&executor, &inactive, &mut env, &mut run).await;

        assert_eq!(run.status(), RunStatus::Success);
        assert_eq!(run.skipped(), 2);
        assert!(env.variables().is_empty());
    }

    #[tokio::test]
    async fn test_for_each_runs_every_element() {
        let executor = executor();
        let mut env = Environment::default();
        env.set_variable("items", json!(["x", "y", "z"]));
        let mut run = RunState::new();

        let mut step = Step::new("echo", "test.echo").with_input("value", "{{ item }}");
        step.for_each = Some(json!("{{ env.items }}"));
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(env.get_variable("echo#1.value"), Some(&json!("x")));
        assert_eq!(env.get_variable("echo#2.value"), Some(&json!("y")));
        assert_eq!(env.get_variable("echo#3.value"), Some(&json!("z")));
        assert_eq!(env.get_variable("item"), None);
        assert_eq!(run.executed(), 3);
    }

    #[tokio::test]
    async fn test_for_each_does_not_short_circuit() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        let mut step = Step::new("check", "test.fail");
        step.for_each = Some(json!([1, 2, 3]));
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(run.failed(), 3);
        assert_eq!(run.status(), RunStatus::Failure);
    }

    #[tokio::test]
    async fn test_for_each_guard_is_per_element() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        let mut step = Step::new("even", "test.echo").with_input("value", "{{ item }}");
        step.for_each = Some(json!([1, 2, 3, 4]));
        step.condition = Some(json!("{{ item % 2 == 0 }}"));
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(run.executed(), 2);
        assert_eq!(run.skipped(), 2);
        assert_eq!(env.get_variable("even#2.value"), Some(&json!(2)));
        assert_eq!(env.get_variable("even#1.value"), None);
    }

    #[tokio::test]
    async fn test_for_each_on_non_list_runs_once() {
        let executor = executor();
        let mut env = Environment::default();
        let mut run = RunState::new();

        let mut step = Step::new("once", "test.echo").with_input("value", 1);
        step.for_each = Some(json!("not a list"));
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(run.executed(), 1);
        assert_eq!(env.get_variable("once.value"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_output_export_reaches_parent_only_through_output() {
        let executor = executor();
        let mut env = Environment::default();
        env.set_variable("kept", json!("original"));
        let mut run = RunState::new();

        let mut step = Step::new("pick", "test.echo").with_input("value", "{{ item }}");
        step.for_each = Some(json!(["first", "last"]));
        step.output = Some(
            [
                ("picked".to_string(), "value".to_string()),
                ("gone".to_string(), "missing".to_string()),
                ("kept".to_string(), "missing".to_string()),
            ]
            .into(),
        );
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(env.get_variable("picked"), Some(&json!("last")));
        assert_eq!(env.get_variable("gone"), None);
        assert_eq!(env.get_variable("kept"), Some(&json!("original")));
        assert_eq!(env.get_variable("item"), None);
    }

    #[tokio::test]
    async fn test_null_field_is_exported() {
        let executor = executor();
        let mut env = Environment::default();
        env.set_variable("cleared", json!("stale"));
        let mut run = RunState::new();

        let mut step = Step::new("blank", "test.echo");
        step.output = Some([("cleared".to_string(), "value".to_string())].into());
        run_one(&executor, &step, &mut env, &mut run).await;

        assert_eq!(env.get_variable("blank.value"), Some(&Value::Null));
        assert_eq!(env.get_variable("cleared"), Some(&Value::Null));
    }
}
