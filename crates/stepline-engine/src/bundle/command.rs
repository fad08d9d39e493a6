//! Shell command handler backing manifest bundle actions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::context::StepContext;
use crate::error::{EngineError, EngineResult};
use crate::registry::Handler;
use crate::result::StepOutput;
use crate::workflow::Step;

/// One action exported by a bundle manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command template. Sees the environment plus `with.<input>`.
    pub command: String,

    /// Shell to use (default: "sh").
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Extra process environment, values may be templated.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Required input names.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

fn default_shell() -> String {
    "sh".to_string()
}

/// Runs a templated shell command for a bundle action.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    action: String,
    spec: CommandSpec,
}

impl CommandHandler {
    pub fn new(action: impl Into<String>, spec: CommandSpec) -> Self {
        Self {
            action: action.into(),
            spec,
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn execute(
        &self,
        command: &str,
        cwd: Option<&str>,
        env: &HashMap<String, String>,
    ) -> EngineResult<StepOutput> {
        let mut cmd = Command::new(&self.spec.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in env {
            cmd.env(k, v);
        }

        let child = cmd
            .spawn()
            .map_err(|e| EngineError::Process(format!("Failed to spawn process: {}", e)))?;

        let output = match self.spec.timeout_seconds {
            Some(secs) => timeout(Duration::from_secs(secs), child.wait_with_output())
                .await
                .map_err(|_| EngineError::Timeout(secs))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| EngineError::Process(format!("Failed to wait for process: {}", e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        Ok(StepOutput::new()
            .with("success", exit_code == 0)
            .with("exit_code", exit_code)
            .with("stdout", String::from_utf8_lossy(&output.stdout).into_owned())
            .with("stderr", String::from_utf8_lossy(&output.stderr).into_owned()))
    }
}

#[async_trait]
impl Handler for CommandHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        let missing: Vec<&str> = self
            .spec
            .inputs
            .iter()
            .filter(|name| raw.get(name.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "{} requires inputs: {}",
                self.action,
                missing.join(", ")
            )));
        }
        Ok(raw)
    }

    async fn run(&self, step: &Step, ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let mut vars = ctx.env().snapshot();
        vars.insert("with".to_string(), Value::Object(step.with.clone()));
        let templates = ctx.env().expressions();

        let command = templates.render_strict(&self.spec.command, &vars)?;
        let cwd = match self.spec.cwd {
            Some(ref dir) => Some(templates.render_strict(dir, &vars)?),
            None => None,
        };
        let mut env = HashMap::with_capacity(self.spec.env.len());
        for (k, v) in &self.spec.env {
            env.insert(k.clone(), templates.render_strict(v, &vars)?);
        }

        tracing::debug!(step = %step.name, action = %self.action, command = %command, "running bundle command");
        self.execute(&command, cwd.as_deref(), &env).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::handlers::testing::run_handler;
    use serde_json::json;

    fn spec(command: &str) -> CommandSpec {
        CommandSpec {
            command: command.to_string(),
            shell: default_shell(),
            cwd: None,
            env: HashMap::new(),
            inputs: vec![],
            timeout_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_command_renders_inputs_and_env() {
        let mut env = Environment::default();
        env.set_variable("greeting", json!("hello"));
        let mut spec = spec("echo {{ env.greeting }} {{ with.name }}");
        spec.inputs = vec!["name".to_string()];
        let handler = CommandHandler::new("demo.greet", spec);

        let step = Step::new("g", "demo.greet").with_input("name", "ada");
        let output = run_handler(&handler, &step, &mut env).await.unwrap();

        assert_eq!(output.get("success"), Some(&json!(true)));
        assert_eq!(output.get("exit_code"), Some(&json!(0)));
        assert_eq!(output.get("stdout"), Some(&json!("hello ada\n")));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unsuccessful() {
        let handler = CommandHandler::new("demo.fail", spec("echo oops >&2; exit 3"));
        let step = Step::new("f", "demo.fail");
        let output = run_handler(&handler, &step, &mut Environment::default())
            .await
            .unwrap();

        assert!(!output.is_success());
        assert_eq!(output.get("exit_code"), Some(&json!(3)));
        assert_eq!(output.get("stderr"), Some(&json!("oops\n")));
    }

    #[tokio::test]
    async fn test_process_env_is_templated() {
        let mut env = Environment::default();
        env.set_variable("region", json!("eu"));
        let mut spec = spec("echo $REGION");
        spec.env.insert("REGION".to_string(), "{{ env.region }}".to_string());
        let handler = CommandHandler::new("demo.env", spec);

        let output = run_handler(&handler, &Step::new("e", "demo.env"), &mut env)
            .await
            .unwrap();
        assert_eq!(output.get("stdout"), Some(&json!("eu\n")));
    }

    #[tokio::test]
    async fn test_missing_required_input() {
        let mut spec = spec("echo {{ with.name }}");
        spec.inputs = vec!["name".to_string()];
        let handler = CommandHandler::new("demo.greet", spec);

        let err = run_handler(&handler, &Step::new("g", "demo.greet"), &mut Environment::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(ref m) if m.contains("name")));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut spec = spec("sleep 5");
        spec.timeout_seconds = Some(1);
        let handler = CommandHandler::new("demo.slow", spec);

        let err = run_handler(&handler, &Step::new("s", "demo.slow"), &mut Environment::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout(1)));
    }
}
