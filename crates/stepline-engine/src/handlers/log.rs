//! `local.log`: print a message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::StepContext;
use crate::error::EngineResult;
use crate::registry::Handler;
use crate::result::StepOutput;
use crate::schema::{self, scalar_string};
use crate::workflow::Step;

#[derive(Debug, Serialize, Deserialize)]
struct LogInput {
    #[serde(deserialize_with = "scalar_string")]
    message: String,
}

/// Prints `message` and echoes it back.
pub struct LogHandler;

#[async_trait]
impl Handler for LogHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<LogInput>(raw)
    }

    async fn run(&self, step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: LogInput = schema::parse_inputs(&step.with)?;
        println!("{}", input.message);
        Ok(StepOutput::success().with("message", input.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::error::EngineError;
    use crate::handlers::testing::run_handler;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_echoes_message() {
        let step = Step::new("a", "local.log").with_input("message", "hello");
        let output = run_handler(&LogHandler, &step, &mut Environment::default()).await.unwrap();
        assert_eq!(output.to_value(), json!({"success": true, "message": "hello"}));
    }

    #[tokio::test]
    async fn test_log_coerces_numbers() {
        let step = Step::new("a", "local.log").with_input("message", 1);
        let output = run_handler(&LogHandler, &step, &mut Environment::default()).await.unwrap();
        assert_eq!(output.get("message"), Some(&json!("1")));
    }

    #[tokio::test]
    async fn test_log_requires_message() {
        let step = Step::new("a", "local.log");
        let err = run_handler(&LogHandler, &step, &mut Environment::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
