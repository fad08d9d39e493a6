//! `local.say`: greet someone.

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
struct SayInput {
    #[serde(deserialize_with = "scalar_string")]
    name: String,
}

/// Prints a greeting. The result carries no `success` field.
pub struct SayHandler;

#[async_trait]
impl Handler for SayHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<SayInput>(raw)
    }

    async fn run(&self, step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: SayInput = schema::parse_inputs(&step.with)?;
        let message = format!("Hello {}!", input.name);
        println!("👋 {}", message);
        Ok(StepOutput::new().with("message", message))
    }
}
