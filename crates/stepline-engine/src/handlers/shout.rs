//! `local.shout`: print a word in capitals.

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
struct ShoutInput {
    #[serde(deserialize_with = "scalar_string")]
    word: String,
}

/// Prints `word` upper-cased as `📣 WORD!`.
pub struct ShoutHandler;

#[async_trait]
impl Handler for ShoutHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<ShoutInput>(raw)
    }

    async fn run(&self, step: &Step, _ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: ShoutInput = schema::parse_inputs(&step.with)?;
        let shouted = input.word.to_uppercase();
        println!("📣 {}!", shouted);
        Ok(StepOutput::success().with("shouted", shouted))
    }
}
