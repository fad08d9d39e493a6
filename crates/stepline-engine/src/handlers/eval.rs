//! `local.eval`: evaluate an expression against the environment.

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
struct EvalInput {
    #[serde(deserialize_with = "scalar_string")]
    expression: String,
}

/// Evaluates `expression` with the sandboxed evaluator.
///
/// An expression that fails to evaluate fails the step.
pub struct EvalHandler;

#[async_trait]
impl Handler for EvalHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<EvalInput>(raw)
    }

    async fn run(&self, step: &Step, ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: EvalInput = schema::parse_inputs(&step.with)?;
        let result = ctx.env().evaluate(&input.expression).map_err(|e| {
            tracing::error!(step = %step.name, expression = %input.expression, "❌ failed to evaluate expression");
            e
        })?;
        Ok(StepOutput::success().with("result", result))
    }
}
