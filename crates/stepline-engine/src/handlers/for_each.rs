//! `control.for-each`: run nested sub-steps once per element.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::StepContext;
use crate::error::{EngineError, EngineResult};
use crate::registry::Handler;
use crate::result::StepOutput;
use crate::schema;
use crate::workflow::{iteration_name, Step};

#[derive(Debug, Serialize, Deserialize)]
struct ForEachInput {
    items: Vec<Value>,
}

/// For every element of `items`, runs the step's `steps` in order against a
/// scoped copy of the environment holding `item`. Sub-steps are renamed
/// `<sub>#<i+1>` and write their outputs into this step's environment.
pub struct ForEachHandler;

#[async_trait]
impl Handler for ForEachHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<ForEachInput>(raw)
    }

    async fn run(&self, step: &Step, ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: ForEachInput = schema::parse_inputs(&step.with)?;
        let sub_steps = step.steps.as_deref().ok_or_else(|| {
            EngineError::Execution(format!(
                "\"steps\" must be a list inside control.for-each step \"{}\"",
                step.name
            ))
        })?;

        let loop_count = input.items.len();
        for (index, item) in input.items.into_iter().enumerate() {
            let mut scope = ctx.env().scoped(item);
            for sub_step in sub_steps {
                let looped = sub_step.renamed(iteration_name(&sub_step.name, index));
                ctx.run_nested(&looped, &mut scope).await;
            }
        }

        Ok(StepOutput::new().with("loopCount", loop_count))
    }
}
