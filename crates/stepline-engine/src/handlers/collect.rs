//! `local.collect`: gather a field from every iteration of a step.

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
struct CollectInput {
    #[serde(deserialize_with = "scalar_string")]
    prefix: String,
    #[serde(deserialize_with = "scalar_string")]
    key: String,
}

/// Collects `env["<prefix>#<n>.<key>"]` for every iteration `n`, in
/// iteration order.
pub struct CollectHandler;

#[async_trait]
impl Handler for CollectHandler {
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        schema::normalize::<CollectInput>(raw)
    }

    async fn run(&self, step: &Step, ctx: &mut StepContext<'_>) -> EngineResult<StepOutput> {
        let input: CollectInput = schema::parse_inputs(&step.with)?;
        let head = format!("{}#", input.prefix);
        let tail = format!(".{}", input.key);

        let mut matches: Vec<(u64, &Value)> = ctx
            .env()
            .variables()
            .iter()
            .filter_map(|(name, value)| {
                let index = name.strip_prefix(&head)?.strip_suffix(&tail)?;
                index.parse::<u64>().ok().map(|n| (n, value))
            })
            .collect();
        matches.sort_by_key(|(n, _)| *n);

        let result: Vec<Value> = matches.into_iter().map(|(_, v)| v.clone()).collect();
        tracing::debug!(step = %step.name, count = result.len(), "collected iteration results");
        Ok(StepOutput::success().with("result", result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::handlers::testing::run_handler;
    use serde_json::json;

    #[tokio::test]
    async fn test_collect_in_iteration_order() {
        let mut env = Environment::default();
        for n in [10, 2, 1] {
            env.set_variable(format!("fetch#{}.body", n), json!(n));
        }
        env.set_variable("fetch#3.status", json!(200));
        env.set_variable("fetcher#4.body", json!("other step"));
        env.set_variable("fetch.body", json!("not an iteration"));

        let step = Step::new("c", "local.collect")
            .with_input("prefix", "fetch")
            .with_input("key", "body");
        let output = run_handler(&CollectHandler, &step, &mut env).await.unwrap();
        assert_eq!(output.get("result"), Some(&json!([1, 2, 10])));
    }

    #[tokio::test]
    async fn test_collect_nothing() {
        let step = Step::new("c", "local.collect")
            .with_input("prefix", "none")
            .with_input("key", "x");
        let output = run_handler(&CollectHandler, &step, &mut Environment::default())
            .await
            .unwrap();
        assert_eq!(output.to_value(), json!({"success": true, "result": []}));
    }
}
