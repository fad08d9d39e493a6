//! Built-in step handlers.
//!
//! - `local.log`, `local.shout`, `local.say`: console output
//! - `local.eval`: sandboxed expression evaluation
//! - `local.collect`: gather iteration results
//! - `local.file.copy`: local file copy
//! - `control.for-each`: nested sub-steps per element

mod collect;
mod eval;
mod file_copy;
mod for_each;
mod log;
mod say;
mod shout;

pub use collect::CollectHandler;
pub use eval::EvalHandler;
pub use file_copy::FileCopyHandler;
pub use for_each::ForEachHandler;
pub use log::LogHandler;
pub use say::SayHandler;
pub use shout::ShoutHandler;

use crate::registry::HandlerRegistry;

/// Create a registry with every built-in handler.
pub fn create_default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry);
    registry
}

/// Register the built-in handlers. Runs before any bundle is loaded so
/// built-ins take precedence.
pub fn register_builtins(registry: &mut HandlerRegistry) {
    registry.register("local.log", LogHandler);
    registry.register("local.shout", ShoutHandler);
    registry.register("local.say", SayHandler);
    registry.register("local.eval", EvalHandler);
    registry.register("local.collect", CollectHandler);
    registry.register("local.file.copy", FileCopyHandler);
    registry.register("control.for-each", ForEachHandler);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::context::StepContext;
    use crate::environment::Environment;
    use crate::error::EngineResult;
    use crate::registry::Handler;
    use crate::result::{RunState, StepOutput};
    use crate::workflow::{Step, StepExecutor};

    /// Validate and run a handler the way the executor would.
    pub async fn run_handler<H: Handler>(
        handler: &H,
        step: &Step,
        env: &mut Environment,
    ) -> EngineResult<StepOutput> {
        let executor = StepExecutor::new(Arc::new(super::create_default_registry()));
        let mut run = RunState::new();
        let inputs = handler.validate_input(step.with.clone())?;
        let step = step.with_inputs(inputs);
        let mut ctx = StepContext::new(env, &mut run, &executor);
        handler.run(&step, &mut ctx).await
    }
}
