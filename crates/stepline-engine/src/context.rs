//! Execution frames and the context handed to handlers.

use futures::future::BoxFuture;

use crate::environment::Environment;
use crate::result::{RunState, RunStatus};
use crate::workflow::{Step, StepExecutor};

/// The environments a step executes against.
///
/// `scope` resolves templates and is handed to the handler; `parent`
/// receives the step's recorded outputs and `output` exports. For a step
/// outside any iteration both are the same environment.
pub enum Frame<'a> {
    Ambient(&'a mut Environment),
    Scoped {
        scope: &'a mut Environment,
        parent: &'a mut Environment,
    },
}

impl<'a> Frame<'a> {
    pub fn ambient(env: &'a mut Environment) -> Self {
        Frame::Ambient(env)
    }

    pub fn scoped(scope: &'a mut Environment, parent: &'a mut Environment) -> Self {
        Frame::Scoped { scope, parent }
    }

    /// The resolving environment.
    pub fn scope(&mut self) -> &mut Environment {
        match self {
            Frame::Ambient(env) => &mut **env,
            Frame::Scoped { scope, .. } => &mut **scope,
        }
    }

    /// The environment outputs are written to.
    pub fn parent(&mut self) -> &mut Environment {
        match self {
            Frame::Ambient(env) => &mut **env,
            Frame::Scoped { parent, .. } => &mut **parent,
        }
    }
}

/// What a handler can see and do while it runs.
pub struct StepContext<'a> {
    env: &'a mut Environment,
    run: &'a mut RunState,
    executor: &'a StepExecutor,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(env: &'a mut Environment, run: &'a mut RunState, executor: &'a StepExecutor) -> Self {
        Self { env, run, executor }
    }

    /// The resolving environment of the running step.
    pub fn env(&self) -> &Environment {
        &*self.env
    }

    /// Run-wide status at this point of the run.
    pub fn status(&self) -> RunStatus {
        self.run.status()
    }

    /// Run a nested step against `scope`, exporting into this step's
    /// resolving environment.
    ///
    /// The nested outcome is folded into the run-wide status.
    pub fn run_nested<'s>(&'s mut self, step: &'s Step, scope: &'s mut Environment) -> BoxFuture<'s, ()>
    where
        'a: 's,
    {
        self.executor
            .run_step(step, &mut *self.run, Frame::scoped(scope, &mut *self.env))
    }
}
