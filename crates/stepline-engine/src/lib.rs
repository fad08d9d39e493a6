//! Stepline engine
//!
//! Declarative workflow execution for YAML documents.
//!
//! This crate provides:
//! - Environment with sandboxed `{{ expr }}` templating
//! - Handler registry with external bundle loading
//! - Step resolution (guards, activation, typed inputs) and dispatch
//! - Workflow driver with run-wide success/failure status
//! - Built-in handlers, including `control.for-each`

pub mod bundle;
pub mod context;
pub mod environment;
pub mod error;
pub mod expression;
pub mod handlers;
pub mod registry;
pub mod result;
pub mod schema;
pub mod workflow;

pub use context::{Frame, StepContext};
pub use environment::Environment;
pub use error::{EngineError, EngineResult};
pub use handlers::create_default_registry;
pub use registry::{BundleLoader, Handler, HandlerBundle, HandlerRegistry};
pub use result::{RunState, RunStatus, StepOutcome, StepOutput};
pub use workflow::{load_workflow_file, parse_workflow, run_workflow, Step, Workflow, WorkflowDriver};
