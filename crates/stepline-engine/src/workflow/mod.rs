//! Workflow documents and their execution.

mod driver;
mod executor;
mod loader;
pub mod resolver;
mod types;

pub use driver::{run_workflow, WorkflowDriver};
pub use executor::StepExecutor;
pub use loader::{load_workflow_file, parse_workflow};
pub use types::{iteration_name, Step, Workflow};
