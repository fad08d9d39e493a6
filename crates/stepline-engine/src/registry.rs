//! Handler registry and dispatch.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::StepContext;
use crate::error::{EngineError, EngineResult};
use crate::result::StepOutput;
use crate::workflow::Step;

/// Capability interface implemented by every action.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Validate resolved inputs and return their normalized form.
    ///
    /// The default accepts any input unchanged.
    fn validate_input(&self, raw: Map<String, Value>) -> EngineResult<Map<String, Value>> {
        Ok(raw)
    }

    /// Run the action. `step.with` holds the validated inputs.
    async fn run(&self, step: &Step, ctx: &mut StepContext<'_>) -> EngineResult<StepOutput>;
}

/// A set of handlers exported by an external source.
pub struct HandlerBundle {
    /// Bundle name, used in logs.
    pub name: String,

    /// Exported `action -> handler` pairs, in declaration order.
    pub steps: Vec<(String, Arc<dyn Handler>)>,
}

impl std::fmt::Debug for HandlerBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBundle")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(|(a, _)| a).collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves a bundle identifier into its exported handlers.
pub trait BundleLoader {
    fn load(&self, identifier: &str) -> EngineResult<HandlerBundle>;
}

/// Registry of available actions.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under an action key.
    ///
    /// The first registration wins: a duplicate key is skipped with a
    /// warning and `false` is returned.
    pub fn register<H: Handler + 'static>(&mut self, action: impl Into<String>, handler: H) -> bool {
        self.register_arc(action, Arc::new(handler))
    }

    /// Register a shared handler under an action key.
    pub fn register_arc(&mut self, action: impl Into<String>, handler: Arc<dyn Handler>) -> bool {
        let action = action.into();
        if self.handlers.contains_key(&action) {
            tracing::warn!(action = %action, "⚠️ action already registered, skipping");
            return false;
        }
        self.handlers.insert(action, handler);
        true
    }

    /// Look up the handler for an action.
    pub fn lookup(&self, action: &str) -> EngineResult<Arc<dyn Handler>> {
        self.handlers
            .get(action)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAction(action.to_string()))
    }

    /// Check if an action is registered.
    pub fn has(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// List all registered actions, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        actions.sort_unstable();
        actions
    }

    /// Load external bundles, best effort.
    ///
    /// Each identifier is loaded independently; a failing source is logged
    /// and skipped. Returns the number of handlers newly registered.
    pub fn load_external<L, S>(&mut self, loader: &L, identifiers: &[S]) -> usize
    where
        L: BundleLoader + ?Sized,
        S: AsRef<str>,
    {
        let mut registered = 0;
        for identifier in identifiers {
            let identifier = identifier.as_ref();
            let bundle = match loader.load(identifier) {
                Ok(bundle) => bundle,
                Err(e) => {
                    tracing::error!(bundle = %identifier, error = %e, "❌ failed to load bundle");
                    continue;
                }
            };

            let mut count = 0;
            for (action, handler) in bundle.steps {
                if self.register_arc(action, handler) {
                    count += 1;
                }
            }
            tracing::info!(bundle = %bundle.name, source = %identifier, actions = count, "bundle loaded");
            registered += count;
        }
        registered
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}
