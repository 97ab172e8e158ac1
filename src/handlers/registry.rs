//! Name-keyed table of handler functions.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{CREATE_ISSUES, SAVE_CHECKPOINT, StepOutcome, create_issues, save_checkpoint};
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;

/// Shared handler function. The optional value is the phase's `input`.
pub type Handler = Arc<
    dyn Fn(&mut WorkflowContext, Option<&Value>) -> Result<StepOutcome, WorkflowError>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&mut WorkflowContext, Option<&Value>) -> Result<StepOutcome, WorkflowError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Result<Handler, WorkflowError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::HandlerNotFound {
                name: name.to_string(),
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.list())
            .finish()
    }
}

/// A fresh registry holding the built-in handlers.
pub fn create_default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(CREATE_ISSUES, create_issues);
    registry.register(SAVE_CHECKPOINT, save_checkpoint);
    registry
}
