//! Deterministic workflow steps.
//!
//! A handler is a named function run against the execution context instead
//! of an agent. Workflows reference handlers by name from `code` phases.

pub mod create_issues;
pub mod registry;
pub mod save_checkpoint;

pub use create_issues::create_issues;
pub use registry::{Handler, HandlerRegistry, create_default_registry};
pub use save_checkpoint::save_checkpoint;

pub const CREATE_ISSUES: &str = "create-issues";
pub const SAVE_CHECKPOINT: &str = "save-checkpoint";

/// What a step asks the engine to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Stop the run and pause with this reason.
    Blocked(String),
}
