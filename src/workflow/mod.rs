//! Workflow definitions and the engine that runs them.

pub mod definition;
pub mod engine;
pub mod state;
pub mod template;

pub use definition::{
    AgentStep, CodeStep, GateDefinition, GatesStep, PerTaskPhase, PhaseDefinition,
    WorkflowDefinition,
};
pub use engine::WorkflowEngine;
pub use state::{Checkpoint, INITIAL_PHASE, PriorState, WorkflowResult, WorkflowStatus};
