//! Run status, checkpoints and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::context::{TASKS_COMPLETED, TASKS_PENDING};

/// `currentPhase` of a checkpoint taken before any phase completed.
pub const INITIAL_PHASE: &str = "init";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Paused,
    Complete,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Everything needed to resume a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Last completed phase, or `init`.
    pub current_phase: String,
    pub variables: Map<String, Value>,
    pub tasks_completed: Vec<String>,
    pub tasks_pending: Vec<String>,
}

impl Checkpoint {
    /// Build a checkpoint from context variables, reading the tracking lists
    /// out of them.
    pub fn from_variables(current_phase: &str, variables: Map<String, Value>) -> Self {
        let list = |key: &str| -> Vec<String> {
            variables
                .get(key)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default()
        };
        let tasks_completed = list(TASKS_COMPLETED);
        let tasks_pending = list(TASKS_PENDING);
        Self {
            current_phase: current_phase.to_string(),
            variables,
            tasks_completed,
            tasks_pending,
        }
    }
}

/// Input to [`WorkflowEngine::resume`](super::WorkflowEngine::resume).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorState {
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub completed_phases: Vec<String>,
}

impl From<Checkpoint> for PriorState {
    /// Phases up to and including `currentPhase` are treated as completed.
    fn from(checkpoint: Checkpoint) -> Self {
        let completed_phases = if checkpoint.current_phase == INITIAL_PHASE {
            Vec::new()
        } else {
            vec![checkpoint.current_phase]
        };
        Self {
            variables: checkpoint.variables,
            completed_phases,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub completed_phases: Vec<String>,
    pub outputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn is_complete(&self) -> bool {
        self.status == WorkflowStatus::Complete
    }

    pub fn is_paused(&self) -> bool {
        self.status == WorkflowStatus::Paused
    }

    pub fn last_completed_phase(&self) -> &str {
        self.completed_phases
            .last()
            .map(String::as_str)
            .unwrap_or(INITIAL_PHASE)
    }

    /// Checkpoint to persist for a paused run.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::from_variables(self.last_completed_phase(), self.outputs.clone())
    }
}
