//! Audit trail of a workflow run.
//!
//! The engine emits one [`AuditEntry`] per phase and task boundary. Entries
//! are appended as JSON lines by [`AuditLogger`].

mod logger;

pub use logger::AuditLogger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    PhaseStarted,
    PhaseCompleted,
    PhaseSkipped,
    TaskStarted,
    TaskCompleted,
    /// `<progress>` reported by an agent; the detail holds the percentage.
    Progress,
    Blocked,
    Failed,
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PhaseStarted => "phase_started",
            Self::PhaseCompleted => "phase_completed",
            Self::PhaseSkipped => "phase_skipped",
            Self::TaskStarted => "task_started",
            Self::TaskCompleted => "task_completed",
            Self::Progress => "progress",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub event: AuditEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(phase: &str, event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            phase: phase.to_string(),
            task_id: None,
            event,
            detail: None,
        }
    }

    pub fn with_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
