//! Signal types an agent can emit in its text output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A progress percentage signal.
///
/// The agent outputs `<progress>X%</progress>` to indicate partial completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSignal {
    /// The percentage value (0-100)
    pub percentage: u8,
    pub timestamp: DateTime<Utc>,
}

impl ProgressSignal {
    pub fn new(percentage: u8) -> Self {
        Self {
            percentage,
            timestamp: Utc::now(),
        }
    }
}

/// The agent cannot continue without outside help.
///
/// Emitted as `<blocker>description</blocker>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerSignal {
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl BlockerSignal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            timestamp: Utc::now(),
        }
    }
}

/// All signals found in one agent response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSignals {
    #[serde(default)]
    pub progress: Vec<ProgressSignal>,
    #[serde(default)]
    pub blockers: Vec<BlockerSignal>,
}

impl AgentSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_blocker(&self) -> bool {
        !self.blockers.is_empty()
    }

    /// All blocker descriptions joined into one message.
    pub fn blocker_message(&self) -> Option<String> {
        if self.blockers.is_empty() {
            return None;
        }
        Some(
            self.blockers
                .iter()
                .map(|b| b.description.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub fn latest_progress(&self) -> Option<u8> {
        self.progress.last().map(|p| p.percentage)
    }
}
