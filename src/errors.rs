//! Typed error hierarchy for the workflow engine.
//!
//! Two top-level enums cover the two subsystems:
//! - `WorkflowError`: engine, handler, contract and definition failures
//! - `GitHubError`: code-host client failures
//!
//! `DescriptionError` wraps `GitHubError` for the PR description updater.
//!
//! Blockers are not errors: a blocked run returns a
//! `WorkflowStatus::Paused` result.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while executing a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Agent output failed its phase contract.
    #[error("{contract} contract violated at `{path}`: {message}")]
    ContractViolation {
        contract: String,
        path: String,
        message: String,
    },

    /// A handler needs a context key that is not present.
    #[error("{handler} handler requires \"{key}\" in context")]
    MissingPrecondition { handler: String, key: String },

    #[error("No handler registered with name: {name}")]
    HandlerNotFound { name: String },

    #[error("Unknown phase: {name}")]
    UnknownPhase { name: String },

    #[error("Unknown output schema: {name}")]
    UnknownSchema { name: String },

    #[error("Task {id} is pending but missing from the analysis")]
    UnknownTask { id: String },

    #[error("Invalid workflow definition: {message}")]
    InvalidDefinition { message: String },

    /// The agent query capability itself failed (spawn, transport, non-zero exit).
    #[error("Agent query failed during {phase}: {message}")]
    Agent { phase: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn contract(
        contract: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ContractViolation {
            contract: contract.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing(handler: &str, key: &str) -> Self {
        Self::MissingPrecondition {
            handler: handler.to_string(),
            key: key.to_string(),
        }
    }
}

/// Errors from the code-host client.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Pull request #{number} not found")]
    NotFound { number: u64 },

    /// Primary or secondary rate limit hit; `reset_at` comes from `x-ratelimit-reset`.
    #[error("GitHub rate limit exceeded: {message}")]
    RateLimited {
        reset_at: Option<DateTime<Utc>>,
        message: String,
    },

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error talking to GitHub: {0}")]
    Network(String),

    #[error("{0}")]
    InvalidConfig(String),

    #[error("Failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Errors from the pull-request description updater.
#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("Invalid PR number")]
    InvalidPrNumber,

    #[error("New description cannot be empty")]
    EmptyDescription,

    #[error("Unknown merge strategy: {0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

impl GitHubError {
    /// Rate limits, network failures and server errors are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound { .. } | Self::InvalidConfig(_) | Self::RetriesExhausted { .. } => false,
        }
    }
}
