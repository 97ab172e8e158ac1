//! Agent query capability.
//!
//! The engine drives agents only through [`AgentQuery`]. The shipped
//! implementation, [`ClaudeCliAgent`], spawns the `claude` CLI; tests use
//! scripted doubles.

mod claude;
pub mod stream;

pub use claude::ClaudeCliAgent;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::schemas::{OutputSchema, extract_json_payload};

/// One agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Phase (or `phase/gate`) issuing the query, for logs and errors.
    pub phase: String,
    pub prompt: String,
    pub model: String,
    pub working_dir: PathBuf,
    /// `mcpServers` map handed to the agent, if any.
    pub mcp_servers: Option<Value>,
    /// Expected output contract.
    pub schema: Option<OutputSchema>,
}

#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    /// Final text of the agent's answer.
    pub text: String,
    /// Structured output, when the agent returned one directly.
    pub structured: Option<Value>,
}

impl AgentResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            text: String::new(),
            structured: Some(value),
        }
    }

    /// The JSON payload: structured output first, then JSON found in the text.
    pub fn payload(&self) -> Option<Value> {
        self.structured
            .clone()
            .or_else(|| extract_json_payload(&self.text))
    }
}

/// Abstraction over agent invocation for testability.
/// Real implementation: `ClaudeCliAgent`.
#[async_trait]
pub trait AgentQuery: Send + Sync {
    async fn query(&self, request: AgentRequest) -> Result<AgentResponse>;
}
