use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::stream::{ContentBlock, StreamEvent, describe_tool_use};
use super::{AgentQuery, AgentRequest, AgentResponse};

/// Runs queries through the `claude` CLI in print mode with stream-json
/// output. The prompt is written to stdin.
#[derive(Debug, Clone)]
pub struct ClaudeCliAgent {
    claude_cmd: String,
    permission_mode: Option<String>,
    setting_sources: Vec<String>,
}

impl ClaudeCliAgent {
    pub fn new(claude_cmd: impl Into<String>) -> Self {
        Self {
            claude_cmd: claude_cmd.into(),
            permission_mode: None,
            setting_sources: Vec::new(),
        }
    }

    pub fn with_permission_mode(mut self, mode: Option<String>) -> Self {
        self.permission_mode = mode;
        self
    }

    pub fn with_setting_sources(mut self, sources: Vec<String>) -> Self {
        self.setting_sources = sources;
        self
    }

    pub fn flags(&self, request: &AgentRequest) -> Vec<String> {
        let mut flags = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            request.model.clone(),
        ];
        if let Some(mode) = &self.permission_mode {
            flags.push("--permission-mode".to_string());
            flags.push(mode.clone());
        }
        if !self.setting_sources.is_empty() {
            flags.push("--setting-sources".to_string());
            flags.push(self.setting_sources.join(","));
        }
        if let Some(servers) = &request.mcp_servers {
            flags.push("--mcp-config".to_string());
            flags.push(json!({ "mcpServers": servers }).to_string());
        }
        flags
    }
}

#[async_trait]
impl AgentQuery for ClaudeCliAgent {
    async fn query(&self, request: AgentRequest) -> Result<AgentResponse> {
        let start = Instant::now();
        let flags = self.flags(&request);
        debug!(phase = %request.phase, cmd = %self.claude_cmd, "Spawning agent");

        let mut child = Command::new(&self.claude_cmd)
            .args(&flags)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&request.working_dir)
            .spawn()
            .with_context(|| format!("Failed to spawn `{}`", self.claude_cmd))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.prompt.as_bytes()).await?;
            stdin.shutdown().await.context("Failed to close stdin")?;
        }

        let stdout = child.stdout.take().context("Failed to get stdout")?;
        let mut reader = BufReader::new(stdout).lines();

        let mut accumulated_text = String::new();
        let mut final_result: Option<String> = None;
        let mut structured = None;
        let mut is_error = false;

        while let Some(line) = reader.next_line().await? {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamEvent>(&line) {
                Ok(StreamEvent::Assistant { message, .. }) => {
                    for content in message.content {
                        match content {
                            ContentBlock::ToolUse { name, input, .. } => {
                                debug!(phase = %request.phase, "{}", describe_tool_use(&name, &input));
                            }
                            ContentBlock::Text { text } => {
                                accumulated_text.push_str(&text);
                                accumulated_text.push('\n');
                            }
                            ContentBlock::Other => {}
                        }
                    }
                }
                Ok(StreamEvent::Result {
                    result,
                    is_error: err,
                    structured_output,
                    ..
                }) => {
                    final_result = result;
                    is_error = err;
                    structured = structured_output;
                }
                Ok(StreamEvent::User { .. } | StreamEvent::System { .. }) => {}
                Err(_) => {
                    // Not stream-json; keep it as plain output
                    accumulated_text.push_str(&line);
                    accumulated_text.push('\n');
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for agent process")?;
        let exit_code = output.status.code().unwrap_or(-1);
        info!(
            phase = %request.phase,
            exit_code,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Agent finished"
        );

        let text = final_result.unwrap_or(accumulated_text);
        if is_error || !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                text.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            bail!("agent exited with code {}: {}", exit_code, detail);
        }

        Ok(AgentResponse { text, structured })
    }
}
