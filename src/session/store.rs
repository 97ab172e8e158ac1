//! File-backed sessions under `<working-dir>/.wrangler/sessions/<id>/`.
//!
//! | File | Contents |
//! |------|----------|
//! | `session.json` | [`SessionInfo`] |
//! | `audit.jsonl` | one [`AuditEntry`] per line |
//! | `checkpoint.json` | latest [`Checkpoint`] |
//! | `blocker.md` | blocker text of a paused run |
//! | `result.json` | final [`WorkflowResult`] |

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::SessionSink;
use crate::audit::{AuditEntry, AuditLogger};
use crate::workflow::{Checkpoint, WorkflowResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub spec_file: PathBuf,
    pub working_directory: PathBuf,
    pub workflow: String,
    pub branch: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct SessionManager {
    sessions_dir: PathBuf,
    session_id: Option<String>,
}

impl SessionManager {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            sessions_dir: working_dir.join(".wrangler").join("sessions"),
            session_id: None,
        }
    }

    /// Attach to an existing session, e.g. for resume.
    pub fn open(working_dir: &Path, session_id: &str) -> Result<Self> {
        let manager = Self {
            sessions_dir: working_dir.join(".wrangler").join("sessions"),
            session_id: Some(session_id.to_string()),
        };
        if !manager.session_dir(session_id).is_dir() {
            bail!("Session not found: {}", session_id);
        }
        Ok(manager)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    fn active_dir(&self) -> Result<PathBuf> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No active session"))?;
        Ok(self.session_dir(id))
    }

    /// Start a new session and write `session.json`.
    pub fn create_session(
        &mut self,
        spec_file: &Path,
        working_dir: &Path,
        workflow: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let dir = self.session_dir(&id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;

        let info = SessionInfo {
            id: id.clone(),
            spec_file: spec_file.to_path_buf(),
            working_directory: working_dir.to_path_buf(),
            workflow: workflow.to_string(),
            branch: current_branch(working_dir),
            started_at: Utc::now(),
            completed_at: None,
        };
        write_json(&dir.join("session.json"), &info)?;

        debug!(session_id = %id, dir = %dir.display(), "Created session");
        self.session_id = Some(id.clone());
        Ok(id)
    }

    pub fn load_info(&self, session_id: &str) -> Result<SessionInfo> {
        read_json(&self.session_dir(session_id).join("session.json"))
    }

    pub fn append_audit_entry(&self, entry: &AuditEntry) -> Result<()> {
        AuditLogger::new(&self.active_dir()?.join("audit.jsonl")).append(entry)
    }

    pub fn audit_entries(&self) -> Result<Vec<AuditEntry>> {
        AuditLogger::new(&self.active_dir()?.join("audit.jsonl")).read_all()
    }

    pub fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        write_json(&self.active_dir()?.join("checkpoint.json"), checkpoint)
    }

    /// `None` when the session has never checkpointed.
    pub fn load_checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.session_dir(session_id).join("checkpoint.json");
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn write_blocker(&self, blocker: &str) -> Result<PathBuf> {
        let path = self.active_dir()?.join("blocker.md");
        fs::write(&path, format!("# Blocker\n\n{}\n", blocker.trim()))
            .with_context(|| format!("Failed to write blocker: {}", path.display()))?;
        Ok(path)
    }

    /// Write `result.json` and stamp the completion time.
    pub fn complete_session(&self, result: &WorkflowResult) -> Result<()> {
        let dir = self.active_dir()?;
        write_json(&dir.join("result.json"), result)?;

        let info_path = dir.join("session.json");
        if info_path.exists() {
            let mut info: SessionInfo = read_json(&info_path)?;
            info.completed_at = Some(Utc::now());
            write_json(&info_path, &info)?;
        }
        Ok(())
    }
}

impl SessionSink for SessionManager {
    fn record_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.append_audit_entry(entry)
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.write_checkpoint(checkpoint)
    }
}

/// Name of the checked-out branch, or `unknown` outside a git repository.
fn current_branch(working_dir: &Path) -> String {
    git2::Repository::discover(working_dir)
        .ok()
        .and_then(|repo| {
            repo.head()
                .ok()
                .and_then(|head| head.shorthand().map(str::to_string))
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize session data")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
