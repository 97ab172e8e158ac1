//! Persistence of checkpoints and audit entries.
//!
//! The engine itself never touches the filesystem. It emits through a
//! [`SessionSink`]; [`SessionManager`] is the file-backed implementation used
//! by the CLI.

mod store;

pub use store::{SessionInfo, SessionManager};

use anyhow::Result;

use crate::audit::AuditEntry;
use crate::workflow::Checkpoint;

/// Receiver for audit entries and checkpoints. Both default to no-ops.
pub trait SessionSink: Send + Sync {
    fn record_audit(&self, _entry: &AuditEntry) -> Result<()> {
        Ok(())
    }

    fn save_checkpoint(&self, _checkpoint: &Checkpoint) -> Result<()> {
        Ok(())
    }
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SessionSink for NullSink {}
