//! Fix phase output: how each review issue was handled.

use serde::{Deserialize, Serialize};

use super::review::Severity;
use super::{PhaseContract, TestResults, require_non_empty};
use crate::errors::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixAction {
    Fixed,
    Disputed,
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOutcome {
    pub issue_description: String,
    pub severity: Severity,
    pub action: FixAction,
    pub explanation: String,
    pub files_modified: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputedIssue {
    pub description: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixResult {
    pub fixes_applied: Vec<FixOutcome>,
    pub test_results: TestResults,
    pub commits: Vec<String>,
    pub disputed_issues: Vec<DisputedIssue>,
}

impl FixResult {
    pub fn fixed_count(&self) -> usize {
        self.fixes_applied
            .iter()
            .filter(|f| f.action == FixAction::Fixed)
            .count()
    }
}

impl PhaseContract for FixResult {
    const NAME: &'static str = "fix";

    fn validate(&self) -> Result<(), WorkflowError> {
        for (i, fix) in self.fixes_applied.iter().enumerate() {
            require_non_empty(
                Self::NAME,
                &format!("fixesApplied[{i}].issueDescription"),
                &fix.issue_description,
            )?;
            require_non_empty(
                Self::NAME,
                &format!("fixesApplied[{i}].explanation"),
                &fix.explanation,
            )?;
        }
        Ok(())
    }
}
