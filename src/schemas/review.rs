//! Review gate output.
//!
//! `hasActionableIssues` is never taken from the agent. It is recomputed from
//! the issue list whenever a [`ReviewResult`] is serialized.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::{PhaseContract, require_non_empty};
use crate::errors::WorkflowError;

/// Issue severity, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed before the work can proceed.
    Critical,
    /// Should be fixed; still blocks approval.
    Important,
    /// Nice to have. Never blocks.
    Minor,
}

impl Severity {
    /// Critical and important issues require a fix.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Critical | Self::Important)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::Important => "important",
            Self::Minor => "minor",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Approved,
    NeedsRevision,
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::NeedsRevision => write!(f, "needs_revision"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub fix_instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found_by: Option<String>,
}

impl ReviewIssue {
    pub fn new(severity: Severity, description: &str, fix_instructions: &str) -> Self {
        Self {
            severity,
            description: description.to_string(),
            file: None,
            line: None,
            fix_instructions: fix_instructions.to_string(),
            found_by: None,
        }
    }

    pub fn with_location(mut self, file: &str, line: u64) -> Self {
        self.file = Some(file.to_string());
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCoverageAssessment {
    pub adequate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Verdict from a single review gate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub assessment: Assessment,
    pub issues: Vec<ReviewIssue>,
    pub strengths: Vec<String>,
    #[serde(default)]
    pub test_coverage: Option<TestCoverageAssessment>,
}

impl ReviewResult {
    pub fn approved() -> Self {
        Self {
            assessment: Assessment::Approved,
            issues: Vec::new(),
            strengths: Vec::new(),
            test_coverage: None,
        }
    }

    pub fn needs_revision(issues: Vec<ReviewIssue>) -> Self {
        Self {
            assessment: Assessment::NeedsRevision,
            issues,
            strengths: Vec::new(),
            test_coverage: None,
        }
    }

    pub fn has_actionable_issues(&self) -> bool {
        self.issues.iter().any(|i| i.severity.is_actionable())
    }
}

impl Serialize for ReviewResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Record<'a> {
            assessment: Assessment,
            issues: &'a [ReviewIssue],
            strengths: &'a [String],
            #[serde(skip_serializing_if = "Option::is_none")]
            test_coverage: Option<&'a TestCoverageAssessment>,
            has_actionable_issues: bool,
        }

        Record {
            assessment: self.assessment,
            issues: &self.issues,
            strengths: &self.strengths,
            test_coverage: self.test_coverage.as_ref(),
            has_actionable_issues: self.has_actionable_issues(),
        }
        .serialize(serializer)
    }
}

impl PhaseContract for ReviewResult {
    const NAME: &'static str = "review";

    fn validate(&self) -> Result<(), WorkflowError> {
        for (i, issue) in self.issues.iter().enumerate() {
            require_non_empty(
                Self::NAME,
                &format!("issues[{i}].description"),
                &issue.description,
            )?;
            require_non_empty(
                Self::NAME,
                &format!("issues[{i}].fixInstructions"),
                &issue.fix_instructions,
            )?;
            if issue.line == Some(0) {
                return Err(WorkflowError::contract(
                    Self::NAME,
                    format!("issues[{i}].line"),
                    "must be a positive integer",
                ));
            }
        }
        Ok(())
    }
}
