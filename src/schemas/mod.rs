//! Phase output contracts.
//!
//! Every agent-driven phase has exactly one accepted output shape. Agent
//! output is untrusted: it is deserialized into a strict struct and then
//! validated field by field, rejecting on the first violation. Nothing is
//! partially accepted.
//!
//! ## Contracts
//!
//! - [`AnalysisResult`]: task breakdown produced by the analyze phase
//! - [`ReviewResult`]: verdict from one review gate
//! - [`ImplementResult`]: per-task implementation report
//! - [`FixResult`]: response to review issues
//! - [`VerifyResult`]: full test-suite and requirement verification
//! - [`PublishResult`]: pull request details

pub mod analysis;
pub mod extract;
pub mod fix;
pub mod implementation;
pub mod publish;
pub mod review;
pub mod verification;

pub use analysis::{AnalysisResult, Complexity, Requirement, TaskDefinition, TechStack};
pub use extract::extract_json_payload;
pub use fix::{DisputedIssue, FixAction, FixOutcome, FixResult};
pub use implementation::{
    FileAction, FileChange, ImplementResult, TddCertification, TddFunctionCert, TestResults,
};
pub use publish::PublishResult;
pub use review::{Assessment, ReviewIssue, ReviewResult, Severity, TestCoverageAssessment};
pub use verification::{RequirementVerification, TestSuiteResults, VerifyResult};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::WorkflowError;

type Result<T> = std::result::Result<T, WorkflowError>;

/// A structural contract for one phase's output.
pub trait PhaseContract: DeserializeOwned + Serialize + Sized {
    /// Contract name used in violation messages.
    const NAME: &'static str;

    /// Field-level checks serde cannot express (non-empty strings, ranges).
    fn validate(&self) -> Result<()>;

    /// Deserialize and validate an untrusted value.
    fn from_value(value: &Value) -> Result<Self> {
        let parsed: Self = serde_json::from_value(value.clone())
            .map_err(|e| WorkflowError::contract(Self::NAME, "$", e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Serialize back into the canonical context representation.
    fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| WorkflowError::contract(Self::NAME, "$", e.to_string()))
    }
}

/// Named output schema selectable from a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSchema {
    Analysis,
    Review,
    Implementation,
    Fix,
    Verification,
    Publish,
}

impl OutputSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Review => "review",
            Self::Implementation => "implementation",
            Self::Fix => "fix",
            Self::Verification => "verification",
            Self::Publish => "publish",
        }
    }

    /// Validate `value` against this schema and return its canonical form.
    ///
    /// The canonical form has defaults filled in and derived fields
    /// recomputed, so what lands in the context never carries values the
    /// agent was not allowed to set.
    pub fn validate(&self, value: &Value) -> Result<Value> {
        match self {
            Self::Analysis => AnalysisResult::from_value(value)?.to_value(),
            Self::Review => ReviewResult::from_value(value)?.to_value(),
            Self::Implementation => ImplementResult::from_value(value)?.to_value(),
            Self::Fix => FixResult::from_value(value)?.to_value(),
            Self::Verification => VerifyResult::from_value(value)?.to_value(),
            Self::Publish => PublishResult::from_value(value)?.to_value(),
        }
    }
}

impl fmt::Display for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputSchema {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "analysis" => Ok(Self::Analysis),
            "review" => Ok(Self::Review),
            "implementation" => Ok(Self::Implementation),
            "fix" => Ok(Self::Fix),
            "verification" => Ok(Self::Verification),
            "publish" => Ok(Self::Publish),
            other => Err(WorkflowError::UnknownSchema {
                name: other.to_string(),
            }),
        }
    }
}

/// Reject empty or whitespace-only strings.
pub(crate) fn require_non_empty(contract: &str, path: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WorkflowError::contract(contract, path, "must not be empty"));
    }
    Ok(())
}
