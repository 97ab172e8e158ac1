//! Implementation phase output.

use serde::{Deserialize, Serialize};

use super::{PhaseContract, require_non_empty};
use crate::errors::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: String,
    pub action: FileAction,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// Test run summary. `exit_code` is signed; counts are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub exit_code: i64,
}

impl TestResults {
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TddFunctionCert {
    pub name: String,
    pub test_file: String,
    pub watched_fail: bool,
    pub watched_pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TddCertification {
    pub functions: Vec<TddFunctionCert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementResult {
    pub files_changed: Vec<FileChange>,
    pub test_results: TestResults,
    pub tdd_certification: TddCertification,
    pub commits: Vec<String>,
}

impl PhaseContract for ImplementResult {
    const NAME: &'static str = "implementation";

    fn validate(&self) -> Result<(), WorkflowError> {
        for (i, change) in self.files_changed.iter().enumerate() {
            require_non_empty(Self::NAME, &format!("filesChanged[{i}].path"), &change.path)?;
        }
        for (i, cert) in self.tdd_certification.functions.iter().enumerate() {
            require_non_empty(
                Self::NAME,
                &format!("tddCertification.functions[{i}].name"),
                &cert.name,
            )?;
            require_non_empty(
                Self::NAME,
                &format!("tddCertification.functions[{i}].testFile"),
                &cert.test_file,
            )?;
        }
        Ok(())
    }
}
