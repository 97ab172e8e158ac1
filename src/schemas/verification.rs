//! Verification phase output.

use serde::{Deserialize, Serialize};

use super::{PhaseContract, require_non_empty};
use crate::errors::WorkflowError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteResults {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub exit_code: i64,
    /// Line coverage percentage, when the test framework reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementVerification {
    pub id: String,
    pub description: String,
    pub met: bool,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub test_suite: TestSuiteResults,
    pub requirements: Vec<RequirementVerification>,
    pub git_clean: bool,
}

impl VerifyResult {
    pub fn unmet(&self) -> impl Iterator<Item = &RequirementVerification> {
        self.requirements.iter().filter(|r| !r.met)
    }
}

impl PhaseContract for VerifyResult {
    const NAME: &'static str = "verification";

    fn validate(&self) -> Result<(), WorkflowError> {
        if let Some(coverage) = self.test_suite.coverage
            && !(0.0..=100.0).contains(&coverage)
        {
            return Err(WorkflowError::contract(
                Self::NAME,
                "testSuite.coverage",
                format!("{coverage} is outside 0..=100"),
            ));
        }
        for (i, req) in self.requirements.iter().enumerate() {
            require_non_empty(Self::NAME, &format!("requirements[{i}].id"), &req.id)?;
            require_non_empty(
                Self::NAME,
                &format!("requirements[{i}].description"),
                &req.description,
            )?;
            require_non_empty(
                Self::NAME,
                &format!("requirements[{i}].evidence"),
                &req.evidence,
            )?;
        }
        Ok(())
    }
}
