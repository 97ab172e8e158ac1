//! Publish phase output.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{PhaseContract, require_non_empty};
use crate::errors::WorkflowError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub pr_url: String,
    pub pr_number: u64,
    pub branch_name: String,
    pub commit_count: u64,
    pub summary: String,
}

impl PhaseContract for PublishResult {
    const NAME: &'static str = "publish";

    fn validate(&self) -> Result<(), WorkflowError> {
        Url::parse(&self.pr_url)
            .map_err(|e| WorkflowError::contract(Self::NAME, "prUrl", e.to_string()))?;
        if self.pr_number == 0 {
            return Err(WorkflowError::contract(
                Self::NAME,
                "prNumber",
                "must be a positive integer",
            ));
        }
        require_non_empty(Self::NAME, "branchName", &self.branch_name)?;
        require_non_empty(Self::NAME, "summary", &self.summary)?;
        Ok(())
    }
}
