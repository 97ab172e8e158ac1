//! GitHub pull-request client used by the publish phase.
//!
//! - `transport`: one HTTP call per operation, status mapping
//! - `client`: retries and normalized records
//! - `description`: section-aware description merges

pub mod client;
pub mod description;
pub mod transport;

pub use client::{Comment, GitHubClient, PullRequest};
pub use description::{
    DescriptionUpdate, MergeStrategy, merge_description, merge_sections, update_pr_description,
};
pub use transport::{
    CreatePullRequest, PullRequestState, PullRequestTransport, RestTransport, UpdatePullRequest,
};
