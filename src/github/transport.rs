//! Wire layer for the GitHub pull-request API.
//!
//! [`PullRequestTransport`] makes exactly one HTTP call per method and maps
//! failures onto [`GitHubError`]. Retrying is the client's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::GitHubError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    /// Feature branch.
    pub head: String,
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatePullRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PullRequestState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiBranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// Pull request as returned by the REST API (fields we use).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiPullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub head: ApiBranchRef,
    pub base: ApiBranchRef,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiComment {
    pub id: u64,
    pub html_url: String,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: String,
}

/// Abstraction over the code-host API for testability.
/// Real implementation: `RestTransport`.
#[async_trait]
pub trait PullRequestTransport: Send + Sync {
    async fn create_pull(&self, request: &CreatePullRequest)
    -> Result<ApiPullRequest, GitHubError>;

    async fn update_pull(
        &self,
        number: u64,
        request: &UpdatePullRequest,
    ) -> Result<ApiPullRequest, GitHubError>;

    async fn get_pull(&self, number: u64) -> Result<ApiPullRequest, GitHubError>;

    async fn create_comment(&self, number: u64, body: &str) -> Result<ApiComment, GitHubError>;
}

/// reqwest-backed transport for `api.github.com`.
#[derive(Debug, Clone)]
pub struct RestTransport {
    http: Client,
    token: String,
    owner: String,
    repo: String,
    api_base: String,
}

impl RestTransport {
    pub fn new(token: &str, owner: &str, repo: &str) -> Self {
        Self {
            http: Client::new(),
            token: token.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point at a GitHub Enterprise or test server.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        pr_number: Option<u64>,
    ) -> Result<T, GitHubError> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "wrangler-workflow")
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return response.json::<T>().await.map_err(|e| GitHubError::Api {
                status,
                message: format!("Failed to parse response: {}", e),
            });
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status, &headers, &body, pr_number))
    }
}

#[async_trait]
impl PullRequestTransport for RestTransport {
    async fn create_pull(
        &self,
        request: &CreatePullRequest,
    ) -> Result<ApiPullRequest, GitHubError> {
        let builder = self.http.post(self.repo_url("pulls")).json(request);
        self.send(builder, None).await
    }

    async fn update_pull(
        &self,
        number: u64,
        request: &UpdatePullRequest,
    ) -> Result<ApiPullRequest, GitHubError> {
        let builder = self
            .http
            .patch(self.repo_url(&format!("pulls/{}", number)))
            .json(request);
        self.send(builder, Some(number)).await
    }

    async fn get_pull(&self, number: u64) -> Result<ApiPullRequest, GitHubError> {
        let builder = self.http.get(self.repo_url(&format!("pulls/{}", number)));
        self.send(builder, Some(number)).await
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<ApiComment, GitHubError> {
        let builder = self
            .http
            .post(self.repo_url(&format!("issues/{}/comments", number)))
            .json(&json!({ "body": body }));
        self.send(builder, Some(number)).await
    }
}

/// Map a non-success response onto a [`GitHubError`].
///
/// 429, and 403 with `x-ratelimit-remaining: 0`, are rate limits; the reset
/// time comes from `x-ratelimit-reset` (epoch seconds).
pub fn classify_error(
    status: u16,
    headers: &HeaderMap,
    body: &str,
    pr_number: Option<u64>,
) -> GitHubError {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    let exhausted = header("x-ratelimit-remaining") == Some("0");
    if status == 429 || (status == 403 && exhausted) {
        let reset_at = header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        return GitHubError::RateLimited { reset_at, message };
    }

    if status == 404
        && let Some(number) = pr_number
    {
        return GitHubError::NotFound { number };
    }

    GitHubError::Api { status, message }
}
