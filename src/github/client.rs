//! Retrying pull-request client.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::transport::{
    ApiComment, ApiPullRequest, CreatePullRequest, PullRequestTransport, RestTransport,
    UpdatePullRequest,
};
use crate::errors::GitHubError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Normalized pull request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub title: String,
    pub body: Option<String>,
    /// Head branch name.
    pub head: String,
    /// Base branch name.
    pub base: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ApiPullRequest> for PullRequest {
    fn from(pr: ApiPullRequest) -> Self {
        Self {
            number: pr.number,
            url: pr.html_url,
            title: pr.title,
            body: pr.body,
            head: pr.head.ref_name,
            base: pr.base.ref_name,
            state: pr.state,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub url: String,
    pub body: String,
    pub created_at: String,
}

impl From<ApiComment> for Comment {
    fn from(comment: ApiComment) -> Self {
        Self {
            id: comment.id,
            url: comment.html_url,
            body: comment.body.unwrap_or_default(),
            created_at: comment.created_at,
        }
    }
}

/// Pull-request operations with bounded retries.
///
/// Transient failures (rate limits, network errors, 5xx) are retried up to
/// three attempts in total. A rate limit waits until its reset time; other
/// failures back off exponentially from the base delay.
pub struct GitHubClient<T = RestTransport> {
    transport: T,
    max_attempts: u32,
    base_delay: Duration,
}

impl GitHubClient<RestTransport> {
    pub fn new(token: &str, owner: &str, repo: &str) -> Result<Self, GitHubError> {
        if token.trim().is_empty() {
            return Err(GitHubError::InvalidConfig("GitHub token is required".into()));
        }
        if owner.trim().is_empty() {
            return Err(GitHubError::InvalidConfig(
                "Repository owner is required".into(),
            ));
        }
        if repo.trim().is_empty() {
            return Err(GitHubError::InvalidConfig("Repository name is required".into()));
        }
        Ok(Self::with_transport(RestTransport::new(token, owner, repo)))
    }
}

impl<T: PullRequestTransport> GitHubClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn create_pr(&self, params: &CreatePullRequest) -> Result<PullRequest, GitHubError> {
        self.with_retry("create_pr", || self.transport.create_pull(params))
            .await
            .map(PullRequest::from)
    }

    pub async fn update_pr(
        &self,
        number: u64,
        params: &UpdatePullRequest,
    ) -> Result<PullRequest, GitHubError> {
        self.with_retry("update_pr", || self.transport.update_pull(number, params))
            .await
            .map(PullRequest::from)
    }

    /// Fails with [`GitHubError::NotFound`] when the PR does not exist.
    pub async fn get_pr(&self, number: u64) -> Result<PullRequest, GitHubError> {
        self.with_retry("get_pr", || self.transport.get_pull(number))
            .await
            .map(PullRequest::from)
    }

    pub async fn add_comment(&self, number: u64, body: &str) -> Result<Comment, GitHubError> {
        self.with_retry("add_comment", || self.transport.create_comment(number, body))
            .await
            .map(Comment::from)
    }

    /// Current PR body, empty when the PR has none.
    pub async fn get_pr_description(&self, number: u64) -> Result<String, GitHubError> {
        Ok(self.get_pr(number).await?.body.unwrap_or_default())
    }

    pub async fn update_pr_description(
        &self,
        number: u64,
        body: &str,
    ) -> Result<PullRequest, GitHubError> {
        let params = UpdatePullRequest {
            body: Some(body.to_string()),
            ..Default::default()
        };
        self.update_pr(number, &params).await
    }

    async fn with_retry<R, F, Fut>(&self, operation: &str, mut call: F) -> Result<R, GitHubError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, GitHubError>>,
    {
        let mut last_error = GitHubError::Network("No attempts made".to_string());

        for attempt in 1..=self.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() {
                        debug!(operation, error = %error, "GitHub request failed permanently");
                        return Err(error);
                    }
                    last_error = error;

                    if attempt >= self.max_attempts {
                        break;
                    }

                    let delay = retry_delay(&last_error, self.base_delay, attempt);
                    let delay_ms: u64 = delay.as_millis().try_into().unwrap_or(u64::MAX);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms,
                        error = %last_error,
                        "GitHub request failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(GitHubError::RetriesExhausted {
            attempts: self.max_attempts,
            last: last_error.to_string(),
        })
    }
}

/// Wait before the next attempt. `attempt` is 1-based.
pub fn retry_delay(error: &GitHubError, base_delay: Duration, attempt: u32) -> Duration {
    if let GitHubError::RateLimited {
        reset_at: Some(reset_at),
        ..
    } = error
    {
        return (*reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    }
    backoff_delay(base_delay, attempt)
}

/// `base * 2^(attempt - 1)`
pub fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base_delay.saturating_mul(1 << exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::transport::ApiBranchRef;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn api_pr(number: u64, body: Option<&str>) -> ApiPullRequest {
        ApiPullRequest {
            number,
            html_url: format!("https://github.com/acme/widgets/pull/{}", number),
            title: "Add parser".into(),
            body: body.map(str::to_string),
            head: ApiBranchRef {
                ref_name: "feature/parser".into(),
            },
            base: ApiBranchRef {
                ref_name: "main".into(),
            },
            state: "open".into(),
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-02T00:00:00Z".into(),
        }
    }

    /// Fails `failures` times with `error`, then succeeds.
    struct FlakyTransport {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> GitHubError,
        updates: Mutex<Vec<UpdatePullRequest>>,
    }

    impl FlakyTransport {
        fn new(failures: usize, error: fn() -> GitHubError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error,
                updates: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn next(&self) -> Result<(), GitHubError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PullRequestTransport for FlakyTransport {
        async fn create_pull(
            &self,
            request: &CreatePullRequest,
        ) -> Result<ApiPullRequest, GitHubError> {
            self.next()?;
            let mut pr = api_pr(1, Some(&request.body));
            pr.title = request.title.clone();
            Ok(pr)
        }

        async fn update_pull(
            &self,
            number: u64,
            request: &UpdatePullRequest,
        ) -> Result<ApiPullRequest, GitHubError> {
            self.next()?;
            self.updates.lock().unwrap().push(request.clone());
            Ok(api_pr(number, request.body.as_deref()))
        }

        async fn get_pull(&self, number: u64) -> Result<ApiPullRequest, GitHubError> {
            self.next()?;
            Ok(api_pr(number, None))
        }

        async fn create_comment(
            &self,
            number: u64,
            body: &str,
        ) -> Result<ApiComment, GitHubError> {
            self.next()?;
            Ok(ApiComment {
                id: 99,
                html_url: format!(
                    "https://github.com/acme/widgets/pull/{}#issuecomment-99",
                    number
                ),
                body: Some(body.to_string()),
                created_at: "2025-01-03T00:00:00Z".into(),
            })
        }
    }

    fn network() -> GitHubError {
        GitHubError::Network("connection reset".into())
    }

    fn client(transport: FlakyTransport) -> GitHubClient<FlakyTransport> {
        GitHubClient::with_transport(transport).with_base_delay(Duration::ZERO)
    }

    #[test]
    fn test_new_requires_token_owner_repo() {
        let err = GitHubClient::new("", "acme", "widgets").err().unwrap();
        assert_eq!(err.to_string(), "GitHub token is required");
        let err = GitHubClient::new("t", " ", "widgets").err().unwrap();
        assert_eq!(err.to_string(), "Repository owner is required");
        let err = GitHubClient::new("t", "acme", "").err().unwrap();
        assert_eq!(err.to_string(), "Repository name is required");
        assert!(GitHubClient::new("t", "acme", "widgets").is_ok());
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let client = client(FlakyTransport::new(2, network));
        let pr = client.get_pr(5).await.unwrap();
        assert_eq!(pr.number, 5);
        assert_eq!(client.transport().calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_three_attempts() {
        let client = client(FlakyTransport::new(usize::MAX, network));
        let err = client.get_pr(5).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed after 3 attempts: Network error talking to GitHub: connection reset"
        );
        assert_eq!(client.transport().calls(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let client = client(FlakyTransport::new(usize::MAX, || GitHubError::NotFound {
            number: 5,
        }));
        let err = client.get_pr(5).await.unwrap_err();
        assert!(matches!(err, GitHubError::NotFound { number: 5 }));
        assert_eq!(err.to_string(), "Pull request #5 not found");
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_with_past_reset_retries_immediately() {
        let client = client(FlakyTransport::new(1, || GitHubError::RateLimited {
            reset_at: Some(Utc::now() - chrono::Duration::seconds(5)),
            message: "API rate limit exceeded".into(),
        }));
        let comment = client.add_comment(3, "Looks good").await.unwrap();
        assert_eq!(comment.body, "Looks good");
        assert_eq!(comment.id, 99);
        assert_eq!(client.transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_create_pr_normalizes_fields() {
        let client = client(FlakyTransport::new(0, network));
        let pr = client
            .create_pr(&CreatePullRequest {
                title: "Add parser".into(),
                body: "Implements the parser".into(),
                head: "feature/parser".into(),
                base: "main".into(),
                draft: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(pr.url, "https://github.com/acme/widgets/pull/1");
        assert_eq!(pr.head, "feature/parser");
        assert_eq!(pr.base, "main");
        assert_eq!(pr.body.as_deref(), Some("Implements the parser"));
    }

    #[tokio::test]
    async fn test_update_description_sends_only_body() {
        let client = client(FlakyTransport::new(0, network));
        client.update_pr_description(8, "new body").await.unwrap();
        let updates = client.transport().updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].body.as_deref(), Some("new body"));
        assert!(updates[0].title.is_none());
        assert!(updates[0].state.is_none());
    }

    #[tokio::test]
    async fn test_missing_body_reads_as_empty_description() {
        let client = client(FlakyTransport::new(0, network));
        assert_eq!(client.get_pr_description(2).await.unwrap(), "");
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
    }

    #[test]
    fn test_rate_limit_delay_waits_until_reset() {
        let reset_at = Utc::now() + chrono::Duration::seconds(30);
        let delay = retry_delay(
            &GitHubError::RateLimited {
                reset_at: Some(reset_at),
                message: String::new(),
            },
            Duration::from_millis(1000),
            1,
        );
        assert!(delay > Duration::from_secs(25));
        assert!(delay <= Duration::from_secs(30));
    }

    #[test]
    fn test_rate_limit_without_reset_falls_back_to_backoff() {
        let delay = retry_delay(
            &GitHubError::RateLimited {
                reset_at: None,
                message: String::new(),
            },
            Duration::from_millis(10),
            2,
        );
        assert_eq!(delay, Duration::from_millis(20));
    }
}
