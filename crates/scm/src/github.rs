//! # GitHub REST client
//!
//! Implements [`PullRequestHost`] against the GitHub REST API. Requests are
//! issued once; rate-limit responses are reported, not waited out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::ScmError;
use crate::host::PullRequestHost;
use crate::repo::{PullRequestNumber, RepoSlug};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "pr-labels/1.0";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: usize = 100;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_DIFF: &str = "application/vnd.github.v3.diff";

/// GitHub API client for pull request labels and diffs.
#[derive(Clone)]
pub struct GitHubClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GitHubError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

impl GitHubClient {
    /// Create a client for the public GitHub API.
    ///
    /// # Errors
    /// Returns [`ScmError::MissingToken`] for an empty token, or an HTTP error
    /// if the client cannot be built.
    pub fn new(token: impl Into<String>) -> Result<Self, ScmError> {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    /// Create a client for a specific API root (GitHub Enterprise or a test server).
    ///
    /// # Errors
    /// Returns [`ScmError::MissingToken`] for an empty token, or an HTTP error
    /// if the client cannot be built.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ScmError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ScmError::MissingToken);
        }

        let http_client = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str, accept: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, url = %url, "GitHub request");
        self.http_client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Turn non-success responses into errors.
    async fn check(response: Response) -> Result<Response, ScmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(reset_in) = rate_limit_reset(&response) {
                return Err(ScmError::RateLimited { reset_in });
            }
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubError>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        Err(ScmError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Fetch every page of a label listing.
    async fn list_labels(&self, path: &str) -> Result<Vec<String>, ScmError> {
        let mut labels = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .request(
                    Method::GET,
                    &format!("{path}?per_page={PAGE_SIZE}&page={page}"),
                    ACCEPT_JSON,
                )
                .send()
                .await?;
            let text = Self::check(response).await?.text().await?;
            let batch: Vec<GitHubLabel> = serde_json::from_str(&text)?;
            let count = batch.len();
            labels.extend(batch.into_iter().map(|label| label.name));

            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(labels)
    }
}

#[async_trait]
impl PullRequestHost for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo, pr = pr))]
    async fn pull_request_diff(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
    ) -> Result<String, ScmError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{}/{}/pulls/{pr}", repo.owner(), repo.name()),
                ACCEPT_DIFF,
            )
            .send()
            .await?;
        let diff = Self::check(response).await?.text().await?;
        debug!(bytes = diff.len(), "Fetched pull request diff");
        Ok(diff)
    }

    #[instrument(skip(self), fields(repo = %repo, pr = pr))]
    async fn pull_request_labels(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
    ) -> Result<Vec<String>, ScmError> {
        let labels = self
            .list_labels(&format!(
                "/repos/{}/{}/issues/{pr}/labels",
                repo.owner(),
                repo.name()
            ))
            .await?;
        debug!("Retrieved {} labels for PR #{}", labels.len(), pr);
        Ok(labels)
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn repository_labels(&self, repo: &RepoSlug) -> Result<Vec<String>, ScmError> {
        let labels = self
            .list_labels(&format!("/repos/{}/{}/labels", repo.owner(), repo.name()))
            .await?;
        debug!("Retrieved {} labels for {}", labels.len(), repo);
        Ok(labels)
    }

    #[instrument(skip(self), fields(repo = %repo, pr = pr, labels = ?labels))]
    async fn add_labels(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
        labels: &[String],
    ) -> Result<(), ScmError> {
        if labels.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({ "labels": labels });
        let response = self
            .request(
                Method::POST,
                &format!("/repos/{}/{}/issues/{pr}/labels", repo.owner(), repo.name()),
                ACCEPT_JSON,
            )
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        info!("Added {} labels to PR #{}", labels.len(), pr);
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo, pr = pr, label = %label))]
    async fn remove_label(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
        label: &str,
    ) -> Result<(), ScmError> {
        let response = self
            .request(
                Method::DELETE,
                &format!(
                    "/repos/{}/{}/issues/{pr}/labels/{}",
                    repo.owner(),
                    repo.name(),
                    urlencoding::encode(label)
                ),
                ACCEPT_JSON,
            )
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Label '{}' not found on PR #{} (already removed)", label, pr);
            return Ok(());
        }
        Self::check(response).await?;

        info!("Removed label '{}' from PR #{}", label, pr);
        Ok(())
    }
}

/// Time until the rate limit resets, if the response says it is exhausted.
fn rate_limit_reset(response: &Response) -> Option<Duration> {
    let headers = response.headers();
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    if remaining != Some(0) {
        return None;
    }

    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    Some(Duration::from_secs(reset.saturating_sub(now)))
}
