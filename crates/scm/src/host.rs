//! The code-hosting port used by the label tools.

use async_trait::async_trait;

use crate::error::ScmError;
use crate::repo::{PullRequestNumber, RepoSlug};

/// Read and write access to pull request diffs and labels.
///
/// Every call is a single request with no retry; callers treat any error as
/// fatal.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Fetch the unified diff of a pull request.
    async fn pull_request_diff(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
    ) -> Result<String, ScmError>;

    /// Fetch the names of the labels currently on a pull request.
    async fn pull_request_labels(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
    ) -> Result<Vec<String>, ScmError>;

    /// List every label defined in the repository.
    async fn repository_labels(&self, repo: &RepoSlug) -> Result<Vec<String>, ScmError>;

    /// Add labels to a pull request. Existing labels are kept.
    async fn add_labels(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
        labels: &[String],
    ) -> Result<(), ScmError>;

    /// Remove one label from a pull request. Removing an absent label succeeds.
    async fn remove_label(
        &self,
        repo: &RepoSlug,
        pr: PullRequestNumber,
        label: &str,
    ) -> Result<(), ScmError>;
}
