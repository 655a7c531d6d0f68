//! Repository identifiers and git remote detection.

use std::fmt;
use std::process::Stdio;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::ScmError;

/// Pull request number as assigned by the code host.
pub type PullRequestNumber = u64;

/// A repository in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    /// Create a slug from its two parts.
    ///
    /// # Errors
    /// Returns [`ScmError::InvalidRepository`] if either part is empty or
    /// contains a `/`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, ScmError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(ScmError::InvalidRepository(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse the slug out of a git remote URL.
    ///
    /// Accepts `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo` and
    /// scp-style `git@host:owner/repo(.git)`.
    ///
    /// # Errors
    /// Returns [`ScmError::InvalidRepository`] when no `owner/repo` path can be
    /// extracted.
    pub fn from_remote_url(url: &str) -> Result<Self, ScmError> {
        let url = url.trim();
        let path = if let Some((_, rest)) = url.split_once("://") {
            rest.split_once('/').map(|(_, path)| path)
        } else if let Some((_, path)) = url.split_once(':') {
            Some(path)
        } else {
            None
        }
        .ok_or_else(|| ScmError::InvalidRepository(url.to_string()))?;

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let mut parts = path.rsplitn(2, '/');
        let name = parts.next().unwrap_or_default();
        let owner = parts
            .next()
            .and_then(|prefix| prefix.rsplit('/').next())
            .unwrap_or_default();

        Self::new(owner, name).map_err(|_| ScmError::InvalidRepository(url.to_string()))
    }
}

impl FromStr for RepoSlug {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ScmError::InvalidRepository(s.to_string()))?;
        Self::new(owner, name).map_err(|_| ScmError::InvalidRepository(s.to_string()))
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Resolve the repository of the current checkout from its `origin` remote.
///
/// # Errors
/// Returns [`ScmError::NotARepository`] if `git` is unavailable, the directory
/// is not a checkout, or the remote URL cannot be parsed.
pub async fn detect_origin_repo() -> Result<RepoSlug, ScmError> {
    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ScmError::NotARepository(format!("failed to execute git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScmError::NotARepository(stderr.trim().to_string()));
    }

    let url = String::from_utf8_lossy(&output.stdout);
    debug!(remote = %url.trim(), "Resolved origin remote");
    RepoSlug::from_remote_url(&url).map_err(|e| ScmError::NotARepository(e.to_string()))
}
