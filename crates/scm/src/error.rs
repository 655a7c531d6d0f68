//! Error types for code-hosting operations.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a [`crate::PullRequestHost`].
#[derive(Debug, Error)]
pub enum ScmError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The API refused the request because the rate limit is exhausted.
    #[error("Rate limit exceeded, reset in {reset_in:?}")]
    RateLimited { reset_in: Duration },

    /// No access token was supplied.
    #[error("Missing GitHub token (set GITHUB_TOKEN or pass --token)")]
    MissingToken,

    /// A repository slug could not be parsed.
    #[error("Invalid repository '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The current directory is not a git checkout with a usable remote.
    #[error("Not inside a git checkout with an 'origin' remote: {0}")]
    NotARepository(String),

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
