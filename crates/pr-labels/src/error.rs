//! Error types for the label tools.

use scm::{PullRequestNumber, ScmError};
use thiserror::Error;

use crate::porting::PortingViolation;

/// Invalid configuration, detected before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A size range string is not `<max`, `min-max` or `>min`.
    #[error("Invalid range '{value}' for {bucket}: expected '<max', 'min-max' or '>min'")]
    InvalidRange { bucket: String, value: String },

    /// A `min-max` range has its bounds the wrong way round.
    #[error("Invalid range '{value}' for {bucket}: minimum {min} is greater than maximum {max}")]
    InvertedRange {
        bucket: String,
        value: String,
        min: u64,
        max: u64,
    },

    /// An exclusion pattern is not a valid glob.
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Failures while computing diff statistics.
#[derive(Debug, Error)]
pub enum DiffStatError {
    /// A required external tool is not installed.
    #[error("Required tool '{0}' was not found in PATH")]
    ToolMissing(String),

    /// An external tool could not be run or exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// The tool's summary output could not be read.
    #[error("Unrecognised diffstat summary: '{0}'")]
    UnrecognisedSummary(String),
}

/// Failures of the size labelling flow.
#[derive(Debug, Error)]
pub enum SizeError {
    /// The computed size fell into no configured bucket.
    #[error("PR #{pr} has size {size}, which matches no configured size range")]
    NoMatchingBucket { pr: PullRequestNumber, size: u64 },

    #[error("Failed to compute diff statistics: {0}")]
    DiffStat(#[from] DiffStatError),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: ScmError,
    },
}

/// Failures of the porting label check.
#[derive(Debug, Error)]
pub enum PortingError {
    /// Required porting labels are not defined in the repository at all.
    #[error("Repository {repo} is missing required labels: {}", missing.join(", "))]
    MissingRepositoryLabels { repo: String, missing: Vec<String> },

    /// The pull request's labels break the porting policy.
    #[error(transparent)]
    Violation(#[from] PortingViolation),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: ScmError,
    },
}
