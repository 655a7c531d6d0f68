//! Code-hosting access for pull request label tooling.
//!
//! The [`PullRequestHost`] trait is the seam between label policy and the
//! network: policy code is written against the trait, and [`GitHubClient`]
//! implements it over the GitHub REST API.
//!
//! # Example
//!
//! ```no_run
//! use scm::{GitHubClient, PullRequestHost, RepoSlug};
//!
//! # async fn example() -> Result<(), scm::ScmError> {
//! let client = GitHubClient::new(std::env::var("GITHUB_TOKEN").unwrap_or_default())?;
//! let repo: RepoSlug = "5dlabs/cto".parse()?;
//! let labels = client.pull_request_labels(&repo, 2622).await?;
//! println!("{labels:?}");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod github;
pub mod host;
pub mod repo;

pub use error::ScmError;
pub use github::{GitHubClient, DEFAULT_API_URL};
pub use host::PullRequestHost;
pub use repo::{detect_origin_repo, PullRequestNumber, RepoSlug};
