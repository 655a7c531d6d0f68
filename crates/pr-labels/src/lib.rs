//! # Pull request label tools
//!
//! Library behind two CI gate binaries:
//!
//! - **`pr-size-label`** measures a pull request's diff (excluding vendored and
//!   generated files), maps the size to a `size/<bucket>` label and reconciles
//!   the PR's labels so exactly that size label is present.
//! - **`porting-label-check`** fails unless a pull request carries a complete,
//!   unambiguous set of backport and forward-port labels.
//!
//! Both talk to the code host through [`scm::PullRequestHost`], so the policy
//! code here is tested against an in-memory host.
//!
//! ## Example
//!
//! ```no_run
//! use pr_labels::{label_pull_request, BuiltinDiffstat, ExclusionSet, SizeRanges};
//! use scm::GitHubClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GitHubClient::new(std::env::var("GITHUB_TOKEN")?)?;
//! let repo = "5dlabs/cto".parse()?;
//! let report = label_pull_request(
//!     &client,
//!     &repo,
//!     2622,
//!     &SizeRanges::defaults(),
//!     &BuiltinDiffstat,
//!     &ExclusionSet::with_defaults(Vec::<String>::new())?,
//!     true,
//! )
//! .await?;
//! println!("{} ({} lines)", report.outcome.label, report.size);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod diffstat;
pub mod error;
pub mod porting;
pub mod reconcile;
pub mod size;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use diffstat::{
    compute_size, filter_diff, parse_summary, BuiltinDiffstat, DiffStat, DiffSummarizer,
    ExclusionSet, ExternalDiffstat, FileStat, PrChangeStats, DEFAULT_EXCLUSIONS,
};
pub use error::{ConfigError, DiffStatError, PortingError, SizeError};
pub use porting::{
    evaluate, missing_repository_labels, validate_pull_request, PortingGroup, PortingVerdict,
    PortingViolation,
};
pub use reconcile::{
    label_pull_request, plan_size_labels, reconcile, LabelPlan, ReconcileOutcome, SizeReport,
};
pub use size::{RangeBound, RangeMode, SizeBucket, SizeLabel, SizeRanges, SIZE_LABEL_PREFIX};
