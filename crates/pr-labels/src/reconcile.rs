//! # Size label reconciliation
//!
//! Brings a pull request's `size/*` labels in line with its computed size:
//! exactly one size label, the desired one. Labels are re-read right before
//! mutating; there is no optimistic locking against concurrent edits.

use scm::{PullRequestHost, PullRequestNumber, RepoSlug};
use serde::Serialize;
use tracing::{debug, info};

use crate::diffstat::{compute_size, DiffSummarizer, ExclusionSet, PrChangeStats};
use crate::error::SizeError;
use crate::size::{SizeLabel, SizeRanges};

/// Label changes needed to reach the desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelPlan {
    pub add: Option<String>,
    pub remove: Vec<String>,
}

impl LabelPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.add.is_none() && self.remove.is_empty()
    }
}

/// Work out which size labels to add and remove.
///
/// Nothing changes when `desired` is present and is the only size label.
/// Otherwise `desired` is added (if missing) and every other size label is
/// removed.
#[must_use]
pub fn plan_size_labels(current: &[String], desired: &SizeLabel) -> LabelPlan {
    let size_labels: Vec<&String> = current
        .iter()
        .filter(|l| SizeLabel::is_size_label(l))
        .collect();
    let present = size_labels.iter().any(|l| l.as_str() == desired.as_str());

    if present && size_labels.len() == 1 {
        return LabelPlan::default();
    }

    let mut remove: Vec<String> = size_labels
        .into_iter()
        .filter(|l| l.as_str() != desired.as_str())
        .cloned()
        .collect();
    remove.dedup();

    LabelPlan {
        add: (!present).then(|| desired.to_string()),
        remove,
    }
}

/// Result of a reconcile call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub label: SizeLabel,
    pub plan: LabelPlan,
    /// `false` in dry-run mode or when the plan was empty.
    pub applied: bool,
}

/// Apply the size label plan to a pull request.
///
/// # Errors
/// [`SizeError::Remote`] naming the failing call. Changes already made in
/// this call are not rolled back.
pub async fn reconcile(
    host: &dyn PullRequestHost,
    repo: &RepoSlug,
    pr: PullRequestNumber,
    desired: &SizeLabel,
    dry_run: bool,
) -> Result<ReconcileOutcome, SizeError> {
    let current = host
        .pull_request_labels(repo, pr)
        .await
        .map_err(|source| SizeError::Remote {
            operation: "Fetching pull request labels",
            source,
        })?;

    let plan = plan_size_labels(&current, desired);
    debug!(pr, current = ?current, plan = ?plan, "Planned size label changes");

    if plan.is_noop() {
        info!(pr, label = %desired, "Size label already up to date");
        return Ok(ReconcileOutcome {
            label: desired.clone(),
            plan,
            applied: false,
        });
    }

    if dry_run {
        info!(pr, label = %desired, add = ?plan.add, remove = ?plan.remove, "Dry run, not changing labels");
        return Ok(ReconcileOutcome {
            label: desired.clone(),
            plan,
            applied: false,
        });
    }

    if let Some(label) = &plan.add {
        host.add_labels(repo, pr, std::slice::from_ref(label))
            .await
            .map_err(|source| SizeError::Remote {
                operation: "Adding size label",
                source,
            })?;
    }
    for label in &plan.remove {
        host.remove_label(repo, pr, label)
            .await
            .map_err(|source| SizeError::Remote {
                operation: "Removing stale size label",
                source,
            })?;
    }

    info!(pr, label = %desired, removed = plan.remove.len(), "Size label updated");
    Ok(ReconcileOutcome {
        label: desired.clone(),
        plan,
        applied: true,
    })
}

/// Everything the size labeller learned about one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    pub repo: String,
    pub pr: PullRequestNumber,
    pub stats: PrChangeStats,
    pub size: u64,
    pub outcome: ReconcileOutcome,
}

/// Measure, classify and label a pull request.
///
/// # Errors
/// [`SizeError::NoMatchingBucket`] when the size falls between the configured
/// ranges, plus any failure from [`compute_size`] or [`reconcile`].
pub async fn label_pull_request(
    host: &dyn PullRequestHost,
    repo: &RepoSlug,
    pr: PullRequestNumber,
    ranges: &SizeRanges,
    summarizer: &dyn DiffSummarizer,
    exclusions: &ExclusionSet,
    dry_run: bool,
) -> Result<SizeReport, SizeError> {
    let stats = compute_size(host, repo, pr, summarizer, exclusions).await?;
    let size = stats.total();

    let label = ranges
        .classify(size)
        .ok_or(SizeError::NoMatchingBucket { pr, size })?;
    info!(pr, size, label = %label, "Classified pull request");

    let outcome = reconcile(host, repo, pr, &label, dry_run).await?;
    Ok(SizeReport {
        repo: repo.to_string(),
        pr,
        stats,
        size,
        outcome,
    })
}
