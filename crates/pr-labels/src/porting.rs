//! # Porting label policy
//!
//! Every mergeable pull request must state whether it needs porting to older
//! branches (backport) and to newer branches (forward port):
//!
//! - **Backport group**: `needs-backport`, `no-backport-needed`, `backport`
//! - **Forward-port group**: `needs-forward-port`, `no-forward-port-needed`, `forward-port`
//! - **Ignore group**: `do-not-merge`, `rfc`, `wip` (exempts the PR entirely)
//!
//! A PR carrying exactly `backport` from its group *is* a backport and must
//! not carry forward-port labels; a PR carrying exactly `forward-port` *is* a
//! forward port and must not carry backport labels. Every other PR needs
//! exactly one label from each group.

use scm::{PullRequestHost, PullRequestNumber, RepoSlug};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::PortingError;
use crate::workflow::Level;

pub const BACKPORT_LABELS: [&str; 3] = ["needs-backport", "no-backport-needed", "backport"];
pub const FORWARD_PORT_LABELS: [&str; 3] =
    ["needs-forward-port", "no-forward-port-needed", "forward-port"];
pub const IGNORE_LABELS: [&str; 3] = ["do-not-merge", "rfc", "wip"];

const BACKPORT: &str = "backport";
const FORWARD_PORT: &str = "forward-port";

/// The three label families the policy looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortingGroup {
    Backport,
    ForwardPort,
    Ignore,
}

impl PortingGroup {
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Backport => &BACKPORT_LABELS,
            Self::ForwardPort => &FORWARD_PORT_LABELS,
            Self::Ignore => &IGNORE_LABELS,
        }
    }

    /// Whether the repository must define this group's labels.
    #[must_use]
    pub const fn required(self) -> bool {
        !matches!(self, Self::Ignore)
    }

    /// Labels from `labels` that belong to this group, in input order.
    #[must_use]
    pub fn hits(self, labels: &[String]) -> Vec<String> {
        labels
            .iter()
            .filter(|l| self.labels().contains(&l.as_str()))
            .cloned()
            .collect()
    }
}

/// A pull request's labels break the porting policy.
///
/// Variants are listed in the order the rules are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum PortingViolation {
    #[error(
        "PR #{pr} is missing required porting labels: add one of [{}] and one of [{}]",
        BACKPORT_LABELS.join(", "),
        FORWARD_PORT_LABELS.join(", ")
    )]
    NoLabels { pr: PullRequestNumber },

    #[error("PR #{pr} is missing a backport label: add one of [{}]", BACKPORT_LABELS.join(", "))]
    MissingBackport { pr: PullRequestNumber },

    #[error(
        "Forward port labelled PR #{pr} cannot have backport labels (found: {})",
        .found.join(", ")
    )]
    ForwardPortWithBackport {
        pr: PullRequestNumber,
        found: Vec<String>,
    },

    #[error(
        "PR #{pr} has ambiguous backport labels ({}): use exactly one of [{}]",
        .found.join(", "),
        BACKPORT_LABELS.join(", ")
    )]
    AmbiguousBackport {
        pr: PullRequestNumber,
        found: Vec<String>,
    },

    #[error(
        "PR #{pr} is missing a forward port label: add one of [{}]",
        FORWARD_PORT_LABELS.join(", ")
    )]
    MissingForwardPort { pr: PullRequestNumber },

    #[error(
        "Backport labelled PR #{pr} cannot have forward port labels (found: {})",
        .found.join(", ")
    )]
    BackportWithForwardPort {
        pr: PullRequestNumber,
        found: Vec<String>,
    },

    #[error(
        "PR #{pr} has ambiguous forward port labels ({}): use exactly one of [{}]",
        .found.join(", "),
        FORWARD_PORT_LABELS.join(", ")
    )]
    AmbiguousForwardPort {
        pr: PullRequestNumber,
        found: Vec<String>,
    },

    #[error("PR #{pr} cannot be both a backport and a forward port")]
    Contradictory { pr: PullRequestNumber },
}

/// A passing check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PortingVerdict {
    /// The PR carries an ignore-group label and was not checked.
    Exempt { label: String },
    /// The PR's porting labels are complete and consistent. A forward port
    /// has no backport label and a backport has no forward-port label.
    Resolved {
        backport: Option<String>,
        forward_port: Option<String>,
    },
}

impl PortingVerdict {
    /// Workflow annotation level: exemptions are surfaced as a notice.
    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::Exempt { .. } => Level::Notice,
            Self::Resolved { .. } => Level::Debug,
        }
    }

    /// One-line description of the verdict for `pr`.
    #[must_use]
    pub fn summary(&self, pr: PullRequestNumber) -> String {
        match self {
            Self::Exempt { label } => {
                format!("PR #{pr} is labelled '{label}', skipping porting checks")
            }
            Self::Resolved {
                backport,
                forward_port,
            } => format!(
                "PR #{pr} porting labels OK (backport: {}, forward port: {})",
                backport.as_deref().unwrap_or("none"),
                forward_port.as_deref().unwrap_or("none")
            ),
        }
    }
}

/// Required porting labels that `defined` lacks.
#[must_use]
pub fn missing_repository_labels(defined: &[String]) -> Vec<String> {
    [PortingGroup::Backport, PortingGroup::ForwardPort, PortingGroup::Ignore]
        .into_iter()
        .filter(|group| group.required())
        .flat_map(PortingGroup::labels)
        .filter(|name| !defined.iter().any(|d| d == *name))
        .map(|name| (*name).to_string())
        .collect()
}

/// Apply the porting policy to one pull request's labels.
///
/// # Errors
/// The first [`PortingViolation`] found, checked in declaration order.
pub fn evaluate(
    pr: PullRequestNumber,
    labels: &[String],
) -> Result<PortingVerdict, PortingViolation> {
    if labels.is_empty() {
        return Err(PortingViolation::NoLabels { pr });
    }

    if let Some(label) = PortingGroup::Ignore.hits(labels).into_iter().next() {
        debug!(pr, label = %label, "PR exempt from porting checks");
        return Ok(PortingVerdict::Exempt { label });
    }

    let backports = PortingGroup::Backport.hits(labels);
    let forward_ports = PortingGroup::ForwardPort.hits(labels);
    let is_backport = backports.len() == 1 && backports[0] == BACKPORT;
    let is_forward_port = forward_ports.len() == 1 && forward_ports[0] == FORWARD_PORT;
    debug!(
        pr,
        backports = ?backports,
        forward_ports = ?forward_ports,
        is_backport,
        is_forward_port,
        "Partitioned porting labels"
    );

    if !is_forward_port && backports.is_empty() {
        return Err(PortingViolation::MissingBackport { pr });
    }
    if is_forward_port && !backports.is_empty() {
        return Err(PortingViolation::ForwardPortWithBackport {
            pr,
            found: backports,
        });
    }
    if backports.len() > 1 {
        return Err(PortingViolation::AmbiguousBackport {
            pr,
            found: backports,
        });
    }
    if !is_backport && forward_ports.is_empty() {
        return Err(PortingViolation::MissingForwardPort { pr });
    }
    if is_backport && !forward_ports.is_empty() {
        return Err(PortingViolation::BackportWithForwardPort {
            pr,
            found: forward_ports,
        });
    }
    if forward_ports.len() > 1 {
        return Err(PortingViolation::AmbiguousForwardPort {
            pr,
            found: forward_ports,
        });
    }
    // Unreachable while each flag needs the other group to be empty.
    if is_backport && is_forward_port {
        return Err(PortingViolation::Contradictory { pr });
    }

    Ok(PortingVerdict::Resolved {
        backport: backports.into_iter().next(),
        forward_port: forward_ports.into_iter().next(),
    })
}

/// Check a pull request against the porting policy.
///
/// # Errors
/// [`PortingError::MissingRepositoryLabels`] when the repository itself is
/// misconfigured, [`PortingError::Violation`] for policy failures and
/// [`PortingError::Remote`] for API failures.
pub async fn validate_pull_request(
    host: &dyn PullRequestHost,
    repo: &RepoSlug,
    pr: PullRequestNumber,
) -> Result<PortingVerdict, PortingError> {
    let defined = host
        .repository_labels(repo)
        .await
        .map_err(|source| PortingError::Remote {
            operation: "Listing repository labels",
            source,
        })?;
    let missing = missing_repository_labels(&defined);
    if !missing.is_empty() {
        return Err(PortingError::MissingRepositoryLabels {
            repo: repo.to_string(),
            missing,
        });
    }

    let labels = host
        .pull_request_labels(repo, pr)
        .await
        .map_err(|source| PortingError::Remote {
            operation: "Fetching pull request labels",
            source,
        })?;
    debug!(pr, labels = ?labels, "Fetched pull request labels");

    let verdict = evaluate(pr, &labels)?;
    info!(pr, verdict = ?verdict, "Porting labels valid");
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    fn check(labels: &[&str]) -> Result<PortingVerdict, PortingViolation> {
        let labels: Vec<String> = labels.iter().map(|l| (*l).to_string()).collect();
        evaluate(42, &labels)
    }

    fn resolved(backport: Option<&str>, forward_port: Option<&str>) -> PortingVerdict {
        PortingVerdict::Resolved {
            backport: backport.map(str::to_string),
            forward_port: forward_port.map(str::to_string),
        }
    }

    fn found(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| (*l).to_string()).collect()
    }

    #[test]
    fn test_policy_table() {
        use PortingViolation as V;
        let pr = 42;

        let cases: Vec<(Vec<&str>, Result<PortingVerdict, PortingViolation>)> = vec![
            (vec![], Err(V::NoLabels { pr })),
            (vec!["bug"], Err(V::MissingBackport { pr })),
            (vec!["needs-forward-port"], Err(V::MissingBackport { pr })),
            (
                vec!["forward-port"],
                Ok(resolved(None, Some("forward-port"))),
            ),
            (
                vec!["forward-port", "backport"],
                Err(V::ForwardPortWithBackport {
                    pr,
                    found: found(&["backport"]),
                }),
            ),
            (
                vec!["forward-port", "needs-backport", "no-backport-needed"],
                Err(V::ForwardPortWithBackport {
                    pr,
                    found: found(&["needs-backport", "no-backport-needed"]),
                }),
            ),
            (
                vec!["needs-backport", "no-backport-needed"],
                Err(V::AmbiguousBackport {
                    pr,
                    found: found(&["needs-backport", "no-backport-needed"]),
                }),
            ),
            (
                vec!["backport", "needs-backport", "needs-forward-port"],
                Err(V::AmbiguousBackport {
                    pr,
                    found: found(&["backport", "needs-backport"]),
                }),
            ),
            (vec!["needs-backport"], Err(V::MissingForwardPort { pr })),
            (vec!["backport"], Ok(resolved(Some("backport"), None))),
            (
                vec!["backport", "needs-forward-port"],
                Err(V::BackportWithForwardPort {
                    pr,
                    found: found(&["needs-forward-port"]),
                }),
            ),
            (
                vec!["needs-backport", "needs-forward-port", "no-forward-port-needed"],
                Err(V::AmbiguousForwardPort {
                    pr,
                    found: found(&["needs-forward-port", "no-forward-port-needed"]),
                }),
            ),
            (
                vec!["needs-backport", "forward-port", "needs-forward-port"],
                Err(V::AmbiguousForwardPort {
                    pr,
                    found: found(&["forward-port", "needs-forward-port"]),
                }),
            ),
            (
                vec!["needs-backport", "no-forward-port-needed"],
                Ok(resolved(Some("needs-backport"), Some("no-forward-port-needed"))),
            ),
            (
                vec!["bug", "no-backport-needed", "needs-forward-port"],
                Ok(resolved(Some("no-backport-needed"), Some("needs-forward-port"))),
            ),
            (
                vec!["backport", "forward-port"],
                Err(V::ForwardPortWithBackport {
                    pr,
                    found: found(&["backport"]),
                }),
            ),
        ];

        for (labels, expected) in cases {
            assert_eq!(check(&labels), expected, "labels: {labels:?}");
        }
    }

    #[test]
    fn test_ignore_labels_exempt_everything() {
        for ignore in IGNORE_LABELS {
            assert_eq!(
                check(&[ignore]),
                Ok(PortingVerdict::Exempt {
                    label: ignore.to_string()
                })
            );
        }
        assert_eq!(
            check(&["backport", "forward-port", "needs-backport", "wip"]),
            Ok(PortingVerdict::Exempt {
                label: "wip".to_string()
            })
        );
    }

    #[test]
    fn test_exemption_is_annotated_as_notice() {
        let exempt = check(&["rfc"]).unwrap();
        assert_eq!(exempt.level(), Level::Notice);
        assert_eq!(
            exempt.summary(7),
            "PR #7 is labelled 'rfc', skipping porting checks"
        );

        let resolved = check(&["forward-port"]).unwrap();
        assert_eq!(resolved.level(), Level::Debug);
        assert_eq!(
            resolved.summary(7),
            "PR #7 porting labels OK (backport: none, forward port: forward-port)"
        );
    }

    #[test]
    fn test_every_combination_is_decided() {
        let all: Vec<&str> = BACKPORT_LABELS
            .iter()
            .chain(FORWARD_PORT_LABELS.iter())
            .copied()
            .collect();
        for mask in 1u32..(1 << all.len()) {
            let labels: Vec<&str> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, l)| *l)
                .collect();
            let result = check(&labels);

            let backports = labels.iter().filter(|l| BACKPORT_LABELS.contains(*l)).count();
            let forward_ports = labels
                .iter()
                .filter(|l| FORWARD_PORT_LABELS.contains(*l))
                .count();
            if let Ok(PortingVerdict::Resolved { .. }) = &result {
                assert!(backports <= 1 && forward_ports <= 1, "{labels:?}");
                assert!(backports + forward_ports >= 1, "{labels:?}");
            }
            assert!(
                !matches!(result, Err(PortingViolation::Contradictory { .. })),
                "{labels:?}"
            );
        }
    }

    #[test]
    fn test_violation_messages_name_pr_and_labels() {
        let msg = PortingViolation::MissingBackport { pr: 7 }.to_string();
        assert!(msg.contains("#7"));
        assert!(msg.contains("needs-backport, no-backport-needed, backport"));

        let msg = PortingViolation::ForwardPortWithBackport {
            pr: 7,
            found: found(&["backport"]),
        }
        .to_string();
        assert_eq!(
            msg,
            "Forward port labelled PR #7 cannot have backport labels (found: backport)"
        );
    }

    #[test]
    fn test_missing_repository_labels() {
        let mut defined = found(&BACKPORT_LABELS);
        defined.extend(found(&["needs-forward-port", "forward-port", "bug"]));
        assert_eq!(
            missing_repository_labels(&defined),
            vec!["no-forward-port-needed".to_string()]
        );

        defined.push("no-forward-port-needed".to_string());
        assert!(missing_repository_labels(&defined).is_empty());
    }

    fn configured_host() -> FakeHost {
        let mut all: Vec<&str> = BACKPORT_LABELS.to_vec();
        all.extend(FORWARD_PORT_LABELS);
        FakeHost::new().with_repo_labels(&all)
    }

    #[tokio::test]
    async fn test_validate_pull_request_passes() {
        let host = configured_host().with_labels(9, &["needs-backport", "no-forward-port-needed"]);
        let repo: RepoSlug = "acme/widgets".parse().unwrap();
        let verdict = validate_pull_request(&host, &repo, 9).await.unwrap();
        assert_eq!(
            verdict,
            resolved(Some("needs-backport"), Some("no-forward-port-needed"))
        );
    }

    #[tokio::test]
    async fn test_validate_pull_request_reports_violation() {
        let host = configured_host().with_labels(9, &["bug"]);
        let repo: RepoSlug = "acme/widgets".parse().unwrap();
        let err = validate_pull_request(&host, &repo, 9).await.unwrap_err();
        assert!(matches!(
            err,
            PortingError::Violation(PortingViolation::MissingBackport { pr: 9 })
        ));
    }

    #[tokio::test]
    async fn test_repository_misconfiguration_is_fatal_before_pr_check() {
        let host = FakeHost::new()
            .with_repo_labels(&["backport", "forward-port", "wip"])
            .with_labels(9, &["wip"]);
        let repo: RepoSlug = "acme/widgets".parse().unwrap();
        let err = validate_pull_request(&host, &repo, 9).await.unwrap_err();
        match err {
            PortingError::MissingRepositoryLabels { missing, .. } => assert_eq!(
                missing,
                found(&[
                    "needs-backport",
                    "no-backport-needed",
                    "needs-forward-port",
                    "no-forward-port-needed"
                ])
            ),
            other => panic!("unexpected error: {other}"),
        }
    }
}
