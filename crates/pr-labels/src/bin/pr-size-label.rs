//! pr-size-label - label a pull request with its change size.
//!
//! Counts lines added plus lines removed in the PR's diff (vendored, lock and
//! generated files excluded), picks a `size/<bucket>` label and makes it the
//! only size label on the PR.
//!
//! # Environment Variables
//!
//! - `GITHUB_TOKEN` - API token (required)
//! - `GITHUB_REPOSITORY` - `owner/repo` (defaults to the `origin` remote)
//! - `TINY`, `SMALL`, `MEDIUM`, `LARGE`, `HUGE` - bucket ranges as `<max`,
//!   `min-max` or `>min`
//!
//! # Examples
//!
//! ```bash
//! # Show what would change without touching the PR
//! pr-size-label --pr 2622 --dry-run
//!
//! # Label using custom ranges
//! SMALL=10-99 MEDIUM=100-300 pr-size-label --pr 2622 --repo 5dlabs/cto
//! ```

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use anyhow::{Context, Result};
use clap::Parser;
use pr_labels::cli::{init_tracing, OutputFormat};
use pr_labels::{
    label_pull_request, BuiltinDiffstat, DiffSummarizer, ExclusionSet, ExternalDiffstat,
    RangeMode, SizeBucket, SizeRanges, SizeReport,
};
use scm::{detect_origin_repo, GitHubClient, RepoSlug};
use tracing::debug;

#[derive(Parser)]
#[command(name = "pr-size-label")]
#[command(about = "Label a pull request with size/<bucket> computed from its diff")]
#[command(version)]
struct Cli {
    /// Pull request number
    #[arg(short, long)]
    pr: u64,

    /// Repository in owner/repo format (defaults to the origin remote)
    #[arg(short, long, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,

    /// GitHub token (or set `GITHUB_TOKEN` env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API root
    #[arg(long, env = "GITHUB_API_URL", default_value = scm::DEFAULT_API_URL)]
    api_url: String,

    /// Dry run - compute and report the label without changing the PR
    #[arg(short, long)]
    dry_run: bool,

    /// Range for size/tiny
    #[arg(long, env = "TINY", default_value = "<10")]
    tiny: String,

    /// Range for size/small
    #[arg(long, env = "SMALL", default_value = "10-49")]
    small: String,

    /// Range for size/medium
    #[arg(long, env = "MEDIUM", default_value = "50-100")]
    medium: String,

    /// Range for size/large
    #[arg(long, env = "LARGE", default_value = "101-500")]
    large: String,

    /// Range for size/huge
    #[arg(long, env = "HUGE", default_value = ">500")]
    huge: String,

    /// Treat both ends of min-max ranges as inclusive
    #[arg(long, env = "SIZE_INCLUSIVE_RANGES")]
    inclusive_ranges: bool,

    /// Additional path globs to exclude from the size (repeatable)
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<String>,

    /// Do not apply the built-in vendor/lock/generated exclusions
    #[arg(long)]
    no_default_excludes: bool,

    /// Use filterdiff and diffstat instead of the built-in counter
    #[arg(long)]
    external_diffstat: bool,

    /// Output format: json, text
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn ranges(&self) -> Result<SizeRanges> {
        let mode = if self.inclusive_ranges {
            RangeMode::Inclusive
        } else {
            RangeMode::Exclusive
        };

        let mut ranges = SizeRanges::defaults().with_mode(mode);
        for (bucket, value) in [
            (SizeBucket::Tiny, &self.tiny),
            (SizeBucket::Small, &self.small),
            (SizeBucket::Medium, &self.medium),
            (SizeBucket::Large, &self.large),
            (SizeBucket::Huge, &self.huge),
        ] {
            ranges = ranges.with_override(bucket, value)?;
        }
        Ok(ranges)
    }

    fn exclusions(&self) -> Result<ExclusionSet> {
        let set = if self.no_default_excludes {
            ExclusionSet::new(self.exclude.iter().cloned())?
        } else {
            ExclusionSet::with_defaults(self.exclude.iter().cloned())?
        };
        Ok(set)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Everything that can fail without the network fails first.
    let ranges = cli.ranges().context("Invalid size range configuration")?;
    let exclusions = cli
        .exclusions()
        .context("Invalid exclusion configuration")?;
    let client = GitHubClient::with_base_url(cli.token.clone().unwrap_or_default(), &cli.api_url)?;

    let summarizer: Box<dyn DiffSummarizer> = if cli.external_diffstat {
        let external = ExternalDiffstat::default();
        external.ensure_available().await?;
        Box::new(external)
    } else {
        Box::new(BuiltinDiffstat)
    };

    let repo: RepoSlug = match cli.repo.as_deref() {
        Some(repo) => repo.parse()?,
        None => detect_origin_repo()
            .await
            .context("No --repo given and the repository could not be detected")?,
    };
    debug!(repo = %repo, pr = cli.pr, ranges = ?ranges, "Resolved configuration");

    let report = label_pull_request(
        &client,
        &repo,
        cli.pr,
        &ranges,
        &*summarizer,
        &exclusions,
        cli.dry_run,
    )
    .await
    .with_context(|| format!("Failed to size-label PR #{} in {repo}", cli.pr))?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report, cli.dry_run),
    }

    Ok(())
}

fn print_report(report: &SizeReport, dry_run: bool) {
    let outcome = &report.outcome;
    println!(
        "PR #{} in {}: {} files, +{} -{} (size {}) => {}",
        report.pr,
        report.repo,
        report.stats.files_changed,
        report.stats.insertions,
        report.stats.deletions,
        report.size,
        outcome.label
    );

    if outcome.plan.is_noop() {
        println!("  Label already up to date");
        return;
    }

    let verb = if dry_run { "Would" } else { "Did" };
    if let Some(add) = &outcome.plan.add {
        println!("  {verb} add: {add}");
    }
    for remove in &outcome.plan.remove {
        println!("  {verb} remove: {remove}");
    }
}
