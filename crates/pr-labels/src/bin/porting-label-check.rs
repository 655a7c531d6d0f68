//! porting-label-check - enforce backport / forward-port labelling on a PR.
//!
//! Exits 0 when the PR's porting labels are complete and unambiguous, or when
//! it carries `do-not-merge`, `rfc` or `wip`. Any other outcome exits
//! non-zero, which blocks the PR when run as a required check.
//!
//! # Examples
//!
//! ```bash
//! GITHUB_TOKEN=... porting-label-check 2622 5dlabs/cto
//! ```

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use anyhow::{Context, Result};
use clap::Parser;
use pr_labels::cli::{init_tracing, OutputFormat};
use pr_labels::workflow::{self, Level};
use pr_labels::validate_pull_request;
use scm::{GitHubClient, RepoSlug};

const CHECK_TITLE: &str = "Porting labels";

#[derive(Parser)]
#[command(name = "porting-label-check")]
#[command(about = "Check a pull request's backport and forward-port labels")]
#[command(version)]
struct Cli {
    /// Pull request number
    pr: u64,

    /// Repository in owner/repo format
    repo: String,

    /// GitHub token (or set `GITHUB_TOKEN` env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API root
    #[arg(long, env = "GITHUB_API_URL", default_value = scm::DEFAULT_API_URL)]
    api_url: String,

    /// Output format: json, text
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let repo: RepoSlug = cli.repo.parse()?;
    let client = GitHubClient::with_base_url(cli.token.clone().unwrap_or_default(), &cli.api_url)?;

    let verdict = match validate_pull_request(&client, &repo, cli.pr).await {
        Ok(verdict) => verdict,
        Err(e) => {
            workflow::emit(Level::Error, Some(CHECK_TITLE), &e.to_string());
            return Err(e).with_context(|| format!("PR #{} in {repo} failed the porting check", cli.pr));
        }
    };

    let summary = verdict.summary(cli.pr);
    // `::debug::` takes no title.
    let title = (verdict.level() == Level::Notice).then_some(CHECK_TITLE);
    workflow::emit(verdict.level(), title, &summary);

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
        OutputFormat::Text => println!("{summary}"),
    }

    Ok(())
}
