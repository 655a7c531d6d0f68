//! # Diff statistics
//!
//! Computes the size of a pull request from its unified diff after dropping
//! vendored and generated files.
//!
//! Two summarizers implement [`DiffSummarizer`]:
//!
//! - [`BuiltinDiffstat`] parses the diff in-process.
//! - [`ExternalDiffstat`] pipes it through `filterdiff` and `diffstat -s` and
//!   reads the summary line, for parity with hosts that standardise on those
//!   tools.

use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use scm::{PullRequestHost, PullRequestNumber, RepoSlug};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ConfigError, DiffStatError, SizeError};

/// Paths that never count towards a pull request's size.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    // Vendored dependencies
    "vendor/**",
    "**/vendor/**",
    "third_party/**",
    // Dependency lock files
    "**/go.sum",
    "**/*.lock",
    "**/package-lock.json",
    "**/pnpm-lock.yaml",
    // Generated protocol buffers / gRPC
    "**/*.pb.go",
    "**/*.pb.gw.go",
    "**/*.pb.validate.go",
    "**/*_grpc.pb.go",
    "**/*_pb2.py",
    "**/*_pb2_grpc.py",
    "**/*.pb.rs",
    // Generated clients
    "**/generated/**",
    "**/zz_generated*",
    "pkg/client/**",
];

static INSERTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) insertions?\(\+\)").unwrap());
static DELETIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) deletions?\(-\)").unwrap());
static FILES_CHANGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) files? changed").unwrap());
static HUNK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -\d+(?:,(\d+))? \+\d+(?:,(\d+))? @@").unwrap());

// ---------------------------------------------------------------------------
// Exclusions
// ---------------------------------------------------------------------------

/// Compiled set of path globs whose files are dropped from a diff.
///
/// `*` matches across `/`, matching `filterdiff -x` semantics.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExclusionSet {
    /// Compile a set of glob patterns.
    ///
    /// # Errors
    /// [`ConfigError::InvalidGlob`] for the first pattern that does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ConfigError::InvalidGlob {
            pattern: patterns.join(","),
            source,
        })?;
        Ok(Self { patterns, set })
    }

    /// The built-in exclusions plus `extra`.
    ///
    /// # Errors
    /// [`ConfigError::InvalidGlob`] if an extra pattern does not compile.
    pub fn with_defaults<I, S>(extra: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            DEFAULT_EXCLUSIONS
                .iter()
                .map(|p| (*p).to_string())
                .chain(extra.into_iter().map(Into::into)),
        )
    }

    /// An empty set that excludes nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Patterns rewritten for `filterdiff -x`, which matches with `fnmatch`
    /// (no `**`, `*` crosses `/`). A leading `**/X` becomes `X` and `*/X` so
    /// it only ever matches whole path components.
    fn fnmatch_patterns(&self) -> Vec<String> {
        let flatten = |p: &str| p.replace("/**", "/*").replace("**", "*");
        let mut out: Vec<String> = Vec::new();
        for pattern in &self.patterns {
            let translated = match pattern.strip_prefix("**/") {
                Some(rest) => {
                    let rest = flatten(rest);
                    vec![rest.clone(), format!("*/{rest}")]
                }
                None => vec![flatten(pattern)],
            };
            for p in translated {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Unified diff parsing
// ---------------------------------------------------------------------------

/// Line counts for one file in a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Path relative to the repository root (new path, or old path for deletions).
    pub path: String,
    pub insertions: u64,
    pub deletions: u64,
    pub binary: bool,
}

/// Per-file and aggregate counts for a unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStat {
    pub files: Vec<FileStat>,
    pub insertions: u64,
    pub deletions: u64,
}

/// Aggregate size of a pull request after exclusions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrChangeStats {
    pub files_changed: usize,
    pub insertions: u64,
    pub deletions: u64,
}

impl PrChangeStats {
    /// Lines added plus lines removed.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.insertions + self.deletions
    }
}

#[derive(Debug, Default)]
struct Section<'a> {
    text: Vec<&'a str>,
    header_path: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
    insertions: u64,
    deletions: u64,
    binary: bool,
    seen_hunk: bool,
}

impl Section<'_> {
    fn path(&self) -> String {
        self.new_path
            .clone()
            .or_else(|| self.old_path.clone())
            .or_else(|| self.header_path.clone())
            .unwrap_or_default()
    }

    fn stat(&self) -> FileStat {
        FileStat {
            path: self.path(),
            insertions: self.insertions,
            deletions: self.deletions,
            binary: self.binary,
        }
    }
}

/// A diff split into leading text and per-file sections.
struct ParsedDiff<'a> {
    preamble: Vec<&'a str>,
    sections: Vec<Section<'a>>,
}

/// Strip quoting, the `a/`/`b/` prefix and any trailing timestamp from a
/// `---`/`+++` path. Returns `None` for `/dev/null`.
fn clean_path(raw: &str) -> Option<String> {
    let raw = raw.trim_end_matches(['\n', '\r']);
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    let raw = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    if raw == "/dev/null" {
        return None;
    }
    let path = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(path.to_string())
}

fn parse_hunk_counts(line: &str) -> Option<(u64, u64)> {
    let caps = HUNK_HEADER.captures(line)?;
    let count = |i: usize| {
        caps.get(i)
            .map_or(Some(1), |m| m.as_str().parse::<u64>().ok())
    };
    Some((count(1)?, count(2)?))
}

fn parse_diff(diff: &str) -> ParsedDiff<'_> {
    let mut preamble = Vec::new();
    let mut sections: Vec<Section<'_>> = Vec::new();
    let mut old_remaining = 0u64;
    let mut new_remaining = 0u64;
    let mut lines = diff.split_inclusive('\n').peekable();

    while let Some(line) = lines.next() {
        if old_remaining > 0 || new_remaining > 0 {
            if let Some(section) = sections.last_mut() {
                section.text.push(line);
                match line.as_bytes().first() {
                    Some(b'+') => {
                        section.insertions += 1;
                        new_remaining = new_remaining.saturating_sub(1);
                    }
                    Some(b'-') => {
                        section.deletions += 1;
                        old_remaining = old_remaining.saturating_sub(1);
                    }
                    Some(b'\\') => {}
                    _ => {
                        old_remaining = old_remaining.saturating_sub(1);
                        new_remaining = new_remaining.saturating_sub(1);
                    }
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            let header_path = rest
                .trim_end()
                .rsplit_once(" b/")
                .map(|(_, path)| path.to_string());
            sections.push(Section {
                text: vec![line],
                header_path,
                ..Section::default()
            });
            continue;
        }

        if let Some(rest) = line.strip_prefix("--- ") {
            let next_is_new = lines.peek().is_some_and(|l| l.starts_with("+++ "));
            let starts_file = match sections.last() {
                None => true,
                Some(section) => section.seen_hunk || section.old_path.is_some(),
            };
            if next_is_new && starts_file {
                sections.push(Section::default());
            }
            if next_is_new {
                if let Some(section) = sections.last_mut() {
                    section.old_path = clean_path(rest);
                    section.text.push(line);
                    continue;
                }
            }
        }

        let Some(section) = sections.last_mut() else {
            preamble.push(line);
            continue;
        };
        section.text.push(line);

        if let Some(rest) = line.strip_prefix("+++ ") {
            section.new_path = clean_path(rest);
        } else if line.starts_with("@@ ") {
            if let Some((old, new)) = parse_hunk_counts(line) {
                old_remaining = old;
                new_remaining = new;
                section.seen_hunk = true;
            }
        } else if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
            section.binary = true;
        }
    }

    ParsedDiff { preamble, sections }
}

/// Drop every file section whose path matches `exclusions`.
#[must_use]
pub fn filter_diff(diff: &str, exclusions: &ExclusionSet) -> String {
    let parsed = parse_diff(diff);
    let mut out: String = parsed.preamble.concat();
    for section in &parsed.sections {
        if exclusions.is_excluded(&section.path()) {
            debug!(path = %section.path(), "Excluding file from diff");
            continue;
        }
        out.extend(section.text.iter().copied());
    }
    out
}

impl DiffStat {
    /// Count insertions and deletions in a unified diff.
    #[must_use]
    pub fn from_unified_diff(diff: &str) -> Self {
        Self::from_sections(&parse_diff(diff).sections, &ExclusionSet::none())
    }

    /// Count a diff, skipping files that match `exclusions`.
    #[must_use]
    pub fn from_filtered_diff(diff: &str, exclusions: &ExclusionSet) -> Self {
        Self::from_sections(&parse_diff(diff).sections, exclusions)
    }

    fn from_sections(sections: &[Section<'_>], exclusions: &ExclusionSet) -> Self {
        let files: Vec<FileStat> = sections
            .iter()
            .filter(|s| !exclusions.is_excluded(&s.path()))
            .map(Section::stat)
            .collect();
        let insertions = files.iter().map(|f| f.insertions).sum();
        let deletions = files.iter().map(|f| f.deletions).sum();
        Self {
            files,
            insertions,
            deletions,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.insertions + self.deletions
    }

    /// The `diffstat -s` style summary line. Zero categories are omitted.
    #[must_use]
    pub fn summary(&self) -> String {
        let files = self.files.len();
        let mut parts = vec![format!(
            "{files} file{} changed",
            if files == 1 { "" } else { "s" }
        )];
        if self.insertions > 0 {
            parts.push(format!(
                "{} insertion{}(+)",
                self.insertions,
                if self.insertions == 1 { "" } else { "s" }
            ));
        }
        if self.deletions > 0 {
            parts.push(format!(
                "{} deletion{}(-)",
                self.deletions,
                if self.deletions == 1 { "" } else { "s" }
            ));
        }
        parts.join(", ")
    }
}

impl From<&DiffStat> for PrChangeStats {
    fn from(stat: &DiffStat) -> Self {
        Self {
            files_changed: stat.files.len(),
            insertions: stat.insertions,
            deletions: stat.deletions,
        }
    }
}

/// Read a `diffstat`/`git diff --shortstat` summary line.
///
/// Missing insertion or deletion counts read as 0, since both tools omit a
/// zero category. A line with none of the three fields is rejected.
///
/// # Errors
/// [`DiffStatError::UnrecognisedSummary`] when no counts are present.
pub fn parse_summary(line: &str) -> Result<PrChangeStats, DiffStatError> {
    let capture = |re: &Regex| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
    };
    let files = capture(&FILES_CHANGED);
    let insertions = capture(&INSERTIONS);
    let deletions = capture(&DELETIONS);

    if files.is_none() && insertions.is_none() && deletions.is_none() {
        return Err(DiffStatError::UnrecognisedSummary(line.trim().to_string()));
    }

    Ok(PrChangeStats {
        files_changed: files.and_then(|f| usize::try_from(f).ok()).unwrap_or(0),
        insertions: insertions.unwrap_or(0),
        deletions: deletions.unwrap_or(0),
    })
}

// ---------------------------------------------------------------------------
// Summarizers
// ---------------------------------------------------------------------------

/// Turns a unified diff into change counts, honouring exclusions.
#[async_trait]
pub trait DiffSummarizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(
        &self,
        diff: &str,
        exclusions: &ExclusionSet,
    ) -> Result<PrChangeStats, DiffStatError>;
}

/// In-process diff statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDiffstat;

#[async_trait]
impl DiffSummarizer for BuiltinDiffstat {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn summarize(
        &self,
        diff: &str,
        exclusions: &ExclusionSet,
    ) -> Result<PrChangeStats, DiffStatError> {
        let stat = DiffStat::from_filtered_diff(diff, exclusions);
        debug!(summary = %stat.summary(), "Computed diffstat");
        Ok(PrChangeStats::from(&stat))
    }
}

/// `filterdiff` + `diffstat` from patchutils.
#[derive(Debug, Clone)]
pub struct ExternalDiffstat {
    filterdiff: String,
    diffstat: String,
}

impl Default for ExternalDiffstat {
    fn default() -> Self {
        Self {
            filterdiff: "filterdiff".to_string(),
            diffstat: "diffstat".to_string(),
        }
    }
}

impl ExternalDiffstat {
    /// Use specific executables instead of looking up the defaults in `PATH`.
    #[must_use]
    pub fn with_programs(filterdiff: impl Into<String>, diffstat: impl Into<String>) -> Self {
        Self {
            filterdiff: filterdiff.into(),
            diffstat: diffstat.into(),
        }
    }

    /// Verify both tools can be started.
    ///
    /// # Errors
    /// [`DiffStatError::ToolMissing`] naming the first tool that is absent.
    pub async fn ensure_available(&self) -> Result<(), DiffStatError> {
        for tool in [&self.filterdiff, &self.diffstat] {
            let status = Command::new(tool)
                .arg("--version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = status {
                debug!(tool = %tool, error = %e, "Tool probe failed");
                return Err(DiffStatError::ToolMissing(tool.clone()));
            }
        }
        Ok(())
    }

    async fn pipe(tool: &str, args: &[String], input: Vec<u8>) -> Result<String, DiffStatError> {
        let failed = |message: String| DiffStatError::ToolFailed {
            tool: tool.to_string(),
            message,
        };

        let mut child = Command::new(tool)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DiffStatError::ToolMissing(tool.to_string())
                } else {
                    failed(e.to_string())
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failed("stdin unavailable".to_string()))?;
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let written = writer.await.map_err(|e| failed(e.to_string()))?;

        // A tool that exits early breaks the pipe; report its own failure.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{}: {}", output.status, stderr.trim())));
        }
        written.map_err(|e| failed(e.to_string()))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DiffSummarizer for ExternalDiffstat {
    fn name(&self) -> &'static str {
        "diffstat"
    }

    async fn summarize(
        &self,
        diff: &str,
        exclusions: &ExclusionSet,
    ) -> Result<PrChangeStats, DiffStatError> {
        let mut args = vec!["-p1".to_string()];
        for pattern in exclusions.fnmatch_patterns() {
            args.push("-x".to_string());
            args.push(pattern);
        }

        let filtered = Self::pipe(&self.filterdiff, &args, diff.as_bytes().to_vec()).await?;
        let summary = Self::pipe(&self.diffstat, &["-s".to_string()], filtered.into_bytes()).await?;
        debug!(summary = %summary.trim(), "diffstat summary");
        parse_summary(&summary)
    }
}

/// Fetch a pull request's diff and measure it.
///
/// # Errors
/// [`SizeError::Remote`] if the diff cannot be fetched and
/// [`SizeError::DiffStat`] if summarizing fails.
pub async fn compute_size(
    host: &dyn PullRequestHost,
    repo: &RepoSlug,
    pr: PullRequestNumber,
    summarizer: &dyn DiffSummarizer,
    exclusions: &ExclusionSet,
) -> Result<PrChangeStats, SizeError> {
    let diff = host
        .pull_request_diff(repo, pr)
        .await
        .map_err(|source| SizeError::Remote {
            operation: "Fetching pull request diff",
            source,
        })?;

    let stats = summarizer.summarize(&diff, exclusions).await?;
    info!(
        pr,
        summarizer = summarizer.name(),
        files = stats.files_changed,
        insertions = stats.insertions,
        deletions = stats.deletions,
        size = stats.total(),
        "Computed pull request size"
    );
    Ok(stats)
}
