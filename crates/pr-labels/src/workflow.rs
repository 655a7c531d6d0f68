//! GitHub Actions workflow commands.
//!
//! When a tool runs inside Actions, blocking problems are written as
//! `::error::` annotations and informational detail as `::debug::`, so the
//! check UI separates the two.

use std::fmt;

const ENV_GITHUB_ACTIONS: &str = "GITHUB_ACTIONS";

/// Severity of a workflow command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Notice,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Notice => write!(f, "notice"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Whether the process is running as a GitHub Actions step.
#[must_use]
pub fn in_github_actions() -> bool {
    std::env::var(ENV_GITHUB_ACTIONS).is_ok_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Escape a message so newlines and `%` survive the command syntax.
#[must_use]
pub fn escape(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Format a workflow command line, e.g. `::error title=Porting labels::...`.
#[must_use]
pub fn command(level: Level, title: Option<&str>, message: &str) -> String {
    match title {
        Some(title) => format!(
            "::{level} title={}::{}",
            escape(title).replace(':', "%3A").replace(',', "%2C"),
            escape(message)
        ),
        None => format!("::{level}::{}", escape(message)),
    }
}

/// Print a workflow command to stdout when running in Actions.
///
/// Outside Actions this is a no-op; the `tracing` output already carries
/// the same information.
pub fn emit(level: Level, title: Option<&str>, message: &str) {
    if in_github_actions() {
        // Workflow commands are read from stdout.
        println!("{}", command(level, title, message));
    }
}
