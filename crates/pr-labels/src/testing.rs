//! In-memory [`PullRequestHost`] used by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use scm::{PullRequestHost, PullRequestNumber, RepoSlug, ScmError};

#[derive(Debug, Default)]
struct State {
    diffs: HashMap<PullRequestNumber, String>,
    pr_labels: HashMap<PullRequestNumber, Vec<String>>,
    repo_labels: Vec<String>,
    mutations: Vec<String>,
    fail_writes: bool,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<State>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diff(self, pr: PullRequestNumber, diff: &str) -> Self {
        self.state.lock().unwrap().diffs.insert(pr, diff.to_string());
        self
    }

    pub fn with_labels(self, pr: PullRequestNumber, labels: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .pr_labels
            .insert(pr, labels.iter().map(|l| (*l).to_string()).collect());
        self
    }

    pub fn with_repo_labels(self, labels: &[&str]) -> Self {
        self.state.lock().unwrap().repo_labels = labels.iter().map(|l| (*l).to_string()).collect();
        self
    }

    pub fn failing_writes(self) -> Self {
        self.state.lock().unwrap().fail_writes = true;
        self
    }

    pub fn labels(&self, pr: PullRequestNumber) -> Vec<String> {
        let mut labels = self
            .state
            .lock()
            .unwrap()
            .pr_labels
            .get(&pr)
            .cloned()
            .unwrap_or_default();
        labels.sort();
        labels
    }

    /// Every write call in order, e.g. `add size/tiny` or `remove size/huge`.
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }
}

fn not_found() -> ScmError {
    ScmError::Api {
        status: 404,
        message: "Not Found".to_string(),
    }
}

#[async_trait]
impl PullRequestHost for FakeHost {
    async fn pull_request_diff(
        &self,
        _repo: &RepoSlug,
        pr: PullRequestNumber,
    ) -> Result<String, ScmError> {
        self.state
            .lock()
            .unwrap()
            .diffs
            .get(&pr)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn pull_request_labels(
        &self,
        _repo: &RepoSlug,
        pr: PullRequestNumber,
    ) -> Result<Vec<String>, ScmError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pr_labels
            .get(&pr)
            .cloned()
            .unwrap_or_default())
    }

    async fn repository_labels(&self, _repo: &RepoSlug) -> Result<Vec<String>, ScmError> {
        Ok(self.state.lock().unwrap().repo_labels.clone())
    }

    async fn add_labels(
        &self,
        _repo: &RepoSlug,
        pr: PullRequestNumber,
        labels: &[String],
    ) -> Result<(), ScmError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(ScmError::Api {
                status: 500,
                message: "write failed".to_string(),
            });
        }
        for label in labels {
            state.mutations.push(format!("add {label}"));
            let current = state.pr_labels.entry(pr).or_default();
            if !current.contains(label) {
                current.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        _repo: &RepoSlug,
        pr: PullRequestNumber,
        label: &str,
    ) -> Result<(), ScmError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(ScmError::Api {
                status: 500,
                message: "write failed".to_string(),
            });
        }
        state.mutations.push(format!("remove {label}"));
        if let Some(current) = state.pr_labels.get_mut(&pr) {
            current.retain(|l| l != label);
        }
        Ok(())
    }
}
