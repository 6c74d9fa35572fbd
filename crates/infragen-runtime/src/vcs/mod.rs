//! Version control seam: branches, commits and pull requests.

mod directory;
mod github;

pub use directory::DirectoryVcs;
pub use github::GitHubClient;

use async_trait::async_trait;
use infragen_core::config::{VcsBackend, VcsConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcsError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("repository is empty: {0}")]
    EmptyRepository(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("version control API error: {0}")]
    Api(String),
}

/// Everything needed to open a pull request except the branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDraft {
    pub base: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// A pull request as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedPullRequest {
    pub url: String,
    pub number: u64,
}

#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Backend name reported by health checks.
    fn name(&self) -> &'static str;

    /// Create `name` from the head of `base`.
    async fn create_branch(&self, base: &str, name: &str) -> Result<(), VcsError>;

    /// Commit files, keyed by repository path, to `branch`.
    async fn commit_files(
        &self,
        branch: &str,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<(), VcsError>;

    async fn open_pull_request(
        &self,
        branch: &str,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest, VcsError>;
}

/// Build the configured backend, if any.
pub fn from_config(config: &VcsConfig) -> Result<Option<Arc<dyn VcsClient>>, VcsError> {
    let client: Arc<dyn VcsClient> = match &config.backend {
        None => return Ok(None),
        Some(VcsBackend::Github(github)) => Arc::new(GitHubClient::new(github)?),
        Some(VcsBackend::Directory { path }) => Arc::new(DirectoryVcs::new(path)),
    };
    Ok(Some(client))
}
