//! Local directory backend.
//!
//! Each branch is a directory under `branches/`, and each pull request is a
//! JSON file under `pulls/`. Useful for air-gapped setups and for reviewing
//! generated bundles without a hosted repository.

use super::{OpenedPullRequest, PullRequestDraft, VcsClient, VcsError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Serialize)]
struct PullRequestRecord<'a> {
    number: u64,
    branch: &'a str,
    #[serde(flatten)]
    draft: &'a PullRequestDraft,
}

pub struct DirectoryVcs {
    root: PathBuf,
    /// Serializes pull request numbering.
    numbering: Mutex<()>,
}

impl DirectoryVcs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            numbering: Mutex::new(()),
        }
    }

    fn branch_dir(&self, branch: &str) -> Result<PathBuf, VcsError> {
        Ok(self.root.join("branches").join(relative(branch)?))
    }

    fn pulls_dir(&self) -> PathBuf {
        self.root.join("pulls")
    }
}

/// Reject paths that would escape the branch directory.
fn relative(path: &str) -> Result<&Path, VcsError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate)
    } else {
        Err(VcsError::Api(format!("invalid path '{}'", path)))
    }
}

fn io_error(context: &str, err: std::io::Error) -> VcsError {
    VcsError::Api(format!("{}: {}", context, err))
}

#[async_trait]
impl VcsClient for DirectoryVcs {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn create_branch(&self, base: &str, name: &str) -> Result<(), VcsError> {
        let dir = self.branch_dir(name)?;
        if fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(VcsError::Conflict(format!("branch '{}' already exists", name)));
        }
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("creating branch", e))?;
        tracing::info!(branch = name, base = base, root = %self.root.display(), "created branch directory");
        Ok(())
    }

    async fn commit_files(
        &self,
        branch: &str,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<(), VcsError> {
        let dir = self.branch_dir(branch)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(VcsError::Api(format!("branch '{}' does not exist", branch)));
        }

        for (path, contents) in files {
            let target = dir.join(relative(path)?);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error("creating directory", e))?;
            }
            fs::write(&target, contents)
                .await
                .map_err(|e| io_error("writing file", e))?;
        }
        fs::write(dir.join("COMMIT_MSG"), message)
            .await
            .map_err(|e| io_error("writing commit message", e))?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        branch: &str,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest, VcsError> {
        let _guard = self.numbering.lock().await;

        let pulls = self.pulls_dir();
        fs::create_dir_all(&pulls)
            .await
            .map_err(|e| io_error("creating pulls directory", e))?;

        let mut number = 1;
        let mut entries = fs::read_dir(&pulls)
            .await
            .map_err(|e| io_error("listing pull requests", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("listing pull requests", e))?
        {
            let name = entry.file_name();
            let existing = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(existing) = existing {
                number = number.max(existing + 1);
            }
        }

        let record = PullRequestRecord {
            number,
            branch,
            draft,
        };
        let path = pulls.join(format!("{}.json", number));
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| VcsError::Api(e.to_string()))?;
        fs::write(&path, json)
            .await
            .map_err(|e| io_error("writing pull request", e))?;

        Ok(OpenedPullRequest {
            url: format!("file://{}", path.display()),
            number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PullRequestDraft {
        PullRequestDraft {
            base: "main".into(),
            title: "[infragen] Add dev OBJECT_STORAGE: dev-logs-logs".into(),
            body: "body".into(),
            labels: vec!["infrastructure".into()],
        }
    }

    #[tokio::test]
    async fn test_branch_commit_and_pull_request() {
        let root = tempfile::tempdir().unwrap();
        let vcs = DirectoryVcs::new(root.path());

        vcs.create_branch("main", "infragen/dev-logs").await.unwrap();
        let files = BTreeMap::from([(
            "terraform/dev/object_storage/dev-logs-logs/main.tf".to_string(),
            "# main\n".to_string(),
        )]);
        vcs.commit_files("infragen/dev-logs", &files, "Add logs").await.unwrap();

        let written = root
            .path()
            .join("branches/infragen/dev-logs/terraform/dev/object_storage/dev-logs-logs/main.tf");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "# main\n");

        let first = vcs.open_pull_request("infragen/dev-logs", &draft()).await.unwrap();
        let second = vcs.open_pull_request("infragen/dev-logs", &draft()).await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert!(first.url.ends_with("pulls/1.json"));
    }

    #[tokio::test]
    async fn test_existing_branch_conflicts() {
        let root = tempfile::tempdir().unwrap();
        let vcs = DirectoryVcs::new(root.path());
        vcs.create_branch("main", "feature").await.unwrap();
        assert!(matches!(
            vcs.create_branch("main", "feature").await,
            Err(VcsError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let root = tempfile::tempdir().unwrap();
        let vcs = DirectoryVcs::new(root.path());
        assert!(vcs.create_branch("main", "../outside").await.is_err());
    }
}
