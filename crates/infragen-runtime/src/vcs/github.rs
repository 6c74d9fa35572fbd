//! GitHub REST API backend.
//!
//! Files are committed one by one through the contents API, which creates a
//! commit per file. That keeps the client free of a local git checkout.

use super::{OpenedPullRequest, PullRequestDraft, VcsClient, VcsError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use infragen_core::config::GithubConfig;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("infragen/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
    number: u64,
}

pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    /// Reads the token from the configured environment variable.
    pub fn new(config: &GithubConfig) -> Result<Self, VcsError> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            VcsError::Authentication(format!("environment variable {} is not set", config.token_env))
        })?;
        Ok(Self::with_token(config, token))
    }

    pub fn with_token(config: &GithubConfig, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: token.into(),
        }
    }

    fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, path);
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", API_VERSION)
            .header("user-agent", USER_AGENT)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, VcsError> {
        request
            .send()
            .await
            .map_err(|e| VcsError::Api(e.to_string()))
    }

    /// Map an unsuccessful response to the matching error.
    async fn failure(&self, response: Response, context: &str) -> VcsError {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        let message = format!("{} ({}): {}", context, status, detail.trim());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VcsError::Authentication(message),
            StatusCode::NOT_FOUND => VcsError::RepositoryNotFound(format!("{}: {}", self.repository(), message)),
            StatusCode::CONFLICT if detail.contains("empty") => VcsError::EmptyRepository(self.repository()),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => VcsError::Conflict(message),
            _ => VcsError::Api(message),
        }
    }

    async fn existing_sha(&self, branch: &str, path: &str) -> Result<Option<String>, VcsError> {
        let response = self
            .send(
                self.request(Method::GET, &format!("contents/{}", path))
                    .query(&[("ref", branch)]),
            )
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let entry: ContentEntry = response
                    .json()
                    .await
                    .map_err(|e| VcsError::Api(e.to_string()))?;
                Ok(Some(entry.sha))
            }
            _ => Err(self.failure(response, "reading file").await),
        }
    }

    async fn add_labels(&self, number: u64, labels: &[String]) {
        if labels.is_empty() {
            return;
        }
        let request = self
            .request(Method::POST, &format!("issues/{}/labels", number))
            .json(&json!({ "labels": labels }));
        match self.send(request).await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                let error = self.failure(response, "adding labels").await;
                tracing::warn!(pr_number = number, error = %error, "could not label pull request");
            }
            Err(error) => {
                tracing::warn!(pr_number = number, error = %error, "could not label pull request");
            }
        }
    }
}

#[async_trait]
impl VcsClient for GitHubClient {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn create_branch(&self, base: &str, name: &str) -> Result<(), VcsError> {
        let response = self
            .send(self.request(Method::GET, &format!("git/ref/heads/{}", base)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(VcsError::EmptyRepository(format!(
                "{}: base branch '{}' does not exist",
                self.repository(),
                base
            )));
        }
        if !response.status().is_success() {
            return Err(self.failure(response, "reading base branch").await);
        }
        let base_ref: GitRef = response
            .json()
            .await
            .map_err(|e| VcsError::Api(e.to_string()))?;

        let response = self
            .send(self.request(Method::POST, "git/refs").json(&json!({
                "ref": format!("refs/heads/{}", name),
                "sha": base_ref.object.sha,
            })))
            .await?;
        if !response.status().is_success() {
            return Err(self.failure(response, "creating branch").await);
        }

        tracing::info!(branch = name, base = base, repository = %self.repository(), "created branch");
        Ok(())
    }

    async fn commit_files(
        &self,
        branch: &str,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<(), VcsError> {
        for (path, contents) in files {
            let mut body = json!({
                "message": message,
                "content": BASE64.encode(contents.as_bytes()),
                "branch": branch,
            });
            if let Some(sha) = self.existing_sha(branch, path).await? {
                body["sha"] = json!(sha);
            }

            let response = self
                .send(
                    self.request(Method::PUT, &format!("contents/{}", path))
                        .json(&body),
                )
                .await?;
            if !response.status().is_success() {
                return Err(self.failure(response, &format!("committing {}", path)).await);
            }
            tracing::debug!(branch = branch, path = %path, "committed file");
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        branch: &str,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest, VcsError> {
        let response = self
            .send(self.request(Method::POST, "pulls").json(&json!({
                "title": draft.title,
                "head": branch,
                "base": draft.base,
                "body": draft.body,
            })))
            .await?;
        if !response.status().is_success() {
            return Err(self.failure(response, "opening pull request").await);
        }
        let pull: PullRequest = response
            .json()
            .await
            .map_err(|e| VcsError::Api(e.to_string()))?;

        self.add_labels(pull.number, &draft.labels).await;

        tracing::info!(pr_number = pull.number, url = %pull.html_url, "opened pull request");
        Ok(OpenedPullRequest {
            url: pull.html_url,
            number: pull.number,
        })
    }
}
