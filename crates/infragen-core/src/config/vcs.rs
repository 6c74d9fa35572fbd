//! Version control configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where pull requests are opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VcsBackend {
    /// GitHub REST API.
    Github(GithubConfig),

    /// Branches and pull requests written to a local directory.
    Directory {
        path: PathBuf,
    },
}

/// GitHub repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    pub owner: String,

    pub repo: String,

    /// Environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

/// Version control settings shared by all backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsConfig {
    /// Backend used for provisioning. Without one only dry runs are possible.
    #[serde(default)]
    pub backend: Option<VcsBackend>,

    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Repository directory bundles are committed under.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Labels added to every pull request on top of the generated ones.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            backend: None,
            base_branch: default_base_branch(),
            branch_prefix: default_branch_prefix(),
            root_dir: default_root_dir(),
            labels: Vec::new(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_branch_prefix() -> String {
    "infragen".to_string()
}

fn default_root_dir() -> String {
    "terraform".to_string()
}
