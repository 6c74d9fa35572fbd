//! Configuration types for infragen.
//!
//! Configuration is loaded from `infragen.yaml`, which may reference a
//! separate policy file:
//!
//! - **infragen.yaml**: parser, version control, timeouts, logging
//! - **policies.yaml**: naming, tagging and security rules (see [`PolicyRuleSet`])

pub mod parser;
pub mod policy;
pub mod vcs;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use parser::{MessagesApiConfig, ParserConfig};
pub use policy::{
    BackendPolicy, Enforcement, EnforcementPolicy, NamingPolicy, PolicyRuleSet, ProviderPolicy,
    SecurityRules, TagPolicy,
};
pub use vcs::{GithubConfig, VcsBackend, VcsConfig};

/// Complete infragen configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfragenConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Inline policy.
    #[serde(default)]
    pub policy: PolicyRuleSet,

    /// Path to a policy file (alternative to inline).
    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub vcs: VcsConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timeouts for calls to external services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Parser call timeout in seconds.
    #[serde(default = "default_parse_secs")]
    pub parse_secs: u64,

    /// Timeout for each version control call in seconds.
    #[serde(default = "default_vcs_secs")]
    pub vcs_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            parse_secs: default_parse_secs(),
            vcs_secs: default_vcs_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn parse(&self) -> Duration {
        Duration::from_secs(self.parse_secs)
    }

    pub fn vcs(&self) -> Duration {
        Duration::from_secs(self.vcs_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_parse_secs() -> u64 {
    60
}

fn default_vcs_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl InfragenConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Load configuration and resolve the policy file, relative to the
    /// configuration file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(policy_file) = &config.policy_file {
            let policy_path = if policy_file.is_absolute() {
                policy_file.clone()
            } else {
                base_dir.join(policy_file)
            };

            if !policy_path.exists() {
                return Err(ConfigError::Config(format!(
                    "policy file not found: {}",
                    policy_path.display()
                )));
            }
            config.policy = PolicyRuleSet::from_file(&policy_path)?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InfragenConfig::from_yaml("project: demo\n").unwrap();
        assert_eq!(config.project.as_deref(), Some("demo"));
        assert_eq!(config.parser, ParserConfig::Structured);
        assert_eq!(config.timeouts.parse(), Duration::from_secs(60));
        assert_eq!(config.vcs.base_branch, "main");
        assert!(config.vcs.backend.is_none());
    }

    #[test]
    fn test_parser_and_vcs_sections() {
        let yaml = r#"
parser:
  kind: command
  command: "llm --model small"
vcs:
  backend:
    kind: github
    owner: acme
    repo: infrastructure
  labels: [needs-review]
timeouts:
  vcs_secs: 10
"#;
        let config = InfragenConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.parser,
            ParserConfig::Command {
                command: "llm --model small".into()
            }
        );
        let Some(VcsBackend::Github(github)) = &config.vcs.backend else {
            panic!("expected github backend");
        };
        assert_eq!(github.token_env, "GITHUB_TOKEN");
        assert_eq!(config.vcs.labels, vec!["needs-review"]);
        assert_eq!(config.timeouts.vcs_secs, 10);
        assert_eq!(config.timeouts.parse_secs, 60);
    }

    #[test]
    fn test_load_with_context_resolves_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("policies.yaml"),
            "organization: acme\ntags:\n  required: [Owner]\n",
        )
        .unwrap();
        let config_path = dir.path().join("infragen.yaml");
        fs::write(&config_path, "policy_file: policies.yaml\n").unwrap();

        let config = InfragenConfig::load_with_context(&config_path).unwrap();
        assert_eq!(config.policy.organization, "acme");
        assert_eq!(config.policy.tags.required, vec!["Owner"]);
    }

    #[test]
    fn test_load_with_context_missing_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("infragen.yaml");
        fs::write(&config_path, "policy_file: missing.yaml\n").unwrap();

        let err = InfragenConfig::load_with_context(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }
}
