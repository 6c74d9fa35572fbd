use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Allow cross-origin requests from any origin.
    #[serde(default = "default_cors")]
    pub permissive_cors: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            permissive_cors: default_cors(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Path to infragen.yaml. Without it the server runs with the default
    /// policy, the structured parser and no version control.
    #[serde(default)]
    pub config: Option<PathBuf>,
}

/// Load `config.toml`, or `INFRAGEN_SERVER_CONFIG` when set.
///
/// A missing default file yields the default configuration; an explicitly
/// named file must exist.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let (path, explicit) = config_path();
    if !explicit && !path.exists() {
        tracing::info!(path = %path.display(), "no server config file, using defaults");
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(&path)?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(raw)?;
    Ok(cfg)
}

fn config_path() -> (PathBuf, bool) {
    if let Ok(p) = env::var("INFRAGEN_SERVER_CONFIG") {
        return (PathBuf::from(p), true);
    }
    (PathBuf::from("config.toml"), false)
}
