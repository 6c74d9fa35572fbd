//! Request parser configuration.

use serde::{Deserialize, Serialize};

/// Which parser turns raw request text into a resource spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParserConfig {
    /// Raw text is itself a YAML or JSON resource spec.
    #[default]
    Structured,

    /// Run a local command; the prompt goes to stdin, JSON comes back on stdout.
    Command {
        /// Command line, split with shell quoting rules.
        command: String,
    },

    /// Call a hosted messages-style completion endpoint.
    MessagesApi(MessagesApiConfig),
}

impl ParserConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ParserConfig::Structured => "structured",
            ParserConfig::Command { .. } => "command",
            ParserConfig::MessagesApi(_) => "messages_api",
        }
    }
}

/// Settings for the hosted completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}
