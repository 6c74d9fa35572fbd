//! Parser backed by a local command.
//!
//! The command receives the system prompt and the request on stdin and must
//! print its JSON answer on stdout. A non-zero exit is a service failure.

use super::prompt::{command_prompt, system_prompt};
use super::{ParseError, ResourceParser, spec_from_answer};
use async_trait::async_trait;
use infragen_core::config::PolicyRuleSet;
use infragen_core::{ResourceSpec, ResourceType};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct CommandParser {
    program: String,
    args: Vec<String>,
    system: String,
}

impl CommandParser {
    /// Split `command` with shell quoting rules.
    pub fn new(
        command: &str,
        policy: Arc<PolicyRuleSet>,
        resource_types: Vec<ResourceType>,
    ) -> Result<Self, ParseError> {
        let mut words = shell_words::split(command)
            .map_err(|e| ParseError::Service(format!("invalid parser command '{}': {}", command, e)))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| ParseError::Service("parser command is empty".to_string()))?;

        Ok(Self {
            program,
            args: words.collect(),
            system: system_prompt(&policy, &resource_types),
        })
    }
}

#[async_trait]
impl ResourceParser for CommandParser {
    fn kind(&self) -> &'static str {
        "command"
    }

    async fn parse(&self, text: &str) -> Result<ResourceSpec, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Ambiguous("request text is empty".to_string()));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ParseError::Service(format!("failed to start '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = command_prompt(&self.system, text);
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| ParseError::Service(format!("failed to write prompt: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ParseError::Service(format!("'{}' failed: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParseError::Service(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(program = %self.program, bytes = stdout.len(), "parser command answered");
        spec_from_answer(&stdout)
    }
}
