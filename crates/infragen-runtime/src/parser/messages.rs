//! Parser backed by a hosted messages-style completion endpoint.

use super::prompt::system_prompt;
use super::{ParseError, ResourceParser, spec_from_answer};
use async_trait::async_trait;
use infragen_core::config::{MessagesApiConfig, PolicyRuleSet};
use infragen_core::{ResourceSpec, ResourceType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct MessagesApiParser {
    client: reqwest::Client,
    config: MessagesApiConfig,
    api_key: String,
    system: String,
}

impl MessagesApiParser {
    /// Reads the API key from the configured environment variable.
    pub fn new(
        config: MessagesApiConfig,
        policy: Arc<PolicyRuleSet>,
        resource_types: Vec<ResourceType>,
    ) -> Result<Self, ParseError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ParseError::Service(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Ok(Self::with_api_key(config, api_key, &policy, &resource_types))
    }

    pub fn with_api_key(
        config: MessagesApiConfig,
        api_key: impl Into<String>,
        policy: &PolicyRuleSet,
        resource_types: &[ResourceType],
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
            system: system_prompt(policy, resource_types),
        }
    }
}

#[async_trait]
impl ResourceParser for MessagesApiParser {
    fn kind(&self) -> &'static str {
        "messages_api"
    }

    async fn parse(&self, text: &str) -> Result<ResourceSpec, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Ambiguous("request text is empty".to_string()));
        }

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            system: &self.system,
            messages: vec![Message {
                role: "user",
                content: text,
            }],
        };

        tracing::debug!(model = %self.config.model, endpoint = %self.config.endpoint, "calling messages API");
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParseError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ParseError::Service(format!("{}: {}", status, detail.trim())));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ParseError::InvalidResponse(e.to_string()))?;
        let answer = response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| ParseError::InvalidResponse("answer contains no text".to_string()))?;

        spec_from_answer(&answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = MessagesRequest {
            model: "small",
            max_tokens: 512,
            temperature: 0.0,
            system: "be terse",
            messages: vec![Message {
                role: "user",
                content: "a bucket",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "small");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "a bucket");
    }

    #[test]
    fn test_response_text_block() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "{\"error\": \"ambiguous\"}"}]}"#,
        )
        .unwrap();
        assert_eq!(response.content[0].kind, "text");
    }

    #[test]
    fn test_missing_api_key() {
        let config = MessagesApiConfig {
            endpoint: "http://127.0.0.1:9".into(),
            model: "small".into(),
            api_key_env: "INFRAGEN_TEST_UNSET_API_KEY".into(),
            max_tokens: 16,
            api_version: "2023-06-01".into(),
        };
        let result = MessagesApiParser::new(config, Arc::new(PolicyRuleSet::default()), vec![]);
        assert!(matches!(result, Err(ParseError::Service(_))));
    }
}
