//! Turning raw request text into a [`ResourceSpec`].
//!
//! Three parsers are available, selected by [`ParserConfig`]:
//!
//! - [`StructuredParser`]: the text is itself a YAML or JSON spec
//! - [`CommandParser`]: a local command receives a prompt on stdin
//! - [`MessagesApiParser`]: a hosted messages-style completion endpoint
//!
//! Model-backed parsers answer with JSON. Besides a spec, the answer may be an
//! `{"error": "...", "message": "..."}` object refusing the request.

mod command;
mod messages;
pub mod prompt;
mod structured;

pub use command::CommandParser;
pub use messages::MessagesApiParser;
pub use structured::StructuredParser;

use async_trait::async_trait;
use infragen_core::config::{ParserConfig, PolicyRuleSet};
use infragen_core::resource::TAGS_ATTRIBUTE;
use infragen_core::{ResourceSpec, ResourceType};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Why a request could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("request is ambiguous: {0}")]
    Ambiguous(String),

    #[error("parser returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("parser service failed: {0}")]
    Service(String),
}

impl ParseError {
    /// Whether the request itself is at fault, as opposed to the parser.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ParseError::UnsupportedResourceType(_) | ParseError::Ambiguous(_)
        )
    }
}

/// Parses raw request text into a resource spec.
#[async_trait]
pub trait ResourceParser: Send + Sync {
    /// Short name reported by health checks.
    fn kind(&self) -> &'static str;

    async fn parse(&self, text: &str) -> Result<ResourceSpec, ParseError>;
}

/// Build the parser selected in the configuration.
pub fn from_config(
    config: &ParserConfig,
    policy: Arc<PolicyRuleSet>,
    resource_types: Vec<ResourceType>,
) -> Result<Arc<dyn ResourceParser>, ParseError> {
    let parser: Arc<dyn ResourceParser> = match config {
        ParserConfig::Structured => Arc::new(StructuredParser::new()),
        ParserConfig::Command { command } => {
            Arc::new(CommandParser::new(command, policy, resource_types)?)
        }
        ParserConfig::MessagesApi(api) => {
            Arc::new(MessagesApiParser::new(api.clone(), policy, resource_types)?)
        }
    };
    Ok(parser)
}

/// Strip markdown code fences and surrounding prose from a model answer.
pub fn extract_json(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (`json`) on the opening fence.
        body = rest.split_once('\n').map_or("", |(_, rest)| rest);
        body = body.trim_end();
        body = body.strip_suffix("```").unwrap_or(body).trim();
    }
    if !body.starts_with('{')
        && let (Some(start), Some(end)) = (body.find('{'), body.rfind('}'))
        && start < end
    {
        body = &body[start..=end];
    }
    body
}

/// Decode a parser answer into a spec.
///
/// Top-level `tags` are folded into the attributes. An `error` field turns the
/// answer into the matching [`ParseError`].
pub fn spec_from_value(mut value: Value) -> Result<ResourceSpec, ParseError> {
    let Some(object) = value.as_object_mut() else {
        return Err(ParseError::InvalidResponse(
            "expected a JSON object".to_string(),
        ));
    };

    if let Some(error) = object.get("error").and_then(Value::as_str) {
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(error)
            .to_string();
        return Err(match error {
            "unsupported_resource_type" => ParseError::UnsupportedResourceType(message),
            "ambiguous" => ParseError::Ambiguous(message),
            other => ParseError::InvalidResponse(format!("{}: {}", other, message)),
        });
    }

    if let Some(tags) = object.remove(TAGS_ATTRIBUTE) {
        let attributes = object
            .entry("attributes")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(attributes) = attributes.as_object_mut() {
            attributes.entry(TAGS_ATTRIBUTE).or_insert(tags);
        }
    }

    serde_json::from_value(value).map_err(|e| ParseError::InvalidResponse(e.to_string()))
}

/// Decode model output text: fences stripped, JSON parsed, spec built.
pub fn spec_from_answer(answer: &str) -> Result<ResourceSpec, ParseError> {
    let json = extract_json(answer);
    let value: Value = serde_json::from_str(json).map_err(|e| {
        let preview: String = answer.chars().take(200).collect();
        ParseError::InvalidResponse(format!("{} (answer: {})", e, preview))
    })?;
    spec_from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragen_core::Environment;
    use serde_json::json;

    #[test]
    fn test_extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{}\n```\n"), "{}");
        assert_eq!(extract_json("Here you go: {\"a\": 1} done"), "{\"a\": 1}");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_spec_from_value_folds_tags() {
        let spec = spec_from_value(json!({
            "resource_type": "rds",
            "resource_name": "payments-db",
            "environment": "production",
            "parameters": {"storage_gb": 200},
            "tags": {"CostCenter": "cc-42"}
        }))
        .unwrap();

        assert_eq!(spec.resource_type(), &ResourceType::relational_database());
        assert_eq!(spec.environment(), Environment::Prod);
        assert_eq!(spec.attribute("storage_gb"), Some(&json!(200)));
        assert_eq!(spec.explicit_tags()["CostCenter"], "cc-42");
    }

    #[test]
    fn test_refusals_map_to_errors() {
        let err = spec_from_value(json!({
            "error": "unsupported_resource_type",
            "message": "message queues are not supported"
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnsupportedResourceType("message queues are not supported".into())
        );
        assert!(err.is_input_error());

        let err = spec_from_value(json!({"error": "ambiguous"})).unwrap_err();
        assert_eq!(err, ParseError::Ambiguous("ambiguous".into()));
    }

    #[test]
    fn test_invalid_answers() {
        assert!(matches!(
            spec_from_answer("not json at all"),
            Err(ParseError::InvalidResponse(_))
        ));
        assert!(matches!(
            spec_from_value(json!({"resource_type": "s3"})),
            Err(ParseError::InvalidResponse(_))
        ));
        assert!(matches!(
            spec_from_value(json!([1, 2])),
            Err(ParseError::InvalidResponse(_))
        ));
    }
}
