//! Parser for requests that already are a spec.

use super::{ParseError, ResourceParser, spec_from_value};
use async_trait::async_trait;
use infragen_core::ResourceSpec;
use serde_json::Value;

/// Reads the request text as a YAML or JSON resource spec.
#[derive(Debug, Clone, Default)]
pub struct StructuredParser;

impl StructuredParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceParser for StructuredParser {
    fn kind(&self) -> &'static str {
        "structured"
    }

    async fn parse(&self, text: &str) -> Result<ResourceSpec, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Ambiguous("request text is empty".to_string()));
        }

        // JSON is valid YAML, so one decoder covers both.
        let value: Value = serde_yaml::from_str(text).map_err(|e| {
            ParseError::Ambiguous(format!("request is not a YAML or JSON spec: {}", e))
        })?;
        if !value.is_object() {
            return Err(ParseError::Ambiguous(
                "request is not a YAML or JSON spec".to_string(),
            ));
        }

        spec_from_value(value).map_err(|e| match e {
            ParseError::InvalidResponse(message) => ParseError::Ambiguous(message),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragen_core::{Environment, ResourceType};

    #[tokio::test]
    async fn test_parses_yaml() {
        let spec = StructuredParser::new()
            .parse(
                r#"
resource_type: eks
resource_name: platform
environment: staging
attributes:
  node_count: 5
"#,
            )
            .await
            .unwrap();
        assert_eq!(spec.resource_type(), &ResourceType::container_cluster());
        assert_eq!(spec.environment(), Environment::Staging);
        assert_eq!(spec.attribute("node_count"), Some(&serde_json::json!(5)));
    }

    #[tokio::test]
    async fn test_parses_json() {
        let spec = StructuredParser::new()
            .parse(r#"{"resource_type": "s3", "resource_name": "logs", "environment": "dev"}"#)
            .await
            .unwrap();
        assert_eq!(spec.resource_name(), "logs");
    }

    #[tokio::test]
    async fn test_free_text_is_ambiguous() {
        let parser = StructuredParser::new();
        assert!(matches!(
            parser.parse("I need a bucket please").await,
            Err(ParseError::Ambiguous(_))
        ));
        assert!(matches!(parser.parse("   ").await, Err(ParseError::Ambiguous(_))));
        assert!(matches!(
            parser
                .parse("resource_type: s3\nresource_name: Bad Name\nenvironment: dev\n")
                .await,
            Err(ParseError::Ambiguous(_))
        ));
    }
}
