//! Resource specifications.
//!
//! A [`ResourceSpec`] is the normalized description of one piece of
//! infrastructure: what kind of resource it is, what it is called, which
//! environment it belongs to, and a free-form attribute map. Specs are
//! validated once at construction and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Attribute values are kept as JSON so unknown keys survive untouched.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Attribute holding the application component of the naming pattern.
pub const APPLICATION_ATTRIBUTE: &str = "application";

/// Attribute holding explicit resource tags.
pub const TAGS_ATTRIBUTE: &str = "tags";

// =============================================================================
// Resource type
// =============================================================================

/// Kind of infrastructure resource.
///
/// This is an open set: the built-in kinds are exposed as constants, and
/// anything else is carried through verbatim so that new templates can be
/// registered without touching this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourceType(String);

impl ResourceType {
    pub const OBJECT_STORAGE: &'static str = "object_storage";
    pub const RELATIONAL_DATABASE: &'static str = "relational_database";
    pub const CONTAINER_CLUSTER: &'static str = "container_cluster";

    /// Create a resource type, normalizing case and well-known aliases.
    pub fn new(value: impl AsRef<str>) -> Self {
        let lowered = value.as_ref().trim().to_ascii_lowercase().replace('-', "_");
        let canonical = match lowered.as_str() {
            "s3" | "bucket" | "object_store" | "storage_bucket" => Self::OBJECT_STORAGE,
            "rds" | "database" | "db" | "relational_db" => Self::RELATIONAL_DATABASE,
            "eks" | "cluster" | "kubernetes" | "k8s" | "kubernetes_cluster" => {
                Self::CONTAINER_CLUSTER
            }
            other => return Self(other.to_string()),
        };
        Self(canonical.to_string())
    }

    pub fn object_storage() -> Self {
        Self(Self::OBJECT_STORAGE.to_string())
    }

    pub fn relational_database() -> Self {
        Self(Self::RELATIONAL_DATABASE.to_string())
    }

    pub fn container_cluster() -> Self {
        Self(Self::CONTAINER_CLUSTER.to_string())
    }

    /// The built-in resource types, in display order.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::object_storage(),
            Self::relational_database(),
            Self::container_cluster(),
        ]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(alias = "development")]
    Dev,
    Staging,
    #[serde(alias = "production")]
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Staging, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(SpecError::InvalidEnvironment(other.to_string())),
        }
    }
}

// =============================================================================
// Resource specification
// =============================================================================

/// Errors raised while constructing a [`ResourceSpec`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("invalid resource name '{0}': expected lowercase letters and digits separated by single hyphens")]
    InvalidName(String),

    #[error("invalid environment '{0}': expected one of dev, staging, prod")]
    InvalidEnvironment(String),

    #[error("attribute '{0}' must be a map of strings")]
    InvalidTags(String),
}

/// Wire shape used for deserialization before validation.
#[derive(Deserialize)]
struct RawResourceSpec {
    resource_type: ResourceType,
    resource_name: String,
    environment: Environment,
    #[serde(default, alias = "parameters")]
    attributes: Attributes,
}

/// Normalized description of a single infrastructure resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResourceSpec")]
pub struct ResourceSpec {
    resource_type: ResourceType,
    resource_name: String,
    environment: Environment,
    attributes: Attributes,
}

impl TryFrom<RawResourceSpec> for ResourceSpec {
    type Error = SpecError;

    fn try_from(raw: RawResourceSpec) -> Result<Self, Self::Error> {
        ResourceSpec::new(
            raw.resource_type,
            raw.resource_name,
            raw.environment,
            raw.attributes,
        )
    }
}

impl ResourceSpec {
    /// Build a validated spec.
    pub fn new(
        resource_type: impl Into<ResourceType>,
        resource_name: impl Into<String>,
        environment: Environment,
        attributes: Attributes,
    ) -> Result<Self, SpecError> {
        let resource_name = resource_name.into();
        if !is_valid_resource_name(&resource_name) {
            return Err(SpecError::InvalidName(resource_name));
        }
        if let Some(tags) = attributes.get(TAGS_ATTRIBUTE) {
            if !tags.is_object() {
                return Err(SpecError::InvalidTags(TAGS_ATTRIBUTE.to_string()));
            }
        }

        Ok(Self {
            resource_type: resource_type.into(),
            resource_name,
            environment,
            attributes,
        })
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Application component used for naming, falling back to the resource name.
    pub fn application(&self) -> &str {
        self.attributes
            .get(APPLICATION_ATTRIBUTE)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.resource_name)
    }

    /// Explicit tags supplied with the spec, stringified.
    pub fn explicit_tags(&self) -> BTreeMap<String, String> {
        let Some(serde_json::Value::Object(map)) = self.attributes.get(TAGS_ATTRIBUTE) else {
            return BTreeMap::new();
        };
        map.iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// Return a copy of this spec targeting another environment.
    pub fn with_environment(&self, environment: Environment) -> Self {
        Self {
            environment,
            ..self.clone()
        }
    }
}

/// Resource names are lowercase alphanumeric words joined by single hyphens.
pub fn is_valid_resource_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('-').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_type_aliases() {
        assert_eq!(ResourceType::new("S3"), ResourceType::object_storage());
        assert_eq!(ResourceType::new("rds"), ResourceType::relational_database());
        assert_eq!(ResourceType::new("eks"), ResourceType::container_cluster());
        assert_eq!(
            ResourceType::new("message-queue").as_str(),
            "message_queue"
        );
    }

    #[test]
    fn test_resource_name_rules() {
        assert!(is_valid_resource_name("logs"));
        assert!(is_valid_resource_name("payments-db-2"));
        assert!(!is_valid_resource_name(""));
        assert!(!is_valid_resource_name("Logs"));
        assert!(!is_valid_resource_name("logs--archive"));
        assert!(!is_valid_resource_name("-logs"));
        assert!(!is_valid_resource_name("logs_archive"));
    }

    #[test]
    fn test_spec_rejects_bad_name() {
        let err = ResourceSpec::new(
            ResourceType::object_storage(),
            "My Bucket",
            Environment::Dev,
            Attributes::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidName(_)));
    }

    #[test]
    fn test_spec_deserializes_and_keeps_unknown_attributes() {
        let spec: ResourceSpec = serde_json::from_value(json!({
            "resource_type": "s3",
            "resource_name": "logs",
            "environment": "production",
            "parameters": {"retention_days": 90, "owner_notes": "keep"}
        }))
        .unwrap();

        assert_eq!(spec.resource_type(), &ResourceType::object_storage());
        assert_eq!(spec.environment(), Environment::Prod);
        assert_eq!(spec.attribute("owner_notes"), Some(&json!("keep")));
    }

    #[test]
    fn test_spec_deserialize_validates_name() {
        let result: Result<ResourceSpec, _> = serde_json::from_value(json!({
            "resource_type": "object_storage",
            "resource_name": "Bad_Name",
            "environment": "dev"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_application_falls_back_to_resource_name() {
        let mut attributes = Attributes::new();
        let spec = ResourceSpec::new(
            ResourceType::object_storage(),
            "logs",
            Environment::Dev,
            attributes.clone(),
        )
        .unwrap();
        assert_eq!(spec.application(), "logs");

        attributes.insert(APPLICATION_ATTRIBUTE.to_string(), json!("billing"));
        let spec = ResourceSpec::new(
            ResourceType::object_storage(),
            "logs",
            Environment::Dev,
            attributes,
        )
        .unwrap();
        assert_eq!(spec.application(), "billing");
    }

    #[test]
    fn test_explicit_tags_stringify_values() {
        let mut attributes = Attributes::new();
        attributes.insert(
            TAGS_ATTRIBUTE.to_string(),
            json!({"CostCenter": 1234, "Owner": "data"}),
        );
        let spec = ResourceSpec::new(
            ResourceType::object_storage(),
            "logs",
            Environment::Dev,
            attributes,
        )
        .unwrap();

        let tags = spec.explicit_tags();
        assert_eq!(tags.get("CostCenter").map(String::as_str), Some("1234"));
        assert_eq!(tags.get("Owner").map(String::as_str), Some("data"));
    }

    #[test]
    fn test_with_environment_leaves_original_untouched() {
        let spec = ResourceSpec::new(
            ResourceType::object_storage(),
            "logs",
            Environment::Dev,
            Attributes::new(),
        )
        .unwrap();
        let prod = spec.with_environment(Environment::Prod);
        assert_eq!(spec.environment(), Environment::Dev);
        assert_eq!(prod.environment(), Environment::Prod);
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("qa".parse::<Environment>().is_err());
    }
}
