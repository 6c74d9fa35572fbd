//! Per-render context: canonical naming, tag merging and policy defaults.

use crate::error::RenderError;
use crate::hcl::{Expr, local_name};
use infragen_core::config::PolicyRuleSet;
use infragen_core::resource::{APPLICATION_ATTRIBUTE, TAGS_ATTRIBUTE};
use infragen_core::{Attributes, Environment, RenderedBundle, ResourceSpec, ResourceType};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tag derived from the spec's environment.
pub const ENVIRONMENT_TAG: &str = "Environment";

/// Attribute names that security defaults are written to.
pub mod attrs {
    pub const ENCRYPTED: &str = "encrypted";
    pub const ENCRYPTION_ALGORITHM: &str = "encryption_algorithm";
    pub const PUBLIC_ACCESS_BLOCK: &str = "public_access_block";
    pub const VERSIONING: &str = "versioning";
    pub const BACKUP_DAYS: &str = "backup_days";
    pub const ENGINE: &str = "engine";
    pub const ENGINE_VERSION: &str = "engine_version";
    pub const KUBERNETES_VERSION: &str = "kubernetes_version";
    pub const PRIVATE_ENDPOINT: &str = "private_endpoint";
}

/// Everything a template needs to render one resource.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    spec: &'a ResourceSpec,
    policy: &'a PolicyRuleSet,
    canonical_name: String,
    local_name: String,
    tags: BTreeMap<String, String>,
    attributes: Attributes,
}

impl<'a> RenderContext<'a> {
    pub fn new(spec: &'a ResourceSpec, policy: &'a PolicyRuleSet) -> Self {
        let canonical_name = canonical_name(
            &policy.naming.pattern,
            spec.environment(),
            spec.application(),
            spec.resource_name(),
        );
        Self {
            spec,
            policy,
            canonical_name,
            local_name: local_name(spec.resource_name()),
            tags: merge_tags(spec, policy),
            attributes: effective_attributes(spec, policy),
        }
    }

    pub fn spec(&self) -> &ResourceSpec {
        self.spec
    }

    pub fn policy(&self) -> &PolicyRuleSet {
        self.policy
    }

    pub fn resource_type(&self) -> &ResourceType {
        self.spec.resource_type()
    }

    pub fn environment(&self) -> Environment {
        self.spec.environment()
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Terraform local name for the primary resource.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Tags as an HCL map expression.
    pub fn tags_expr(&self) -> Expr {
        Expr::Map(
            self.tags
                .iter()
                .map(|(k, v)| (k.clone(), Expr::Str(v.clone())))
                .collect(),
        )
    }

    /// Attributes after policy defaults were applied.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn directory_path(&self) -> String {
        RenderedBundle::directory_for(
            self.environment(),
            self.resource_type(),
            &self.canonical_name,
        )
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn string(&self, key: &str) -> Result<Option<String>, RenderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    pub fn u64(&self, key: &str) -> Result<Option<u64>, RenderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a non-negative integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| self.invalid(key, "a non-negative integer")),
            Some(_) => Err(self.invalid(key, "a non-negative integer")),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, RenderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "enabled" | "on" => Ok(Some(true)),
                "false" | "no" | "disabled" | "off" => Ok(Some(false)),
                _ => Err(self.invalid(key, "a boolean")),
            },
            Some(_) => Err(self.invalid(key, "a boolean")),
        }
    }

    /// A list of strings; a single string is accepted as a one-element list.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, RenderError> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(key, "a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(self.invalid(key, "a list of strings")),
        }
    }

    pub fn require_u64(&self, key: &str) -> Result<u64, RenderError> {
        self.u64(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn missing(&self, key: &str) -> RenderError {
        RenderError::MissingRequiredAttribute {
            resource_type: self.resource_type().clone(),
            attribute: key.to_string(),
        }
    }

    fn invalid(&self, key: &str, expected: &'static str) -> RenderError {
        RenderError::InvalidAttribute {
            resource_type: self.resource_type().clone(),
            attribute: key.to_string(),
            expected,
        }
    }
}

/// Substitute `{environment}`, `{application}` and `{resource}` into a
/// naming pattern. Substitution is exact; no case folding is applied.
pub fn canonical_name(
    pattern: &str,
    environment: Environment,
    application: &str,
    resource: &str,
) -> String {
    pattern
        .replace("{environment}", environment.as_str())
        .replace("{application}", application)
        .replace("{resource}", resource)
}

/// Policy default tags, then the derived environment tag, then explicit tags.
pub fn merge_tags(spec: &ResourceSpec, policy: &PolicyRuleSet) -> BTreeMap<String, String> {
    let mut tags = policy.tags.defaults.clone();
    tags.insert(
        ENVIRONMENT_TAG.to_string(),
        spec.environment().as_str().to_string(),
    );
    tags.extend(spec.explicit_tags());
    tags
}

/// Spec attributes with policy security defaults filling the gaps.
///
/// Explicit values are never overridden, including explicit `false`.
pub fn effective_attributes(spec: &ResourceSpec, policy: &PolicyRuleSet) -> Attributes {
    let mut attributes = spec.attributes().clone();
    attributes.remove(TAGS_ATTRIBUTE);
    attributes.remove(APPLICATION_ATTRIBUTE);

    let Some(rules) = policy.security_rules_for(spec.resource_type()) else {
        return attributes;
    };

    let mut fill = |key: &str, value: Value| {
        let absent = attributes.get(key).is_none_or(Value::is_null);
        if absent {
            attributes.insert(key.to_string(), value);
        }
    };

    if rules.encryption_required {
        fill(attrs::ENCRYPTED, Value::Bool(true));
    }
    if let Some(algorithm) = &rules.encryption_algorithm {
        fill(attrs::ENCRYPTION_ALGORITHM, Value::String(algorithm.clone()));
    }
    if rules.public_access_block {
        fill(attrs::PUBLIC_ACCESS_BLOCK, Value::Bool(true));
    }
    if rules.versioning_required {
        fill(attrs::VERSIONING, Value::Bool(true));
    }
    if let Some(days) = rules.min_backup_days {
        fill(attrs::BACKUP_DAYS, Value::from(days));
    }
    if let Some(engine) = rules.allowed_engines.first() {
        fill(attrs::ENGINE, Value::String(engine.clone()));
    }
    if let Some(version) = rules.allowed_versions.first() {
        let key = if spec.resource_type().as_str() == ResourceType::CONTAINER_CLUSTER {
            attrs::KUBERNETES_VERSION
        } else {
            attrs::ENGINE_VERSION
        };
        fill(key, Value::String(version.clone()));
    }
    if rules.private_endpoint {
        fill(attrs::PRIVATE_ENDPOINT, Value::Bool(true));
    }
    for (key, value) in &rules.defaults {
        fill(key, value.clone());
    }

    attributes
}
