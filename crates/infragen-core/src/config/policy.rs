//! Organizational policy configuration (policies.yaml).
//!
//! A [`PolicyRuleSet`] is loaded once at startup and shared read-only. It
//! drives both the renderer (naming, tag defaults, security defaults) and the
//! compliance validator (required tags, security rules, enforcement).
//!
//! # Example
//!
//! ```yaml
//! organization: acme
//! naming:
//!   pattern: "{environment}-{application}-{resource}"
//! tags:
//!   required: [Environment, Owner, CostCenter]
//!   defaults:
//!     Owner: platform-team
//! security_rules:
//!   relational_database:
//!     encryption_required: true
//!     min_backup_days: 7
//!     allowed_engines: [postgres, mysql]
//! enforcement:
//!   default: mandatory
//!   rules:
//!     naming.pattern: advisory
//! ```

use super::ConfigError;
use crate::report::Severity;
use crate::resource::{Attributes, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Placeholders recognized in naming patterns.
pub const NAMING_PLACEHOLDERS: [&str; 3] = ["{environment}", "{application}", "{resource}"];

/// Complete policy rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    /// Organization name, used for backend state naming.
    #[serde(default = "default_organization")]
    pub organization: String,

    #[serde(default)]
    pub naming: NamingPolicy,

    #[serde(default)]
    pub tags: TagPolicy,

    /// Security rules keyed by resource type.
    #[serde(default)]
    pub security_rules: BTreeMap<ResourceType, SecurityRules>,

    #[serde(default)]
    pub enforcement: EnforcementPolicy,

    #[serde(default)]
    pub provider: ProviderPolicy,

    #[serde(default)]
    pub backend: BackendPolicy,
}

impl Default for PolicyRuleSet {
    fn default() -> Self {
        Self {
            organization: default_organization(),
            naming: NamingPolicy::default(),
            tags: TagPolicy::default(),
            security_rules: BTreeMap::new(),
            enforcement: EnforcementPolicy::default(),
            provider: ProviderPolicy::default(),
            backend: BackendPolicy::default(),
        }
    }
}

/// Resource naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPolicy {
    #[serde(default = "default_naming_pattern")]
    pub pattern: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            pattern: default_naming_pattern(),
        }
    }
}

/// Tagging requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPolicy {
    /// Tag keys every resource must carry.
    #[serde(default)]
    pub required: Vec<String>,

    /// Tag values applied when a spec does not set them.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// Security rules for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityRules {
    #[serde(default)]
    pub encryption_required: bool,

    /// Server-side encryption algorithm applied by default (object storage).
    #[serde(default)]
    pub encryption_algorithm: Option<String>,

    #[serde(default)]
    pub public_access_block: bool,

    #[serde(default)]
    pub versioning_required: bool,

    /// Minimum backup retention in days (inclusive).
    #[serde(default)]
    pub min_backup_days: Option<u32>,

    /// Allowed engines, compared case-insensitively.
    #[serde(default)]
    pub allowed_engines: Vec<String>,

    /// Allowed engine or platform versions.
    #[serde(default)]
    pub allowed_versions: Vec<String>,

    #[serde(default)]
    pub min_nodes: Option<u32>,

    #[serde(default)]
    pub private_endpoint: bool,

    /// Attribute defaults filled in when a spec leaves them out.
    #[serde(default)]
    pub defaults: Attributes,
}

/// How strictly a rule is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Violations are errors and block provisioning.
    #[default]
    Mandatory,
    /// Violations are reported as warnings.
    Advisory,
}

impl Enforcement {
    pub fn severity(&self) -> Severity {
        match self {
            Enforcement::Mandatory => Severity::Error,
            Enforcement::Advisory => Severity::Warning,
        }
    }
}

/// Per-rule enforcement levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementPolicy {
    #[serde(default)]
    pub default: Enforcement,

    /// Overrides keyed by rule id (e.g. `naming.pattern`).
    #[serde(default)]
    pub rules: BTreeMap<String, Enforcement>,
}

/// Terraform provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPolicy {
    #[serde(default = "default_region")]
    pub region: String,

    /// Version constraint for the AWS provider.
    #[serde(default = "default_provider_version")]
    pub version: String,

    #[serde(default = "default_terraform_version")]
    pub terraform_version: String,
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            region: default_region(),
            version: default_provider_version(),
            terraform_version: default_terraform_version(),
        }
    }
}

/// Remote state backend settings. Unset names derive from the organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPolicy {
    #[serde(default)]
    pub state_bucket: Option<String>,

    #[serde(default)]
    pub lock_table: Option<String>,

    #[serde(default)]
    pub region: Option<String>,
}

impl PolicyRuleSet {
    /// Load a policy from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a policy from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let policy: Self = serde_yaml::from_str(content)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check internal consistency of the policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pattern = self.naming.pattern.trim();
        if pattern.is_empty() {
            return Err(ConfigError::Config(
                "naming.pattern must not be empty".to_string(),
            ));
        }

        let mut rest = pattern;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                return Err(ConfigError::Config(format!(
                    "naming.pattern has an unterminated placeholder: {}",
                    pattern
                )));
            };
            let placeholder = &rest[start..start + len + 1];
            if !NAMING_PLACEHOLDERS.contains(&placeholder) {
                return Err(ConfigError::Config(format!(
                    "naming.pattern uses unknown placeholder {} (expected one of {})",
                    placeholder,
                    NAMING_PLACEHOLDERS.join(", ")
                )));
            }
            rest = &rest[start + len + 1..];
        }

        if self.tags.required.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Config(
                "tags.required must not contain empty keys".to_string(),
            ));
        }

        if self.organization.trim().is_empty() {
            return Err(ConfigError::Config(
                "organization must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Security rules for a resource type, if any are configured.
    pub fn security_rules_for(&self, resource_type: &ResourceType) -> Option<&SecurityRules> {
        self.security_rules.get(resource_type)
    }

    /// Enforcement level of a rule.
    pub fn enforcement_for(&self, rule_id: &str) -> Enforcement {
        self.enforcement
            .rules
            .get(rule_id)
            .copied()
            .unwrap_or(self.enforcement.default)
    }

    /// Severity a violation of `rule_id` is reported with.
    pub fn severity_for(&self, rule_id: &str) -> Severity {
        self.enforcement_for(rule_id).severity()
    }

    pub fn state_bucket(&self) -> String {
        self.backend
            .state_bucket
            .clone()
            .unwrap_or_else(|| format!("{}-terraform-state", self.organization))
    }

    pub fn lock_table(&self) -> String {
        self.backend
            .lock_table
            .clone()
            .unwrap_or_else(|| format!("{}-terraform-locks", self.organization))
    }

    pub fn backend_region(&self) -> &str {
        self.backend
            .region
            .as_deref()
            .unwrap_or(&self.provider.region)
    }
}

fn default_organization() -> String {
    "infragen".to_string()
}

fn default_naming_pattern() -> String {
    "{environment}-{application}-{resource}".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_provider_version() -> String {
    "~> 5.0".to_string()
}

fn default_terraform_version() -> String {
    ">= 1.5.0".to_string()
}
