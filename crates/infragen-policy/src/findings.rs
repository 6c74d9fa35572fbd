//! Finding construction.
//!
//! Every rule violation becomes exactly one [`Finding`]. Its severity comes
//! from the policy's enforcement level for the rule, except for values that
//! cannot be checked statically, which are always reported as warnings.

use infragen_core::config::PolicyRuleSet;
use infragen_core::{Finding, Severity, ValidationReport};

/// Stable rule identifiers.
pub mod rule_ids {
    pub const REQUIRED_TAGS: &str = "tags.required";
    pub const NAMING: &str = "naming.pattern";
    pub const ENCRYPTION: &str = "security.encryption";
    pub const PUBLIC_ACCESS_BLOCK: &str = "security.public_access_block";
    pub const BACKUP_RETENTION: &str = "security.backup_retention";
    pub const ALLOWED_ENGINES: &str = "security.allowed_engines";
    pub const ALLOWED_VERSIONS: &str = "security.allowed_versions";
    pub const MIN_NODES: &str = "security.min_nodes";
    pub const PRIVATE_ENDPOINT: &str = "security.private_endpoint";
    pub const VERSIONING: &str = "structure.versioning";
    pub const NODE_SCALING: &str = "structure.node_scaling";
    pub const RESOURCES: &str = "structure.resources";
}

use rule_ids::*;

/// Collects findings in rule order.
pub struct Findings<'a> {
    policy: &'a PolicyRuleSet,
    report: ValidationReport,
}

impl<'a> Findings<'a> {
    pub fn new(policy: &'a PolicyRuleSet) -> Self {
        Self {
            policy,
            report: ValidationReport::new(),
        }
    }

    pub fn finish(self) -> ValidationReport {
        self.report
    }

    /// A violated rule, reported at the policy's severity.
    pub fn violation(&mut self, rule_id: &str, resource: Option<&str>, message: String) {
        let severity = self.policy.severity_for(rule_id);
        self.push(severity, rule_id, resource, message);
    }

    /// A value that could not be checked statically.
    pub fn unverifiable(&mut self, rule_id: &str, resource: &str, message: String) {
        self.push(Severity::Warning, rule_id, Some(resource), message);
    }

    fn push(&mut self, severity: Severity, rule_id: &str, resource: Option<&str>, message: String) {
        let mut finding = Finding::new(severity, rule_id, message);
        if let Some(resource) = resource {
            finding = finding.with_resource(resource);
        }
        tracing::debug!(
            rule_id = %finding.rule_id,
            severity = %finding.severity,
            resource = ?finding.resource,
            "policy finding"
        );
        self.report.push(finding);
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    pub fn missing_tag(&mut self, key: &str, resources: &[String]) {
        let resource = (resources.len() == 1).then(|| resources[0].as_str());
        self.violation(
            REQUIRED_TAGS,
            resource,
            format!(
                "Required tag '{}' is missing on {}",
                key,
                resources.join(", ")
            ),
        );
    }

    pub fn unresolved_tags(&mut self, resource: &str) {
        self.unverifiable(
            REQUIRED_TAGS,
            resource,
            format!(
                "Tags of {} are not a literal map; required tags cannot be verified",
                resource
            ),
        );
    }

    // =========================================================================
    // NAMING
    // =========================================================================

    pub fn name_mismatch(&mut self, resource: &str, name: &str, pattern: &str) {
        self.violation(
            NAMING,
            Some(resource),
            format!(
                "Name '{}' of {} does not match naming pattern '{}'",
                name, resource, pattern
            ),
        );
    }

    pub fn name_missing(&mut self, resource: &str, attribute: &str) {
        self.violation(
            NAMING,
            Some(resource),
            format!("{} has no '{}' attribute to check against the naming pattern", resource, attribute),
        );
    }

    // =========================================================================
    // SECURITY
    // =========================================================================

    pub fn encryption_missing(&mut self, resource: &str, detail: &str) {
        self.violation(
            ENCRYPTION,
            Some(resource),
            format!("Encryption is required but {} {}", resource, detail),
        );
    }

    pub fn public_access_not_blocked(&mut self, resource: &str, detail: &str) {
        self.violation(
            PUBLIC_ACCESS_BLOCK,
            Some(resource),
            format!("Public access must be blocked for {}: {}", resource, detail),
        );
    }

    pub fn backup_retention_too_short(&mut self, resource: &str, days: f64, minimum: u32) {
        self.violation(
            BACKUP_RETENTION,
            Some(resource),
            format!(
                "Backup retention of {} days on {} is below the required minimum of {} days",
                days, resource, minimum
            ),
        );
    }

    pub fn engine_not_allowed(&mut self, resource: &str, engine: Option<&str>, allowed: &[String]) {
        let message = match engine {
            Some(engine) => format!(
                "Engine '{}' of {} is not allowed (allowed: {})",
                engine,
                resource,
                allowed.join(", ")
            ),
            None => format!(
                "{} does not set an engine (allowed: {})",
                resource,
                allowed.join(", ")
            ),
        };
        self.violation(ALLOWED_ENGINES, Some(resource), message);
    }

    pub fn version_not_allowed(&mut self, resource: &str, version: Option<&str>, allowed: &[String]) {
        let message = match version {
            Some(version) => format!(
                "Version '{}' of {} is not allowed (allowed: {})",
                version,
                resource,
                allowed.join(", ")
            ),
            None => format!(
                "{} does not pin a version (allowed: {})",
                resource,
                allowed.join(", ")
            ),
        };
        self.violation(ALLOWED_VERSIONS, Some(resource), message);
    }

    pub fn too_few_nodes(&mut self, resource: &str, nodes: f64, minimum: u32) {
        self.violation(
            MIN_NODES,
            Some(resource),
            format!(
                "{} runs {} nodes, below the required minimum of {}",
                resource, nodes, minimum
            ),
        );
    }

    pub fn endpoint_not_private(&mut self, resource: &str, detail: &str) {
        self.violation(
            PRIVATE_ENDPOINT,
            Some(resource),
            format!("API endpoint of {} must be private: {}", resource, detail),
        );
    }

    // =========================================================================
    // STRUCTURE
    // =========================================================================

    pub fn versioning_disabled(&mut self, resource: &str) {
        self.violation(
            VERSIONING,
            Some(resource),
            format!("Versioning is required but not enabled for {}", resource),
        );
    }

    pub fn invalid_scaling(&mut self, resource: &str, detail: &str) {
        self.violation(
            NODE_SCALING,
            Some(resource),
            format!("Invalid scaling configuration on {}: {}", resource, detail),
        );
    }

    pub fn no_resources(&mut self) {
        self.push(
            Severity::Warning,
            RESOURCES,
            None,
            "No recognized resources found; only provider and backend settings were checked"
                .to_string(),
        );
    }
}
