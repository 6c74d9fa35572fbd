//! Per-rule checks over a [`TerraformDocument`].
//!
//! Each check reads literal values only. A value that is present but not a
//! literal is reported as unverifiable instead of being guessed at.

use crate::document::{Primary, ResourceBlock, TerraformDocument};
use crate::error::ValidationError;
use crate::findings::{Findings, rule_ids};
use crate::hcl::{Body, Value};
use infragen_core::config::{PolicyRuleSet, SecurityRules};
use infragen_core::{Environment, ResourceType};
use regex::Regex;

const SEGMENT: &str = "[a-z0-9]+(?:-[a-z0-9]+)*";
const ENVIRONMENT_TAG: &str = "Environment";

const PUBLIC_ACCESS_FLAGS: [&str; 4] = [
    "block_public_acls",
    "block_public_policy",
    "ignore_public_acls",
    "restrict_public_buckets",
];

/// Result of reading one attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<'a, T> {
    Absent,
    Literal(T),
    /// Present, but only known at plan time.
    Unresolved(&'a str),
}

impl<'a, T> Reading<'a, T> {
    /// The first unresolved reading of the two, else `self`.
    fn or_unresolved(self, other: Self) -> Self {
        match (&self, &other) {
            (Reading::Unresolved(_), _) => self,
            (_, Reading::Unresolved(_)) => other,
            _ => self,
        }
    }
}

fn unresolved(value: &Value) -> Option<&str> {
    value.as_unresolved()
}

pub fn read_str<'a>(body: &'a Body, key: &str) -> Reading<'a, &'a str> {
    match body.attr(key) {
        None | Some(Value::Null) => Reading::Absent,
        Some(value) => match unresolved(value) {
            Some(expr) => Reading::Unresolved(expr),
            None => value
                .as_str()
                .map_or(Reading::Unresolved("non-string value"), Reading::Literal),
        },
    }
}

pub fn read_bool<'a>(body: &'a Body, key: &str) -> Reading<'a, bool> {
    match body.attr(key) {
        None | Some(Value::Null) => Reading::Absent,
        Some(Value::Bool(b)) => Reading::Literal(*b),
        Some(Value::String(s)) if s == "true" || s == "false" => Reading::Literal(s == "true"),
        Some(value) => Reading::Unresolved(unresolved(value).unwrap_or("non-boolean value")),
    }
}

pub fn read_number<'a>(body: &'a Body, key: &str) -> Reading<'a, f64> {
    match body.attr(key) {
        None | Some(Value::Null) => Reading::Absent,
        Some(Value::Number(n)) => Reading::Literal(*n),
        Some(value) => match value.as_str().map(str::parse::<f64>) {
            Some(Ok(n)) => Reading::Literal(n),
            _ => Reading::Unresolved(unresolved(value).unwrap_or("non-numeric value")),
        },
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// Every taggable resource must carry each required tag with a non-empty
/// value. Missing keys are reported once each, naming every affected resource.
pub fn required_tags(doc: &TerraformDocument, policy: &PolicyRuleSet, findings: &mut Findings<'_>) {
    let required = &policy.tags.required;
    if required.is_empty() {
        return;
    }

    let mut missing: Vec<Vec<String>> = vec![Vec::new(); required.len()];
    for resource in doc.taggable() {
        let tags = doc.effective_tags(resource);
        if !tags.is_resolved() {
            findings.unresolved_tags(&resource.address());
            continue;
        }
        for (key, affected) in required.iter().zip(missing.iter_mut()) {
            if !tags.has(key) {
                affected.push(resource.address());
            }
        }
    }

    for (key, affected) in required.iter().zip(missing) {
        if !affected.is_empty() {
            findings.missing_tag(key, &affected);
        }
    }
}

// =============================================================================
// NAMING
// =============================================================================

/// Translate a naming pattern into an anchored regex. `environment` is the
/// regex fragment substituted for `{environment}`.
pub fn naming_regex(pattern: &str, environment: &str) -> Result<Regex, ValidationError> {
    let mut source = String::from("^");
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        source.push_str(&regex::escape(&rest[..start]));
        let Some(len) = rest[start..].find('}') else {
            rest = &rest[start..];
            break;
        };
        match &rest[start..start + len + 1] {
            "{environment}" => source.push_str(environment),
            "{application}" | "{resource}" => source.push_str(SEGMENT),
            other => source.push_str(&regex::escape(other)),
        }
        rest = &rest[start + len + 1..];
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    Regex::new(&source).map_err(|e| ValidationError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn any_environment() -> String {
    let names: Vec<&str> = Environment::ALL.iter().map(|e| e.as_str()).collect();
    format!("(?:{})", names.join("|"))
}

/// Primary resource names must match the naming pattern.
pub fn naming(
    doc: &TerraformDocument,
    policy: &PolicyRuleSet,
    environment: Option<Environment>,
    findings: &mut Findings<'_>,
) -> Result<(), ValidationError> {
    let pattern = &policy.naming.pattern;

    for primary in doc.primaries() {
        let address = primary.block.address();

        let fragment = match environment {
            Some(env) => regex::escape(env.as_str()),
            None => doc
                .effective_tags(primary.block)
                .get(ENVIRONMENT_TAG)
                .and_then(|tag| tag.parse::<Environment>().ok())
                .map(|env| regex::escape(env.as_str()))
                .unwrap_or_else(any_environment),
        };
        let regex = naming_regex(pattern, &fragment)?;

        match read_str(&primary.block.body, primary.name_attribute) {
            Reading::Literal(name) if regex.is_match(name) => {}
            Reading::Literal(name) => findings.name_mismatch(&address, name, pattern),
            Reading::Unresolved(expr) => findings.unverifiable(
                rule_ids::NAMING,
                &address,
                format!("Name of {} is computed ({}) and cannot be checked", address, expr),
            ),
            Reading::Absent => findings.name_missing(&address, primary.name_attribute),
        }
    }
    Ok(())
}

// =============================================================================
// SECURITY
// =============================================================================

/// Security rules for each primary resource, in rule order.
pub fn security(doc: &TerraformDocument, policy: &PolicyRuleSet, findings: &mut Findings<'_>) {
    for primary in doc.primaries() {
        let resource_type = ResourceType::new(primary.resource_type);
        let Some(rules) = policy.security_rules_for(&resource_type) else {
            continue;
        };
        let address = primary.block.address();

        if rules.encryption_required {
            encryption(doc, &primary, rules, &address, findings);
        }
        if rules.public_access_block && primary.resource_type == ResourceType::OBJECT_STORAGE {
            public_access_block(doc, primary.block, &address, findings);
        }
        if let Some(minimum) = rules.min_backup_days
            && primary.resource_type == ResourceType::RELATIONAL_DATABASE
        {
            backup_retention(primary.block, minimum, &address, findings);
        }
        if !rules.allowed_engines.is_empty()
            && primary.resource_type == ResourceType::RELATIONAL_DATABASE
        {
            allowed_engines(primary.block, &rules.allowed_engines, &address, findings);
        }
        if !rules.allowed_versions.is_empty() {
            let key = match primary.resource_type {
                ResourceType::RELATIONAL_DATABASE => Some("engine_version"),
                ResourceType::CONTAINER_CLUSTER => Some("version"),
                _ => None,
            };
            if let Some(key) = key {
                allowed_versions(primary.block, key, &rules.allowed_versions, &address, findings);
            }
        }
        if let Some(minimum) = rules.min_nodes
            && primary.resource_type == ResourceType::CONTAINER_CLUSTER
        {
            min_nodes(doc, primary.block, minimum, &address, findings);
        }
        if rules.private_endpoint && primary.resource_type == ResourceType::CONTAINER_CLUSTER {
            private_endpoint(primary.block, &address, findings);
        }
    }
}

fn encryption(
    doc: &TerraformDocument,
    primary: &Primary<'_>,
    rules: &SecurityRules,
    address: &str,
    findings: &mut Findings<'_>,
) {
    let body = &primary.block.body;
    match primary.resource_type {
        ResourceType::OBJECT_STORAGE => {
            let configuration = doc
                .companion(
                    "aws_s3_bucket_server_side_encryption_configuration",
                    "bucket",
                    primary.block,
                )
                .map(|companion| &companion.body)
                .or_else(|| {
                    body.block("server_side_encryption_configuration")
                        .map(|block| &block.body)
                });
            let Some(configuration) = configuration else {
                findings.encryption_missing(address, "has no server-side encryption configuration");
                return;
            };
            let Some(expected) = &rules.encryption_algorithm else {
                return;
            };
            let Some(default) = configuration
                .block("rule")
                .and_then(|rule| rule.body.block("apply_server_side_encryption_by_default"))
            else {
                findings.encryption_missing(address, "sets no default encryption rule");
                return;
            };
            match read_str(&default.body, "sse_algorithm") {
                Reading::Literal(algorithm) if algorithm == expected => {}
                Reading::Literal(algorithm) => findings.encryption_missing(
                    address,
                    &format!("uses algorithm '{}' instead of '{}'", algorithm, expected),
                ),
                Reading::Unresolved(expr) => findings.unverifiable(
                    rule_ids::ENCRYPTION,
                    address,
                    format!("Encryption algorithm of {} is computed ({})", address, expr),
                ),
                Reading::Absent => findings.encryption_missing(address, "sets no sse_algorithm"),
            }
        }
        ResourceType::RELATIONAL_DATABASE => match read_bool(body, "storage_encrypted") {
            Reading::Literal(true) => {}
            Reading::Literal(false) | Reading::Absent => {
                findings.encryption_missing(address, "does not set storage_encrypted = true")
            }
            Reading::Unresolved(expr) => findings.unverifiable(
                rule_ids::ENCRYPTION,
                address,
                format!("storage_encrypted of {} is computed ({})", address, expr),
            ),
        },
        ResourceType::CONTAINER_CLUSTER => {
            if body.block("encryption_config").is_none() {
                findings.encryption_missing(address, "has no encryption_config block");
            }
        }
        _ => {}
    }
}

fn public_access_block(
    doc: &TerraformDocument,
    bucket: &ResourceBlock,
    address: &str,
    findings: &mut Findings<'_>,
) {
    let Some(block) = doc.companion("aws_s3_bucket_public_access_block", "bucket", bucket) else {
        findings.public_access_not_blocked(address, "no aws_s3_bucket_public_access_block found");
        return;
    };

    let mut open = Vec::new();
    for flag in PUBLIC_ACCESS_FLAGS {
        match read_bool(&block.body, flag) {
            Reading::Literal(true) => {}
            Reading::Literal(false) | Reading::Absent => open.push(flag),
            Reading::Unresolved(expr) => findings.unverifiable(
                rule_ids::PUBLIC_ACCESS_BLOCK,
                address,
                format!("{} of {} is computed ({})", flag, block.address(), expr),
            ),
        }
    }
    if !open.is_empty() {
        findings.public_access_not_blocked(
            address,
            &format!("{} not set to true", open.join(", ")),
        );
    }
}

fn backup_retention(instance: &ResourceBlock, minimum: u32, address: &str, findings: &mut Findings<'_>) {
    match read_number(&instance.body, "backup_retention_period") {
        Reading::Literal(days) if days >= f64::from(minimum) => {}
        Reading::Literal(days) => findings.backup_retention_too_short(address, days, minimum),
        Reading::Absent => findings.backup_retention_too_short(address, 0.0, minimum),
        Reading::Unresolved(expr) => findings.unverifiable(
            rule_ids::BACKUP_RETENTION,
            address,
            format!("backup_retention_period of {} is computed ({})", address, expr),
        ),
    }
}

fn allowed_engines(instance: &ResourceBlock, allowed: &[String], address: &str, findings: &mut Findings<'_>) {
    match read_str(&instance.body, "engine") {
        Reading::Literal(engine) if allowed.iter().any(|a| a.eq_ignore_ascii_case(engine)) => {}
        Reading::Literal(engine) => findings.engine_not_allowed(address, Some(engine), allowed),
        Reading::Absent => findings.engine_not_allowed(address, None, allowed),
        Reading::Unresolved(expr) => findings.unverifiable(
            rule_ids::ALLOWED_ENGINES,
            address,
            format!("engine of {} is computed ({})", address, expr),
        ),
    }
}

/// `15` allows `15`, `15.4` and `15.4.1`, but not `150`.
fn version_allowed(version: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|a| {
        version == a
            || version
                .strip_prefix(a.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn allowed_versions(
    block: &ResourceBlock,
    key: &str,
    allowed: &[String],
    address: &str,
    findings: &mut Findings<'_>,
) {
    match read_str(&block.body, key) {
        Reading::Literal(version) if version_allowed(version, allowed) => {}
        Reading::Literal(version) => findings.version_not_allowed(address, Some(version), allowed),
        Reading::Absent => findings.version_not_allowed(address, None, allowed),
        Reading::Unresolved(expr) => findings.unverifiable(
            rule_ids::ALLOWED_VERSIONS,
            address,
            format!("{} of {} is computed ({})", key, address, expr),
        ),
    }
}

fn min_nodes(
    doc: &TerraformDocument,
    cluster: &ResourceBlock,
    minimum: u32,
    address: &str,
    findings: &mut Findings<'_>,
) {
    let mut total = 0.0;
    for group in doc.companions("aws_eks_node_group", "cluster_name", cluster) {
        let Some(scaling) = group.body.block("scaling_config") else {
            continue;
        };
        match read_number(&scaling.body, "desired_size") {
            Reading::Literal(size) => total += size,
            Reading::Absent => {}
            Reading::Unresolved(expr) => {
                findings.unverifiable(
                    rule_ids::MIN_NODES,
                    address,
                    format!("desired_size of {} is computed ({})", group.address(), expr),
                );
                return;
            }
        }
    }
    if total < f64::from(minimum) {
        findings.too_few_nodes(address, total, minimum);
    }
}

fn private_endpoint(cluster: &ResourceBlock, address: &str, findings: &mut Findings<'_>) {
    let Some(vpc) = cluster.body.block("vpc_config") else {
        findings.endpoint_not_private(address, "no vpc_config block");
        return;
    };

    let private = read_bool(&vpc.body, "endpoint_private_access");
    let public = read_bool(&vpc.body, "endpoint_public_access");
    if let Reading::Unresolved(expr) = private.or_unresolved(public) {
        findings.unverifiable(
            rule_ids::PRIVATE_ENDPOINT,
            address,
            format!("Endpoint access of {} is computed ({})", address, expr),
        );
        return;
    }

    if private != Reading::Literal(true) {
        findings.endpoint_not_private(address, "endpoint_private_access is not true");
    } else if public != Reading::Literal(false) {
        findings.endpoint_not_private(address, "endpoint_public_access is not set to false");
    }
}

// =============================================================================
// STRUCTURE
// =============================================================================

/// Structural checks: bucket versioning and node group scaling bounds.
pub fn structure(doc: &TerraformDocument, policy: &PolicyRuleSet, findings: &mut Findings<'_>) {
    let primaries = doc.primaries();
    if primaries.is_empty() {
        findings.no_resources();
    }

    let versioning_required = policy
        .security_rules_for(&ResourceType::object_storage())
        .is_some_and(|rules| rules.versioning_required);
    if versioning_required {
        for primary in primaries
            .iter()
            .filter(|p| p.resource_type == ResourceType::OBJECT_STORAGE)
        {
            versioning(doc, primary.block, findings);
        }
    }

    for group in doc.resources_of("aws_eks_node_group") {
        node_scaling(group, findings);
    }
}

fn versioning(doc: &TerraformDocument, bucket: &ResourceBlock, findings: &mut Findings<'_>) {
    let address = bucket.address();

    let status = doc
        .companion("aws_s3_bucket_versioning", "bucket", bucket)
        .map(|companion| read_str_nested(&companion.body, "versioning_configuration", "status"));
    let reading = match status {
        Some(Reading::Literal(status)) => Reading::Literal(status.eq_ignore_ascii_case("enabled")),
        Some(Reading::Unresolved(expr)) => Reading::Unresolved(expr),
        Some(Reading::Absent) => Reading::Literal(false),
        None => match bucket.body.block("versioning") {
            Some(inline) => read_bool(&inline.body, "enabled"),
            None => Reading::Absent,
        },
    };

    match reading {
        Reading::Literal(true) => {}
        Reading::Literal(false) | Reading::Absent => findings.versioning_disabled(&address),
        Reading::Unresolved(expr) => findings.unverifiable(
            rule_ids::VERSIONING,
            &address,
            format!("Versioning status of {} is computed ({})", address, expr),
        ),
    }
}

fn read_str_nested<'a>(body: &'a Body, block: &str, key: &str) -> Reading<'a, &'a str> {
    match body.block(block) {
        Some(block) => read_str(&block.body, key),
        None => Reading::Absent,
    }
}

fn node_scaling(group: &ResourceBlock, findings: &mut Findings<'_>) {
    let address = group.address();
    let Some(scaling) = group.body.block("scaling_config") else {
        findings.invalid_scaling(&address, "no scaling_config block");
        return;
    };

    let mut sizes = [0.0; 3];
    for (slot, key) in sizes.iter_mut().zip(["min_size", "desired_size", "max_size"]) {
        match read_number(&scaling.body, key) {
            Reading::Literal(n) => *slot = n,
            Reading::Absent => {
                findings.invalid_scaling(&address, &format!("{} is not set", key));
                return;
            }
            Reading::Unresolved(expr) => {
                findings.unverifiable(
                    rule_ids::NODE_SCALING,
                    &address,
                    format!("{} of {} is computed ({})", key, address, expr),
                );
                return;
            }
        }
    }

    let [min, desired, max] = sizes;
    if !(min <= desired && desired <= max) {
        findings.invalid_scaling(
            &address,
            &format!(
                "expected min_size <= desired_size <= max_size, got {} / {} / {}",
                min, desired, max
            ),
        );
    }
}
