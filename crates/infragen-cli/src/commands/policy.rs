//! `infragen policy`: show the effective policy.

use anyhow::Result;
use infragen_core::config::{Enforcement, PolicyRuleSet, SecurityRules};
use infragen_render::TemplateRegistry;
use std::fmt::Write;

fn enforcement(level: Enforcement) -> &'static str {
    match level {
        Enforcement::Mandatory => "mandatory",
        Enforcement::Advisory => "advisory",
    }
}

fn security_lines(rules: &SecurityRules) -> Vec<String> {
    let mut lines = Vec::new();
    if rules.encryption_required {
        match &rules.encryption_algorithm {
            Some(algorithm) => lines.push(format!("encryption required ({})", algorithm)),
            None => lines.push("encryption required".to_string()),
        }
    }
    if rules.public_access_block {
        lines.push("public access blocked".to_string());
    }
    if rules.versioning_required {
        lines.push("versioning required".to_string());
    }
    if let Some(days) = rules.min_backup_days {
        lines.push(format!("backups kept at least {} days", days));
    }
    if !rules.allowed_engines.is_empty() {
        lines.push(format!("engines: {}", rules.allowed_engines.join(", ")));
    }
    if !rules.allowed_versions.is_empty() {
        lines.push(format!("versions: {}", rules.allowed_versions.join(", ")));
    }
    if let Some(nodes) = rules.min_nodes {
        lines.push(format!("at least {} nodes", nodes));
    }
    if rules.private_endpoint {
        lines.push("private endpoint only".to_string());
    }
    if !rules.defaults.is_empty() {
        let keys: Vec<&str> = rules.defaults.keys().map(String::as_str).collect();
        lines.push(format!("defaults for: {}", keys.join(", ")));
    }
    lines
}

/// Human-readable policy summary.
pub fn summary(policy: &PolicyRuleSet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Organization:  {}", policy.organization);
    let _ = writeln!(out, "Naming:        {}", policy.naming.pattern);

    let required = if policy.tags.required.is_empty() {
        "(none)".to_string()
    } else {
        policy.tags.required.join(", ")
    };
    let _ = writeln!(out, "Required tags: {}", required);
    for (key, value) in &policy.tags.defaults {
        let _ = writeln!(out, "  default {} = {}", key, value);
    }

    let _ = writeln!(out, "Region:        {}", policy.provider.region);
    let _ = writeln!(
        out,
        "State backend: s3://{} (locks: {}, region: {})",
        policy.state_bucket(),
        policy.lock_table(),
        policy.backend_region()
    );

    let _ = writeln!(out, "Enforcement:   {} by default", enforcement(policy.enforcement.default));
    for (rule, level) in &policy.enforcement.rules {
        let _ = writeln!(out, "  {} is {}", rule, enforcement(*level));
    }

    let _ = writeln!(out, "Resource types:");
    for resource_type in TemplateRegistry::builtin().resource_types() {
        let _ = writeln!(out, "  {}", resource_type);
        let lines = policy
            .security_rules_for(&resource_type)
            .map(security_lines)
            .unwrap_or_default();
        if lines.is_empty() {
            let _ = writeln!(out, "    no security rules");
        }
        for line in lines {
            let _ = writeln!(out, "    - {}", line);
        }
    }
    out
}

pub fn run(policy: &PolicyRuleSet, yaml: bool) -> Result<()> {
    if yaml {
        print!("{}", serde_yaml::to_string(policy)?);
    } else {
        print!("{}", summary(policy));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let policy = PolicyRuleSet::from_yaml(
            r#"
organization: acme
tags:
  required: [Environment, Owner]
  defaults:
    Owner: platform-team
security_rules:
  relational_database:
    encryption_required: true
    min_backup_days: 7
enforcement:
  rules:
    naming.pattern: advisory
"#,
        )
        .unwrap();
        let text = summary(&policy);
        assert!(text.contains("Required tags: Environment, Owner"));
        assert!(text.contains("default Owner = platform-team"));
        assert!(text.contains("s3://acme-terraform-state"));
        assert!(text.contains("naming.pattern is advisory"));
        assert!(text.contains("    - backups kept at least 7 days"));
        assert!(text.contains("  object_storage\n    no security rules"));
    }
}
