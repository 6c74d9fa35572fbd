//! Instructions given to model-backed parsers.

use infragen_core::config::PolicyRuleSet;
use infragen_core::{Environment, ResourceType};
use std::fmt::Write;

/// System prompt describing the output format and the organization's
/// conventions.
pub fn system_prompt(policy: &PolicyRuleSet, resource_types: &[ResourceType]) -> String {
    let mut prompt = String::new();
    let types: Vec<&str> = resource_types.iter().map(ResourceType::as_str).collect();
    let environments: Vec<&str> = Environment::ALL.iter().map(|e| e.as_str()).collect();

    prompt.push_str(
        "You turn natural language infrastructure requests into a structured resource \
         specification for the infrastructure team.\n\n",
    );

    prompt.push_str("## Conventions\n\n");
    let _ = writeln!(prompt, "- Organization: {}", policy.organization);
    let _ = writeln!(
        prompt,
        "- Resource names are combined into `{}`; answer with the short resource name only \
         (lowercase letters, digits and single hyphens).",
        policy.naming.pattern
    );
    if !policy.tags.required.is_empty() {
        let _ = writeln!(
            prompt,
            "- Required tags: {}.",
            policy.tags.required.join(", ")
        );
    }
    for (key, value) in &policy.tags.defaults {
        let _ = writeln!(prompt, "- Default tag {} = {}.", key, value);
    }

    for resource_type in resource_types {
        let Some(rules) = policy.security_rules_for(resource_type) else {
            continue;
        };
        let _ = writeln!(prompt, "\n### {}\n", resource_type);
        if rules.encryption_required {
            let _ = writeln!(prompt, "- Encryption is mandatory.");
        }
        if let Some(days) = rules.min_backup_days {
            let _ = writeln!(prompt, "- Backups are kept at least {} days.", days);
        }
        if !rules.allowed_engines.is_empty() {
            let _ = writeln!(prompt, "- Allowed engines: {}.", rules.allowed_engines.join(", "));
        }
        if !rules.allowed_versions.is_empty() {
            let _ = writeln!(prompt, "- Allowed versions: {}.", rules.allowed_versions.join(", "));
        }
        if let Some(nodes) = rules.min_nodes {
            let _ = writeln!(prompt, "- At least {} nodes.", nodes);
        }
    }

    prompt.push_str("\n## Output\n\n");
    prompt.push_str("Answer with a single JSON object and nothing else:\n\n");
    let _ = writeln!(
        prompt,
        "{{\"resource_type\": \"{}\", \"resource_name\": \"...\", \"environment\": \"{}\", \
         \"attributes\": {{...}}, \"tags\": {{...}}}}",
        types.join(" | "),
        environments.join(" | ")
    );
    prompt.push_str(
        "\nAttributes: `storage_gb`, `engine`, `engine_version`, `instance_class` and \
         `backup_days` for databases; `node_count`, `instance_types` and \
         `kubernetes_version` for clusters; `versioning` and `retention_days` for object \
         storage. Put the owning application in `application`.\n",
    );
    prompt.push_str(
        "\nIf the requested resource is not one of the supported types, answer \
         {\"error\": \"unsupported_resource_type\", \"message\": \"...\"}. If the request \
         cannot be understood, answer {\"error\": \"ambiguous\", \"message\": \"...\"}.\n",
    );

    prompt.push_str("\n## Example\n\n");
    prompt.push_str(
        "Request: I need a production Postgres database for the payments API with 200GB storage\n\n",
    );
    prompt.push_str(
        "{\"resource_type\": \"relational_database\", \"resource_name\": \"db\", \
         \"environment\": \"prod\", \"attributes\": {\"application\": \"payments\", \
         \"engine\": \"postgres\", \"storage_gb\": 200}, \"tags\": {\"Owner\": \"payments-team\"}}\n",
    );

    prompt
}

/// Prompt for command parsers, which read everything from stdin.
pub fn command_prompt(system: &str, request: &str) -> String {
    format!("{}\n## Request\n\n{}\n", system, request.trim())
}
