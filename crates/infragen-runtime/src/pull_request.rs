//! Branch names, commit messages and pull request text for a bundle.

use crate::vcs::PullRequestDraft;
use chrono::{DateTime, Utc};
use infragen_core::config::VcsConfig;
use infragen_core::{RenderedBundle, RequestId, RequestMetadata, ResourceSpec, ValidationReport};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Everything the version control backend needs for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestPlan {
    pub branch: String,
    pub commit_message: String,
    /// File contents keyed by repository path.
    pub files: BTreeMap<String, String>,
    pub draft: PullRequestDraft,
}

impl PullRequestPlan {
    pub fn new(
        config: &VcsConfig,
        request_id: &RequestId,
        metadata: &RequestMetadata,
        spec: &ResourceSpec,
        bundle: &RenderedBundle,
        report: &ValidationReport,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            branch: branch_name(&config.branch_prefix, bundle, request_id, at),
            commit_message: commit_message(bundle),
            files: bundle.repository_paths(&config.root_dir),
            draft: PullRequestDraft {
                base: config.base_branch.clone(),
                title: title(bundle),
                body: body(request_id, metadata, spec, bundle, report),
                labels: labels(bundle, &config.labels),
            },
        }
    }
}

/// `{prefix}/{env}-{type}-{name}-{YYYYmmdd-HHMMSS}-{id}`
pub fn branch_name(
    prefix: &str,
    bundle: &RenderedBundle,
    request_id: &RequestId,
    at: DateTime<Utc>,
) -> String {
    let name = format!(
        "{}-{}-{}-{}-{}",
        bundle.environment,
        bundle.resource_type,
        bundle.resource_name,
        at.format("%Y%m%d-%H%M%S"),
        request_id.suffix()
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

pub fn title(bundle: &RenderedBundle) -> String {
    format!(
        "[infragen] Add {} {}: {}",
        bundle.environment,
        bundle.resource_type.as_str().to_uppercase(),
        bundle.canonical_name
    )
}

pub fn commit_message(bundle: &RenderedBundle) -> String {
    let files: Vec<&str> = bundle.iter_files().map(|(name, _)| name).collect();
    format!(
        "Add {} {}: {}\n\nResource type: {}\nEnvironment: {}\nFiles: {}\n",
        bundle.environment,
        bundle.resource_type,
        bundle.canonical_name,
        bundle.resource_type,
        bundle.environment,
        files.join(", ")
    )
}

/// Generated labels first, then configured extras, without duplicates.
pub fn labels(bundle: &RenderedBundle, extra: &[String]) -> Vec<String> {
    let mut labels = vec![
        "infrastructure".to_string(),
        "terraform".to_string(),
        format!("env:{}", bundle.environment),
        format!("resource:{}", bundle.resource_type),
    ];
    for label in extra {
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }
    labels
}

pub fn body(
    request_id: &RequestId,
    metadata: &RequestMetadata,
    spec: &ResourceSpec,
    bundle: &RenderedBundle,
    report: &ValidationReport,
) -> String {
    let mut out = String::new();

    out.push_str("## Summary\n\n");
    let _ = writeln!(
        out,
        "Provisions `{}` ({}) in **{}**.\n",
        bundle.canonical_name, bundle.resource_type, bundle.environment
    );
    let _ = writeln!(out, "- Request: `{}`", request_id);
    let _ = writeln!(out, "- Requested by: {}", metadata.requester);
    if let Some(team) = &metadata.team {
        let _ = writeln!(out, "- Team: {}", team);
    }
    if let Some(service) = &metadata.service {
        let _ = writeln!(out, "- Service: {}", service);
    }
    let _ = writeln!(out, "- Directory: `{}`", bundle.directory_path);

    let attributes: Vec<_> = spec
        .attributes()
        .iter()
        .filter(|(key, _)| key.as_str() != infragen_core::resource::TAGS_ATTRIBUTE)
        .collect();
    if !attributes.is_empty() {
        out.push_str("\n## Attributes\n\n");
        for (key, value) in attributes {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "- **{}**: {}", key, value);
        }
    }

    out.push_str("\n## Tags\n\n| Key | Value |\n|-----|-------|\n");
    for (key, value) in &bundle.tags {
        let _ = writeln!(out, "| {} | {} |", key, value);
    }

    out.push_str("\n## Files\n\n");
    for (name, _) in bundle.iter_files() {
        let _ = writeln!(out, "- `{}/{}`", bundle.directory_path, name);
    }

    out.push_str("\n## Policy validation\n\n");
    if report.findings().is_empty() {
        out.push_str("All policy checks passed.\n");
    } else {
        let _ = writeln!(
            out,
            "{} error(s), {} warning(s):\n",
            report.error_count(),
            report.warning_count()
        );
        for finding in report.findings() {
            let _ = writeln!(out, "- {}", finding);
        }
    }

    out.push_str("\n## Review checklist\n\n");
    out.push_str("- [ ] Naming and tags match the owning team\n");
    out.push_str("- [ ] Sizing is appropriate for the environment\n");
    out.push_str("- [ ] `terraform plan` output reviewed\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use infragen_core::config::PolicyRuleSet;
    use infragen_core::{Attributes, Environment, ResourceType};

    fn fixture() -> (ResourceSpec, RenderedBundle) {
        let attributes: Attributes =
            serde_json::from_value(serde_json::json!({"node_count": 5})).unwrap();
        let spec = ResourceSpec::new(
            ResourceType::container_cluster(),
            "platform",
            Environment::Prod,
            attributes,
        )
        .unwrap();
        let bundle = infragen_render::render(&spec, &PolicyRuleSet::default()).unwrap();
        (spec, bundle)
    }

    #[test]
    fn test_branch_name() {
        let (_, bundle) = fixture();
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let id = RequestId::from("req-0123456789ab");
        assert_eq!(
            branch_name("infragen", &bundle, &id, at),
            "infragen/prod-container_cluster-platform-20260304-050607-0123456789ab"
        );
    }

    #[test]
    fn test_title_and_labels() {
        let (_, bundle) = fixture();
        assert_eq!(
            title(&bundle),
            "[infragen] Add prod CONTAINER_CLUSTER: prod-platform-platform"
        );
        assert_eq!(
            labels(&bundle, &["terraform".to_string(), "needs-review".to_string()]),
            vec![
                "infrastructure",
                "terraform",
                "env:prod",
                "resource:container_cluster",
                "needs-review"
            ]
        );
    }

    #[test]
    fn test_plan_places_files_under_root_dir() {
        let (spec, bundle) = fixture();
        let plan = PullRequestPlan::new(
            &VcsConfig::default(),
            &RequestId::generate(),
            &RequestMetadata::new("alice"),
            &spec,
            &bundle,
            &ValidationReport::new(),
            Utc::now(),
        );
        let paths: Vec<&str> = plan.files.keys().map(String::as_str).collect();
        assert_eq!(paths.len(), 5);
        assert!(paths.contains(&"terraform/prod/container_cluster/prod-platform-platform/main.tf"));
        assert!(plan.draft.body.contains("- **node_count**: 5"));
        assert!(plan.draft.body.contains("All policy checks passed."));
        assert_eq!(plan.draft.base, "main");
    }
}
