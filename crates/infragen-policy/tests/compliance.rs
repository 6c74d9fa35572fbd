//! End-to-end compliance checks over rendered bundles and hand-written
//! Terraform.

use infragen_core::config::PolicyRuleSet;
use infragen_core::{Attributes, Environment, ResourceSpec, ResourceType, Severity};
use infragen_policy::{ValidationError, ValidationInput, rule_ids, validate};
use serde_json::json;

fn policy(yaml: &str) -> PolicyRuleSet {
    PolicyRuleSet::from_yaml(yaml).unwrap()
}

fn spec(resource_type: ResourceType, name: &str, env: Environment, attrs: serde_json::Value) -> ResourceSpec {
    let attributes: Attributes = serde_json::from_value(attrs).unwrap();
    ResourceSpec::new(resource_type, name, env, attributes).unwrap()
}

const TAGS_POLICY: &str = r#"
organization: acme
tags:
  required: [Environment, Owner]
  defaults:
    Owner: platform-team
"#;

#[test]
fn test_rendered_object_storage_passes() {
    let policy = policy(TAGS_POLICY);
    let spec = spec(
        ResourceType::object_storage(),
        "logs",
        Environment::Staging,
        json!({"retention_days": 90}),
    );
    let bundle = infragen_render::render(&spec, &policy).unwrap();
    assert_eq!(bundle.tags["Environment"], "staging");
    assert_eq!(bundle.tags["Owner"], "platform-team");

    let report = validate(ValidationInput::Bundle(&bundle), &policy).unwrap();
    assert!(report.passed(), "{:?}", report.findings());
    assert_eq!(report.error_count(), 0);
}

#[test]
fn test_missing_required_tag_without_default() {
    let policy = policy(
        r#"
organization: acme
tags:
  required: [Environment, Owner, CostCenter]
  defaults:
    Owner: platform-team
"#,
    );
    let spec = spec(
        ResourceType::object_storage(),
        "logs",
        Environment::Staging,
        json!({"retention_days": 90}),
    );
    let bundle = infragen_render::render(&spec, &policy).unwrap();

    let report = validate(ValidationInput::Bundle(&bundle), &policy).unwrap();
    assert!(!report.passed());
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].rule_id, rule_ids::REQUIRED_TAGS);
    assert!(errors[0].message.contains("CostCenter"));
    assert_eq!(errors[0].resource.as_deref(), Some("aws_s3_bucket.logs"));
}

#[test]
fn test_backup_retention_below_minimum() {
    let policy = policy(
        r#"
organization: acme
security_rules:
  relational_database:
    min_backup_days: 7
"#,
    );
    let spec = spec(
        ResourceType::relational_database(),
        "payments",
        Environment::Dev,
        json!({"storage_gb": 200, "backup_days": 3}),
    );
    let bundle = infragen_render::render(&spec, &policy).unwrap();

    let report = validate(ValidationInput::Bundle(&bundle), &policy).unwrap();
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 1, "{:?}", report.findings());
    assert_eq!(errors[0].rule_id, rule_ids::BACKUP_RETENTION);
    assert!(errors[0].message.contains("below the required minimum of 7"));
}

#[test]
fn test_policy_defaults_make_bundles_compliant() {
    let policy = policy(
        r#"
organization: acme
tags:
  required: [Environment]
security_rules:
  object_storage:
    encryption_required: true
    encryption_algorithm: "aws:kms"
    public_access_block: true
    versioning_required: true
  relational_database:
    encryption_required: true
    min_backup_days: 7
    allowed_engines: [postgres]
    allowed_versions: ["15"]
  container_cluster:
    encryption_required: true
    min_nodes: 3
    private_endpoint: true
    allowed_versions: ["1.29"]
"#,
    );

    let specs = [
        spec(ResourceType::object_storage(), "assets", Environment::Prod, json!({})),
        spec(
            ResourceType::relational_database(),
            "orders",
            Environment::Prod,
            json!({"storage_gb": 50}),
        ),
        spec(
            ResourceType::container_cluster(),
            "platform",
            Environment::Prod,
            json!({"node_count": 5}),
        ),
    ];
    for spec in &specs {
        let bundle = infragen_render::render(spec, &policy).unwrap();
        let report = validate(ValidationInput::Bundle(&bundle), &policy).unwrap();
        assert!(
            report.findings().is_empty(),
            "{}: {:?}",
            spec.resource_type(),
            report.findings()
        );
    }
}

#[test]
fn test_advisory_rules_only_warn() {
    let policy = policy(
        r#"
organization: acme
tags:
  required: [CostCenter]
enforcement:
  default: mandatory
  rules:
    tags.required: advisory
"#,
    );
    let spec = spec(ResourceType::object_storage(), "logs", Environment::Dev, json!({}));
    let bundle = infragen_render::render(&spec, &policy).unwrap();

    let report = validate(ValidationInput::Bundle(&bundle), &policy).unwrap();
    assert!(report.passed());
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.findings()[0].severity, Severity::Warning);
}

#[test]
fn test_escaped_template_in_name_is_checked_literally() {
    let policy = PolicyRuleSet::default();
    let spec = spec(
        ResourceType::object_storage(),
        "logs",
        Environment::Dev,
        json!({"application": "${Evil_App}"}),
    );
    let bundle = infragen_render::render(&spec, &policy).unwrap();
    assert_eq!(bundle.canonical_name, "dev-${Evil_App}-logs");

    let report = validate(ValidationInput::Bundle(&bundle), &policy).unwrap();
    assert!(!report.passed());
    let naming: Vec<_> = report
        .findings()
        .iter()
        .filter(|f| f.rule_id == rule_ids::NAMING)
        .collect();
    assert_eq!(naming.len(), 1);
    assert_eq!(naming[0].severity, Severity::Error);
    assert!(!naming[0].message.contains("cannot be checked"));
}

fn rule_hits(report: &infragen_core::ValidationReport, rule_id: &str) -> Vec<Severity> {
    report
        .findings()
        .iter()
        .filter(|f| f.rule_id == rule_id)
        .map(|f| f.severity)
        .collect()
}

#[test]
fn test_cluster_scaling_edges() {
    let policy = policy("security_rules:\n  container_cluster:\n    min_nodes: 2\n");
    let cluster = |attrs| {
        let spec = spec(ResourceType::container_cluster(), "platform", Environment::Dev, attrs);
        let bundle = infragen_render::render(&spec, &policy).unwrap();
        validate(ValidationInput::Bundle(&bundle), &policy).unwrap()
    };

    // min_size > max_size
    let report = cluster(json!({"node_count": 3, "min_nodes": 6, "max_nodes": 4}));
    assert_eq!(rule_hits(&report, rule_ids::NODE_SCALING), vec![Severity::Error]);
    assert!(!report.passed());

    // Zero nodes is a consistent scaling config, but below the policy minimum.
    let report = cluster(json!({"node_count": 0}));
    assert!(rule_hits(&report, rule_ids::NODE_SCALING).is_empty());
    assert_eq!(rule_hits(&report, rule_ids::MIN_NODES), vec![Severity::Error]);

    let report = cluster(json!({"node_count": u64::MAX}));
    assert!(rule_hits(&report, rule_ids::NODE_SCALING).is_empty());
    assert!(rule_hits(&report, rule_ids::MIN_NODES).is_empty());
}

#[test]
fn test_interpolated_name_is_unverifiable() {
    let text = r#"
resource "aws_s3_bucket" "logs" {
  bucket = "dev-${var.app}-logs"
  tags = {
    Environment = "dev"
  }
}
"#;
    let report = validate(ValidationInput::Text(text), &PolicyRuleSet::default()).unwrap();
    let naming: Vec<_> = report
        .findings()
        .iter()
        .filter(|f| f.rule_id == rule_ids::NAMING)
        .collect();
    assert_eq!(naming.len(), 1);
    assert_eq!(naming[0].severity, Severity::Warning);
}

const HAND_WRITTEN: &str = r#"
provider "aws" {
  region = "us-east-1"
}

resource "aws_s3_bucket" "data" {
  bucket = "Data_Bucket"

  tags = {
    Environment = "prod"
  }
}

resource "aws_db_instance" "main" {
  identifier              = "prod-billing-main"
  engine                  = "oracle-ee"
  engine_version          = "19.0"
  storage_encrypted       = false
  backup_retention_period = var.backup_days

  tags = local.tags
}

resource "aws_eks_cluster" "k8s" {
  name    = "prod-platform-k8s"
  version = "1.27"

  vpc_config {
    endpoint_private_access = true
  }

  tags = {
    Environment = "prod"
  }
}

resource "aws_eks_node_group" "k8s_default" {
  cluster_name = aws_eks_cluster.k8s.name

  scaling_config {
    desired_size = 1
    min_size     = 2
    max_size     = 4
  }

  tags = {
    Environment = "prod"
  }
}
"#;

const STRICT_POLICY: &str = r#"
organization: acme
tags:
  required: [Environment]
security_rules:
  object_storage:
    encryption_required: true
    versioning_required: true
  relational_database:
    encryption_required: true
    min_backup_days: 7
    allowed_engines: [postgres, mysql]
  container_cluster:
    min_nodes: 3
    private_endpoint: true
    allowed_versions: ["1.29", "1.30"]
"#;

#[test]
fn test_hand_written_terraform_findings_in_rule_order() {
    let policy = policy(STRICT_POLICY);
    let report = validate(ValidationInput::Text(HAND_WRITTEN), &policy).unwrap();
    assert!(!report.passed());

    let rules: Vec<(&str, Severity)> = report
        .findings()
        .iter()
        .map(|f| (f.rule_id.as_str(), f.severity))
        .collect();
    assert_eq!(
        rules,
        vec![
            (rule_ids::REQUIRED_TAGS, Severity::Warning),
            (rule_ids::NAMING, Severity::Error),
            (rule_ids::ENCRYPTION, Severity::Error),
            (rule_ids::ENCRYPTION, Severity::Error),
            (rule_ids::BACKUP_RETENTION, Severity::Warning),
            (rule_ids::ALLOWED_ENGINES, Severity::Error),
            (rule_ids::ALLOWED_VERSIONS, Severity::Error),
            (rule_ids::MIN_NODES, Severity::Error),
            (rule_ids::PRIVATE_ENDPOINT, Severity::Error),
            (rule_ids::VERSIONING, Severity::Error),
            (rule_ids::NODE_SCALING, Severity::Error),
        ]
    );

    let naming = &report.findings()[1];
    assert_eq!(naming.resource.as_deref(), Some("aws_s3_bucket.data"));
    assert!(naming.message.contains("Data_Bucket"));
}

#[test]
fn test_text_without_resources_warns() {
    let policy = policy(TAGS_POLICY);
    let report = validate(
        ValidationInput::Text("variable \"region\" {\n  type = string\n}\n"),
        &policy,
    )
    .unwrap();
    assert!(report.passed());
    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].rule_id, rule_ids::RESOURCES);
}

#[test]
fn test_provider_default_tags_count() {
    let policy = policy(TAGS_POLICY);
    let text = r#"
provider "aws" {
  default_tags {
    tags = {
      Owner = "platform-team"
    }
  }
}

resource "aws_s3_bucket" "logs" {
  bucket = "dev-app-logs"
  tags = {
    Environment = "dev"
  }
}
"#;
    let report = validate(ValidationInput::Text(text), &policy).unwrap();
    assert!(report.findings().is_empty(), "{:?}", report.findings());
}

#[test]
fn test_unreadable_terraform_is_an_error() {
    let policy = policy(TAGS_POLICY);
    let result = validate(
        ValidationInput::Text("resource \"aws_s3_bucket\" \"x\" {\n  bucket = \n"),
        &policy,
    );
    assert!(matches!(result, Err(ValidationError::Parse { .. })));
}
