//! Provisioning flow against scripted parser and version control doubles.

use async_trait::async_trait;
use infragen_core::config::{PolicyRuleSet, TimeoutConfig};
use infragen_core::{
    Attributes, Environment, ProvisionRequest, RequestId, RequestMetadata, RequestStatus,
    ResourceSpec, ResourceType,
};
use infragen_runtime::{
    OpenedPullRequest, Orchestrator, OrchestratorError, ParseError, ProvisionService,
    PullRequestDraft, ResourceParser, VcsClient, VcsError,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Doubles
// =============================================================================

struct ScriptedParser {
    answer: Result<ResourceSpec, ParseError>,
    delay: Duration,
}

impl ScriptedParser {
    fn answering(spec: ResourceSpec) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(spec),
            delay: Duration::ZERO,
        })
    }

    fn refusing(error: ParseError) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(error),
            delay: Duration::ZERO,
        })
    }

    fn slow(spec: ResourceSpec, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(spec),
            delay,
        })
    }
}

#[async_trait]
impl ResourceParser for ScriptedParser {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    async fn parse(&self, _text: &str) -> Result<ResourceSpec, ParseError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

/// Answers by request text: texts containing "slow" wait before answering.
struct ByTextParser {
    spec: ResourceSpec,
    slow: Duration,
}

#[async_trait]
impl ResourceParser for ByTextParser {
    fn kind(&self) -> &'static str {
        "by-text"
    }

    async fn parse(&self, text: &str) -> Result<ResourceSpec, ParseError> {
        if text.contains("slow") {
            tokio::time::sleep(self.slow).await;
        }
        Ok(self.spec.clone())
    }
}

struct PanickingParser;

#[async_trait]
impl ResourceParser for PanickingParser {
    fn kind(&self) -> &'static str {
        "panicking"
    }

    async fn parse(&self, _text: &str) -> Result<ResourceSpec, ParseError> {
        panic!("parser crashed");
    }
}

#[derive(Debug, Clone, PartialEq)]
enum VcsCall {
    CreateBranch { base: String, name: String },
    CommitFiles { branch: String, paths: Vec<String> },
    OpenPullRequest { branch: String, title: String },
}

#[derive(Default)]
struct RecordingVcs {
    calls: Mutex<Vec<VcsCall>>,
    fail_branch: bool,
}

impl RecordingVcs {
    fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VcsClient for RecordingVcs {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn create_branch(&self, base: &str, name: &str) -> Result<(), VcsError> {
        self.calls.lock().unwrap().push(VcsCall::CreateBranch {
            base: base.into(),
            name: name.into(),
        });
        if self.fail_branch {
            return Err(VcsError::Authentication("bad credentials".into()));
        }
        Ok(())
    }

    async fn commit_files(
        &self,
        branch: &str,
        files: &BTreeMap<String, String>,
        _message: &str,
    ) -> Result<(), VcsError> {
        self.calls.lock().unwrap().push(VcsCall::CommitFiles {
            branch: branch.into(),
            paths: files.keys().cloned().collect(),
        });
        Ok(())
    }

    async fn open_pull_request(
        &self,
        branch: &str,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest, VcsError> {
        self.calls.lock().unwrap().push(VcsCall::OpenPullRequest {
            branch: branch.into(),
            title: draft.title.clone(),
        });
        Ok(OpenedPullRequest {
            url: "https://git.example.com/acme/infra/pull/17".into(),
            number: 17,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn spec(resource_type: ResourceType, name: &str, env: Environment, attrs: serde_json::Value) -> ResourceSpec {
    let attributes: Attributes = serde_json::from_value(attrs).unwrap();
    ResourceSpec::new(resource_type, name, env, attributes).unwrap()
}

fn cluster_spec() -> ResourceSpec {
    spec(
        ResourceType::container_cluster(),
        "platform",
        Environment::Prod,
        json!({"node_count": 5}),
    )
}

fn service(orchestrator: Orchestrator) -> ProvisionService {
    ProvisionService::start(Arc::new(orchestrator))
}

async fn wait_for_terminal(service: &ProvisionService, id: &RequestId) -> ProvisionRequest {
    for _ in 0..500 {
        let request = service.request_status(id).await.unwrap();
        if request.is_terminal() {
            return request;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request {} did not finish", id);
}

fn statuses(request: &ProvisionRequest) -> Vec<RequestStatus> {
    request.history.iter().map(|change| change.status).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_cluster_request_opens_pull_request() {
    let vcs = Arc::new(RecordingVcs::default());
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()))
        .with_vcs(vcs.clone());
    let service = service(orchestrator);

    let id = service
        .create_provision_request("a prod cluster called platform with 5 nodes", RequestMetadata::new("alice"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Completed, "{:?}", request.error);
    let result = request.result.as_ref().unwrap();
    assert_eq!(result.pr_url, "https://git.example.com/acme/infra/pull/17");
    assert_eq!(result.pr_number, 17);
    assert!(result.branch_name.starts_with("infragen/prod-container_cluster-platform-"));
    assert!(result.branch_name.ends_with(id.suffix()));

    let calls = vcs.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        VcsCall::CreateBranch {
            base: "main".into(),
            name: result.branch_name.clone(),
        }
    );
    let VcsCall::CommitFiles { branch, paths } = &calls[1] else {
        panic!("expected a commit, got {:?}", calls[1]);
    };
    assert_eq!(branch, &result.branch_name);
    let mut names: Vec<&str> = paths.iter().filter_map(|p| p.rsplit('/').next()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["backend.tf", "main.tf", "outputs.tf", "provider.tf", "variables.tf"]
    );
    assert!(paths.iter().all(|p| p.starts_with("terraform/prod/container_cluster/")));
    assert!(matches!(
        &calls[2],
        VcsCall::OpenPullRequest { title, .. } if title.starts_with("[infragen] Add prod CONTAINER_CLUSTER")
    ));

    assert_eq!(
        statuses(&request),
        vec![
            RequestStatus::Queued,
            RequestStatus::Parsing,
            RequestStatus::Generating,
            RequestStatus::CreatingPr,
            RequestStatus::Completed,
        ]
    );
    assert!(request.completed_at.is_some());
}

#[tokio::test]
async fn test_unsupported_type_fails_before_rendering() {
    let vcs = Arc::new(RecordingVcs::default());
    let orchestrator = Orchestrator::new(
        PolicyRuleSet::default(),
        ScriptedParser::refusing(ParseError::UnsupportedResourceType("message_queue".into())),
    )
    .with_vcs(vcs.clone());
    let service = service(orchestrator);

    let id = service
        .create_provision_request("a kafka topic please", RequestMetadata::new("bob"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Failed);
    assert!(request.error.as_deref().unwrap().contains("message_queue"));
    assert_eq!(
        statuses(&request),
        vec![RequestStatus::Queued, RequestStatus::Parsing, RequestStatus::Failed]
    );
    assert!(request.spec.is_none());
    assert!(vcs.calls().is_empty());
}

#[tokio::test]
async fn test_policy_failure_blocks_pull_request() {
    let policy = PolicyRuleSet::from_yaml(
        r#"
organization: acme
tags:
  required: [Environment, CostCenter]
"#,
    )
    .unwrap();
    let vcs = Arc::new(RecordingVcs::default());
    let orchestrator = Orchestrator::new(policy, ScriptedParser::answering(cluster_spec())).with_vcs(vcs.clone());
    let service = service(orchestrator);

    let id = service
        .create_provision_request("cluster", RequestMetadata::new("alice"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Failed);
    let error = request.error.as_deref().unwrap();
    assert!(error.starts_with("Policy validation failed: "), "{}", error);
    assert!(error.contains("CostCenter"));
    assert!(!request.report.as_ref().unwrap().passed());
    assert!(vcs.calls().is_empty());
}

#[tokio::test]
async fn test_dry_run_request_never_calls_vcs() {
    let vcs = Arc::new(RecordingVcs::default());
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()))
        .with_vcs(vcs.clone());
    let service = service(orchestrator);

    let id = service
        .create_provision_request("cluster", RequestMetadata::new("alice").dry_run())
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::DryRunCompleted);
    assert_eq!(
        request.preview.as_ref().unwrap().canonical_name,
        "prod-platform-platform"
    );
    assert!(request.report.is_some());
    assert!(request.result.is_none());

    let outcome = service.orchestrator().dry_run("cluster", None).await.unwrap();
    assert_eq!(outcome.bundle.files.len(), 5);

    assert!(vcs.calls().is_empty());
}

#[tokio::test]
async fn test_missing_vcs_fails_request() {
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()));
    let service = service(orchestrator);

    let id = service
        .create_provision_request("cluster", RequestMetadata::new("alice"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Failed);
    assert!(request.error.as_deref().unwrap().contains("version control is not configured"));
}

#[tokio::test]
async fn test_vcs_error_fails_request_with_stage() {
    let vcs = Arc::new(RecordingVcs {
        fail_branch: true,
        ..Default::default()
    });
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()))
        .with_vcs(vcs.clone());
    let service = service(orchestrator);

    let id = service
        .create_provision_request("cluster", RequestMetadata::new("alice"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(
        request.error.as_deref(),
        Some("create_branch failed: authentication failed: bad credentials")
    );
    assert_eq!(vcs.calls().len(), 1);
    assert_eq!(statuses(&request).last(), Some(&RequestStatus::Failed));
    assert!(statuses(&request).contains(&RequestStatus::CreatingPr));
}

#[tokio::test]
async fn test_parse_timeout() {
    let orchestrator = Orchestrator::new(
        PolicyRuleSet::default(),
        ScriptedParser::slow(cluster_spec(), Duration::from_secs(30)),
    )
    .with_timeouts(TimeoutConfig {
        parse_secs: 1,
        vcs_secs: 1,
    });
    let service = service(orchestrator);

    let id = service
        .create_provision_request("cluster", RequestMetadata::new("alice"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(request.error.as_deref(), Some("parse timed out after 1s"));
}

#[tokio::test]
async fn test_slow_request_does_not_hold_up_others() {
    let parser = Arc::new(ByTextParser {
        spec: cluster_spec(),
        slow: Duration::from_secs(5),
    });
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), parser).with_timeouts(TimeoutConfig {
        parse_secs: 60,
        vcs_secs: 60,
    });
    let service = service(orchestrator);

    let slow = service
        .create_provision_request("slow cluster", RequestMetadata::new("alice").dry_run())
        .await
        .unwrap();
    let fast = service
        .create_provision_request("fast cluster", RequestMetadata::new("bob").dry_run())
        .await
        .unwrap();

    let finished = wait_for_terminal(&service, &fast).await;
    assert_eq!(finished.status, RequestStatus::DryRunCompleted, "{:?}", finished.error);

    let pending = service.request_status(&slow).await.unwrap();
    assert_eq!(pending.status, RequestStatus::Parsing);
}

#[tokio::test]
async fn test_crashed_worker_fails_its_request() {
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), Arc::new(PanickingParser));
    let service = service(orchestrator);

    let id = service
        .create_provision_request("cluster", RequestMetadata::new("alice"))
        .await
        .unwrap();
    let request = wait_for_terminal(&service, &id).await;

    assert_eq!(request.status, RequestStatus::Failed);
    assert!(request.error.as_deref().unwrap().contains("worker stopped unexpectedly"));
    assert_eq!(
        statuses(&request),
        vec![RequestStatus::Queued, RequestStatus::Parsing, RequestStatus::Failed]
    );

    // The service keeps accepting work after a crash.
    assert!(
        service
            .create_provision_request("cluster", RequestMetadata::new("alice"))
            .await
            .is_ok()
    );
}

// =============================================================================
// Intake and queries
// =============================================================================

#[tokio::test]
async fn test_intake_validation() {
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()));
    let service = service(orchestrator);

    assert!(matches!(
        service.create_provision_request("   ", RequestMetadata::new("alice")).await,
        Err(OrchestratorError::Input(_))
    ));
    assert!(matches!(
        service.create_provision_request("cluster", RequestMetadata::new("")).await,
        Err(OrchestratorError::Input(_))
    ));
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()));
    let service = service(orchestrator);

    let err = service
        .request_status(&RequestId::from("req-ffffffffffff"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn test_list_requests_newest_first() {
    let orchestrator = Orchestrator::new(PolicyRuleSet::default(), ScriptedParser::answering(cluster_spec()));
    let service = service(orchestrator);

    let mut alice = Vec::new();
    for (requester, text) in [("alice", "one"), ("bob", "two"), ("alice", "three"), ("alice", "four")] {
        let id = service
            .create_provision_request(text, RequestMetadata::new(requester).dry_run())
            .await
            .unwrap();
        if requester == "alice" {
            alice.push(id);
        }
    }

    let listed: Vec<RequestId> = service
        .list_requests(Some("alice"), Some(2))
        .await
        .unwrap()
        .map(|request| request.request_id)
        .collect();
    assert_eq!(listed, vec![alice[2].clone(), alice[1].clone()]);

    let everyone = service.list_requests(None, None).await.unwrap();
    assert_eq!(everyone.count(), 4);
}
