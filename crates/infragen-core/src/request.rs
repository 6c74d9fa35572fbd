//! Provisioning requests and their lifecycle.
//!
//! A [`ProvisionRequest`] moves through a strictly forward state machine:
//!
//! ```text
//! queued -> parsing -> generating -> creating_pr -> completed
//!    |         |            |             |
//!    +---------+------------+-------------+--> failed
//! generating -> dry_run_completed   (dry-run requests only)
//! ```
//!
//! All state changes go through [`ProvisionRequest::apply`]. A transition that
//! the machine does not allow is reported as a [`LifecycleError`], which is an
//! internal invariant violation rather than a user-facing failure.

use crate::bundle::RenderedBundle;
use crate::report::ValidationReport;
use crate::resource::{Environment, ResourceSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a provisioning request (`req-` + 12 hex characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("req-{}", &hex[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex part of the id, without the `req-` prefix.
    pub fn suffix(&self) -> &str {
        self.0.strip_prefix("req-").unwrap_or(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Parsing,
    Generating,
    CreatingPr,
    Completed,
    Failed,
    DryRunCompleted,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::DryRunCompleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Parsing => "parsing",
            RequestStatus::Generating => "generating",
            RequestStatus::CreatingPr => "creating_pr",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::DryRunCompleted => "dry_run_completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who asked for the resource, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub requester: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Overrides the environment the parser inferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub dry_run: bool,
}

impl RequestMetadata {
    pub fn new(requester: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            ..Default::default()
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Pull request produced by a completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestResult {
    pub pr_url: String,
    pub pr_number: u64,
    pub branch_name: String,
}

/// One entry of the status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub at: DateTime<Utc>,
}

/// A state change applied to a request.
#[derive(Debug, Clone)]
pub enum Transition {
    BeginParsing,
    BeginGenerating(ResourceSpec),
    RecordValidation(ValidationReport),
    BeginCreatingPr,
    Complete(PullRequestResult),
    CompleteDryRun(RenderedBundle),
    Fail(String),
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::BeginParsing => "begin_parsing",
            Transition::BeginGenerating(_) => "begin_generating",
            Transition::RecordValidation(_) => "record_validation",
            Transition::BeginCreatingPr => "begin_creating_pr",
            Transition::Complete(_) => "complete",
            Transition::CompleteDryRun(_) => "complete_dry_run",
            Transition::Fail(_) => "fail",
        }
    }
}

/// Illegal lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request {request_id}: transition '{transition}' is not allowed from status '{from}'")]
pub struct LifecycleError {
    pub request_id: RequestId,
    pub from: RequestStatus,
    pub transition: &'static str,
}

/// A tracked provisioning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub request_id: RequestId,
    pub raw_text: String,
    pub metadata: RequestMetadata,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PullRequestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<RenderedBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl ProvisionRequest {
    /// Create a queued request.
    pub fn new(
        request_id: RequestId,
        raw_text: impl Into<String>,
        metadata: RequestMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            raw_text: raw_text.into(),
            metadata,
            status: RequestStatus::Queued,
            spec: None,
            report: None,
            result: None,
            preview: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            history: vec![StatusChange {
                status: RequestStatus::Queued,
                at: now,
            }],
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.metadata.dry_run
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a transition, or refuse it if the state machine forbids it.
    pub fn apply(&mut self, transition: Transition, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        use RequestStatus::*;

        let allowed = match (&transition, self.status) {
            (_, status) if status.is_terminal() => false,
            (Transition::BeginParsing, Queued) => true,
            (Transition::BeginGenerating(_), Parsing) => true,
            (Transition::RecordValidation(_), Generating) => self.report.is_none(),
            (Transition::BeginCreatingPr, Generating) => !self.is_dry_run(),
            (Transition::Complete(_), CreatingPr) => true,
            (Transition::CompleteDryRun(_), Generating) => self.is_dry_run(),
            (Transition::Fail(_), _) => true,
            _ => false,
        };
        if !allowed {
            return Err(LifecycleError {
                request_id: self.request_id.clone(),
                from: self.status,
                transition: transition.name(),
            });
        }

        match transition {
            Transition::BeginParsing => self.enter(Parsing, at),
            Transition::BeginGenerating(spec) => {
                self.spec = Some(spec);
                self.enter(Generating, at);
            }
            Transition::RecordValidation(report) => {
                self.report = Some(report);
                self.updated_at = at;
            }
            Transition::BeginCreatingPr => self.enter(CreatingPr, at),
            Transition::Complete(result) => {
                self.result = Some(result);
                self.enter(Completed, at);
            }
            Transition::CompleteDryRun(bundle) => {
                self.preview = Some(bundle);
                self.enter(DryRunCompleted, at);
            }
            Transition::Fail(error) => {
                self.error = Some(error);
                self.enter(Failed, at);
            }
        }
        Ok(())
    }

    fn enter(&mut self, status: RequestStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
        if status.is_terminal() {
            self.completed_at = Some(at);
        }
        self.history.push(StatusChange { status, at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Attributes, ResourceType};
    use std::collections::BTreeMap;

    fn request(dry_run: bool) -> ProvisionRequest {
        let mut metadata = RequestMetadata::new("alice");
        metadata.dry_run = dry_run;
        ProvisionRequest::new(RequestId::generate(), "a bucket", metadata, Utc::now())
    }

    fn spec() -> ResourceSpec {
        ResourceSpec::new(
            ResourceType::object_storage(),
            "logs",
            Environment::Dev,
            Attributes::new(),
        )
        .unwrap()
    }

    fn bundle() -> RenderedBundle {
        RenderedBundle {
            resource_type: ResourceType::object_storage(),
            resource_name: "logs".into(),
            environment: Environment::Dev,
            canonical_name: "dev-logs-logs".into(),
            tags: BTreeMap::new(),
            directory_path: "dev/object_storage/dev-logs-logs".into(),
            files: BTreeMap::new(),
        }
    }

    fn pr() -> PullRequestResult {
        PullRequestResult {
            pr_url: "https://example.test/pull/1".into(),
            pr_number: 1,
            branch_name: "infragen/dev-object_storage-logs".into(),
        }
    }

    #[test]
    fn test_request_id_format() {
        let id = RequestId::generate();
        assert!(id.as_str().starts_with("req-"));
        assert_eq!(id.suffix().len(), 12);
        assert!(id.suffix().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_happy_path_records_history() {
        let mut req = request(false);
        let now = Utc::now();
        req.apply(Transition::BeginParsing, now).unwrap();
        req.apply(Transition::BeginGenerating(spec()), now).unwrap();
        req.apply(Transition::RecordValidation(ValidationReport::new()), now)
            .unwrap();
        req.apply(Transition::BeginCreatingPr, now).unwrap();
        req.apply(Transition::Complete(pr()), now).unwrap();

        assert_eq!(req.status, RequestStatus::Completed);
        assert!(req.result.is_some());
        assert!(req.completed_at.is_some());
        let statuses: Vec<_> = req.history.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                RequestStatus::Queued,
                RequestStatus::Parsing,
                RequestStatus::Generating,
                RequestStatus::CreatingPr,
                RequestStatus::Completed,
            ]
        );
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let mut req = request(false);
        req.apply(Transition::Fail("boom".into()), Utc::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Failed);
        assert_eq!(req.error.as_deref(), Some("boom"));

        let mut req = request(false);
        req.apply(Transition::BeginParsing, Utc::now()).unwrap();
        req.apply(Transition::Fail("parse".into()), Utc::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Failed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut req = request(false);
        req.apply(Transition::Fail("boom".into()), Utc::now()).unwrap();

        let err = req.apply(Transition::BeginParsing, Utc::now()).unwrap_err();
        assert_eq!(err.from, RequestStatus::Failed);
        let err = req
            .apply(Transition::Fail("again".into()), Utc::now())
            .unwrap_err();
        assert_eq!(err.transition, "fail");
        assert_eq!(req.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let mut req = request(false);
        assert!(req.apply(Transition::BeginCreatingPr, Utc::now()).is_err());
        assert!(req.apply(Transition::Complete(pr()), Utc::now()).is_err());
        assert_eq!(req.status, RequestStatus::Queued);
        assert_eq!(req.history.len(), 1);
    }

    #[test]
    fn test_dry_run_never_creates_pr() {
        let mut req = request(true);
        let now = Utc::now();
        req.apply(Transition::BeginParsing, now).unwrap();
        req.apply(Transition::BeginGenerating(spec()), now).unwrap();
        assert!(req.apply(Transition::BeginCreatingPr, now).is_err());
        req.apply(Transition::CompleteDryRun(bundle()), now).unwrap();
        assert_eq!(req.status, RequestStatus::DryRunCompleted);
        assert!(req.preview.is_some());
    }

    #[test]
    fn test_non_dry_run_cannot_complete_as_preview() {
        let mut req = request(false);
        let now = Utc::now();
        req.apply(Transition::BeginParsing, now).unwrap();
        req.apply(Transition::BeginGenerating(spec()), now).unwrap();
        assert!(req.apply(Transition::CompleteDryRun(bundle()), now).is_err());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(RequestStatus::CreatingPr).unwrap(),
            serde_json::json!("creating_pr")
        );
    }
}
