//! API request and response types.

use infragen_core::{
    Environment, Finding, ProvisionRequest, RequestId, RequestMetadata, RequestStatus,
    ResourceSpec, ValidationReport,
};
use infragen_runtime::DryRunOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

// =============================================================================
// Provisioning
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvisionBody {
    pub request: String,
    pub requester: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub dry_run: bool,
}

impl ProvisionBody {
    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            requester: self.requester.clone(),
            team: self.team.clone(),
            service: self.service.clone(),
            environment: self.environment,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<ProvisionRequest>,
    pub count: usize,
}

// =============================================================================
// Dry run, render and validate
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DryRunBody {
    pub request: String,
    #[serde(default)]
    pub environment: Option<Environment>,
}

#[derive(Debug, Deserialize)]
pub struct RenderBody {
    pub spec: ResourceSpec,
}

/// What a pull request would contain.
#[derive(Debug, Serialize)]
pub struct BundleResponse {
    pub spec: ResourceSpec,
    pub canonical_name: String,
    pub directory_path: String,
    pub tags: BTreeMap<String, String>,
    pub files: BTreeMap<&'static str, String>,
    pub report: ReportResponse,
}

impl From<DryRunOutcome> for BundleResponse {
    fn from(outcome: DryRunOutcome) -> Self {
        let files = outcome
            .bundle
            .iter_files()
            .map(|(name, text)| (name, text.to_string()))
            .collect();
        Self {
            spec: outcome.spec,
            canonical_name: outcome.bundle.canonical_name,
            directory_path: outcome.bundle.directory_path,
            tags: outcome.bundle.tags,
            files,
            report: ReportResponse::from(&outcome.report),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateBody {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub passed: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub findings: Vec<Finding>,
}

impl From<&ValidationReport> for ReportResponse {
    fn from(report: &ValidationReport) -> Self {
        Self {
            passed: report.passed(),
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            findings: report.findings().to_vec(),
        }
    }
}
