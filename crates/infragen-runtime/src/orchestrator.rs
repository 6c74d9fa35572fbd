//! Drives a request from raw text to an opened pull request.
//!
//! ```text
//! parse ──▶ render ──▶ validate ──▶ branch ──▶ commit ──▶ pull request
//!   │          │           │
//!   └──────────┴───────────┴──▶ dry run stops after validation
//! ```

use crate::error::OrchestratorError;
use crate::parser::{self, ResourceParser};
use crate::pull_request::PullRequestPlan;
use crate::store::{InMemoryRequestStore, RequestCursor, RequestFilter, RequestStore, StoreError};
use crate::tracker::RequestTracker;
use crate::vcs::{self, VcsClient};
use anyhow::Context;
use chrono::Utc;
use infragen_core::config::{InfragenConfig, PolicyRuleSet, TimeoutConfig, VcsConfig};
use infragen_core::{
    Environment, ProvisionRequest, PullRequestResult, RenderedBundle, RequestId, ResourceSpec,
    Transition, ValidationReport,
};
use infragen_policy::ComplianceValidator;
use infragen_render::{RenderError, TemplateRegistry};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Result of a dry run: everything a pull request would contain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunOutcome {
    pub spec: ResourceSpec,
    pub bundle: RenderedBundle,
    pub report: ValidationReport,
}

pub struct Orchestrator {
    policy: Arc<PolicyRuleSet>,
    registry: Arc<TemplateRegistry>,
    parser: Arc<dyn ResourceParser>,
    vcs: Option<Arc<dyn VcsClient>>,
    store: Arc<dyn RequestStore>,
    vcs_config: VcsConfig,
    timeouts: TimeoutConfig,
}

impl Orchestrator {
    /// Built-in templates, in-memory store, no version control.
    pub fn new(policy: PolicyRuleSet, parser: Arc<dyn ResourceParser>) -> Self {
        Self {
            policy: Arc::new(policy),
            registry: Arc::new(TemplateRegistry::builtin()),
            parser,
            vcs: None,
            store: Arc::new(InMemoryRequestStore::new()),
            vcs_config: VcsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Wire up parser and version control from a loaded configuration.
    pub fn from_config(config: &InfragenConfig) -> anyhow::Result<Self> {
        let policy = Arc::new(config.policy.clone());
        let registry = TemplateRegistry::builtin();

        let parser = parser::from_config(&config.parser, policy.clone(), registry.resource_types())
            .with_context(|| format!("Failed to set up the {} parser", config.parser.kind()))?;
        let vcs = vcs::from_config(&config.vcs).context("Failed to set up version control")?;

        tracing::info!(
            parser = parser.kind(),
            vcs = vcs.as_ref().map(|v| v.name()).unwrap_or("none"),
            resource_types = registry.resource_types().len(),
            "orchestrator configured"
        );

        Ok(Self {
            policy,
            registry: Arc::new(registry),
            parser,
            vcs,
            store: Arc::new(InMemoryRequestStore::new()),
            vcs_config: config.vcs.clone(),
            timeouts: config.timeouts,
        })
    }

    pub fn with_vcs(mut self, vcs: Arc<dyn VcsClient>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RequestStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_vcs_config(mut self, vcs_config: VcsConfig) -> Self {
        self.vcs_config = vcs_config;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn policy(&self) -> &PolicyRuleSet {
        &self.policy
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn parser_kind(&self) -> &'static str {
        self.parser.kind()
    }

    /// Name of the version control backend, if any.
    pub fn vcs_name(&self) -> Option<&'static str> {
        self.vcs.as_ref().map(|v| v.name())
    }

    pub fn store(&self) -> Arc<dyn RequestStore> {
        self.store.clone()
    }

    // =========================================================================
    // Synchronous stages
    // =========================================================================

    /// Render a spec and check the result against the policy.
    pub fn render_and_validate(
        &self,
        spec: &ResourceSpec,
    ) -> Result<(RenderedBundle, ValidationReport), OrchestratorError> {
        let bundle = self.registry.render(spec, &self.policy)?;
        let report = ComplianceValidator::new(&self.policy)
            .validate_bundle(&bundle)
            .map_err(|e| {
                OrchestratorError::Internal(format!("rendered bundle could not be read back: {}", e))
            })?;
        tracing::info!(
            resource_type = %bundle.resource_type,
            canonical_name = %bundle.canonical_name,
            errors = report.error_count(),
            warnings = report.warning_count(),
            "rendered and validated bundle"
        );
        Ok((bundle, report))
    }

    /// Render an already structured spec without touching version control.
    pub fn render_spec(&self, spec: ResourceSpec) -> Result<DryRunOutcome, OrchestratorError> {
        if !self.registry.supports(spec.resource_type()) {
            return Err(RenderError::UnsupportedResourceType(spec.resource_type().clone()).into());
        }
        let (bundle, report) = self.render_and_validate(&spec)?;
        Ok(DryRunOutcome {
            spec,
            bundle,
            report,
        })
    }

    // =========================================================================
    // Parsing and dry runs
    // =========================================================================

    /// Parse raw text under the parse timeout.
    ///
    /// `environment` overrides whatever environment the text names.
    pub async fn parse(
        &self,
        raw_text: &str,
        environment: Option<Environment>,
    ) -> Result<ResourceSpec, OrchestratorError> {
        let spec = with_timeout("parse", self.timeouts.parse(), self.parser.parse(raw_text))
            .await??;

        if !self.registry.supports(spec.resource_type()) {
            return Err(parser::ParseError::UnsupportedResourceType(
                spec.resource_type().to_string(),
            )
            .into());
        }

        Ok(match environment {
            Some(env) if env != spec.environment() => spec.with_environment(env),
            _ => spec,
        })
    }

    /// Parse, render and validate. Never calls version control.
    pub async fn dry_run(
        &self,
        raw_text: &str,
        environment: Option<Environment>,
    ) -> Result<DryRunOutcome, OrchestratorError> {
        if raw_text.trim().is_empty() {
            return Err(OrchestratorError::Input("request text is empty".into()));
        }
        let spec = self.parse(raw_text, environment).await?;
        self.render_spec(spec)
    }

    // =========================================================================
    // Provisioning
    // =========================================================================

    /// Run a tracked request to a terminal state.
    ///
    /// Stage failures end the request as `failed`. A store failure means the
    /// request can no longer be tracked, so it is logged and the worker ends.
    pub async fn run_request(&self, mut tracker: RequestTracker) {
        let request_id = tracker.id().clone();
        match self.drive(&mut tracker).await {
            Ok(()) => tracing::info!(
                request_id = %request_id,
                status = %tracker.request().status,
                "request finished"
            ),
            Err(err) => tracing::error!(
                request_id = %request_id,
                error = %err,
                "request tracking failed, abandoning worker"
            ),
        }
    }

    async fn drive(&self, tracker: &mut RequestTracker) -> Result<(), StoreError> {
        tracker.apply(Transition::BeginParsing).await?;

        let raw_text = tracker.request().raw_text.clone();
        let environment = tracker.request().metadata.environment;
        let spec = match self.parse(&raw_text, environment).await {
            Ok(spec) => spec,
            Err(err) => return fail(tracker, "parse", err.to_string()).await,
        };

        tracker.apply(Transition::BeginGenerating(spec.clone())).await?;
        let (bundle, report) = match self.render_and_validate(&spec) {
            Ok(rendered) => rendered,
            Err(err) => return fail(tracker, "render", err.to_string()).await,
        };
        tracker
            .apply(Transition::RecordValidation(report.clone()))
            .await?;

        if tracker.request().is_dry_run() {
            tracker.apply(Transition::CompleteDryRun(bundle)).await?;
            return Ok(());
        }

        if !report.passed() {
            let message = format!("Policy validation failed: {}", report.error_summary());
            return fail(tracker, "validate", message).await;
        }

        let Some(vcs) = self.vcs.clone() else {
            return fail(
                tracker,
                "create_pr",
                "version control is not configured; only dry runs are possible".into(),
            )
            .await;
        };

        tracker.apply(Transition::BeginCreatingPr).await?;
        let plan = PullRequestPlan::new(
            &self.vcs_config,
            tracker.id(),
            &tracker.request().metadata,
            &spec,
            &bundle,
            &report,
            Utc::now(),
        );
        match self.open_pull_request(vcs.as_ref(), &plan).await {
            Ok(result) => {
                tracker.apply(Transition::Complete(result)).await?;
                Ok(())
            }
            Err(err) => fail(tracker, "create_pr", err.to_string()).await,
        }
    }

    async fn open_pull_request(
        &self,
        vcs: &dyn VcsClient,
        plan: &PullRequestPlan,
    ) -> Result<PullRequestResult, OrchestratorError> {
        let limit = self.timeouts.vcs();

        with_timeout(
            "create_branch",
            limit,
            vcs.create_branch(&plan.draft.base, &plan.branch),
        )
        .await?
        .map_err(|e| OrchestratorError::vcs("create_branch", e))?;

        with_timeout(
            "commit_files",
            limit,
            vcs.commit_files(&plan.branch, &plan.files, &plan.commit_message),
        )
        .await?
        .map_err(|e| OrchestratorError::vcs("commit_files", e))?;

        let opened = with_timeout(
            "open_pull_request",
            limit,
            vcs.open_pull_request(&plan.branch, &plan.draft),
        )
        .await?
        .map_err(|e| OrchestratorError::vcs("open_pull_request", e))?;

        Ok(PullRequestResult {
            pr_url: opened.url,
            pr_number: opened.number,
            branch_name: plan.branch.clone(),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn request_status(&self, id: &RequestId) -> Result<ProvisionRequest, OrchestratorError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(id.clone()))
    }

    /// Newest first, optionally for one requester.
    pub async fn list_requests(
        &self,
        requester: Option<&str>,
        limit: Option<usize>,
    ) -> Result<RequestCursor, OrchestratorError> {
        let filter = RequestFilter {
            requester: requester.map(str::to_string),
            limit,
        };
        Ok(self.store.list(&filter).await?)
    }
}

async fn fail(
    tracker: &mut RequestTracker,
    stage: &'static str,
    message: String,
) -> Result<(), StoreError> {
    tracing::warn!(request_id = %tracker.id(), stage = stage, error = %message, "request failed");
    tracker.apply(Transition::Fail(message)).await?;
    Ok(())
}

async fn with_timeout<F: Future>(
    stage: &'static str,
    limit: Duration,
    future: F,
) -> Result<F::Output, OrchestratorError> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| OrchestratorError::Timeout {
            stage,
            secs: limit.as_secs(),
        })
}
