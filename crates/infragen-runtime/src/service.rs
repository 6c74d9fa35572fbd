//! Asynchronous intake for provisioning requests.

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;
use crate::store::{RequestCursor, RequestStore};
use crate::tracker::RequestTracker;
use chrono::Utc;
use infragen_core::{ProvisionRequest, RequestId, RequestMetadata, Transition};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Accepts requests and hands them to background workers.
///
/// `create_provision_request` returns as soon as the request is stored; a
/// dispatcher task spawns one worker per request, so a slow parse or
/// repository never holds up the next request.
#[derive(Clone)]
pub struct ProvisionService {
    orchestrator: Arc<Orchestrator>,
    jobs: mpsc::UnboundedSender<RequestTracker>,
}

impl ProvisionService {
    /// Start the dispatcher. Must be called inside a Tokio runtime.
    pub fn start(orchestrator: Arc<Orchestrator>) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<RequestTracker>();

        let workers = orchestrator.clone();
        tokio::spawn(async move {
            while let Some(tracker) = queue.recv().await {
                let orchestrator = workers.clone();
                let store = orchestrator.store();
                let request_id = tracker.id().clone();
                let worker = tokio::spawn(async move { orchestrator.run_request(tracker).await });
                tokio::spawn(supervise(store, request_id, worker));
            }
            tracing::debug!("provisioning dispatcher stopped");
        });

        Self { orchestrator, jobs }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Store a queued request and schedule it.
    pub async fn create_provision_request(
        &self,
        raw_text: &str,
        metadata: RequestMetadata,
    ) -> Result<RequestId, OrchestratorError> {
        if raw_text.trim().is_empty() {
            return Err(OrchestratorError::Input("request text is empty".into()));
        }
        if metadata.requester.trim().is_empty() {
            return Err(OrchestratorError::Input("requester is required".into()));
        }

        let request = ProvisionRequest::new(RequestId::generate(), raw_text, metadata, Utc::now());
        let tracker = RequestTracker::create(self.orchestrator.store(), request).await?;
        let request_id = tracker.id().clone();

        tracing::info!(
            request_id = %request_id,
            requester = %tracker.request().metadata.requester,
            dry_run = tracker.request().is_dry_run(),
            "request queued"
        );

        self.jobs
            .send(tracker)
            .map_err(|_| OrchestratorError::Internal("provisioning dispatcher has stopped".into()))?;
        Ok(request_id)
    }

    pub async fn request_status(&self, id: &RequestId) -> Result<ProvisionRequest, OrchestratorError> {
        self.orchestrator.request_status(id).await
    }

    pub async fn list_requests(
        &self,
        requester: Option<&str>,
        limit: Option<usize>,
    ) -> Result<RequestCursor, OrchestratorError> {
        self.orchestrator.list_requests(requester, limit).await
    }
}

/// Wait for a worker and fail its request if the worker died before
/// reaching a terminal state. The tracker went down with the worker, so the
/// record is updated through the store directly.
async fn supervise(store: Arc<dyn RequestStore>, request_id: RequestId, worker: JoinHandle<()>) {
    let Err(err) = worker.await else {
        return;
    };
    tracing::error!(request_id = %request_id, error = %err, "provisioning worker aborted");

    match store.get(&request_id).await {
        Ok(Some(request)) if !request.is_terminal() => {
            let message = "internal error: the provisioning worker stopped unexpectedly".to_string();
            if let Err(err) = store.update(&request_id, Transition::Fail(message), Utc::now()).await {
                tracing::error!(request_id = %request_id, error = %err, "could not record aborted request");
            }
        }
        Ok(_) => {}
        Err(err) => tracing::error!(request_id = %request_id, error = %err, "could not read aborted request"),
    }
}
