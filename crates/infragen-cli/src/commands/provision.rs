//! `infragen provision`: queue a request and follow it to completion.
//!
//! Runs the pipeline in-process by default. With `--server` the request is
//! sent to a running infragen-server instead, which is the only way
//! `--no-wait` makes sense: an in-process request dies with the CLI.

use anyhow::{Context, Result};
use infragen_core::{InfragenConfig, ProvisionRequest, RequestId, RequestMetadata, RequestStatus};
use infragen_runtime::{Orchestrator, ProvisionService};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ProvisionArgs {
    pub text: String,
    pub metadata: RequestMetadata,
    pub no_wait: bool,
    pub server: Option<String>,
}

pub async fn run(config: InfragenConfig, args: ProvisionArgs) -> Result<()> {
    let text = super::request_text(&args.text)?;
    let request = match &args.server {
        Some(server) => {
            let client = RemoteClient::new(server);
            let request_id = client.provision(&text, &args.metadata).await?;
            println!("📨 Queued {} on {}", request_id, server);
            if args.no_wait {
                return Ok(());
            }
            client.wait(&request_id).await?
        }
        None => {
            if args.no_wait {
                anyhow::bail!("--no-wait requires --server; an in-process request stops when the CLI exits");
            }
            let orchestrator = Orchestrator::from_config(&config)?;
            let service = ProvisionService::start(Arc::new(orchestrator));
            let request_id = service.create_provision_request(&text, args.metadata).await?;
            println!("📨 Queued {}", request_id);
            wait_local(&service, &request_id).await?
        }
    };
    report(&request)
}

async fn wait_local(service: &ProvisionService, id: &RequestId) -> Result<ProvisionRequest> {
    let mut last = None;
    loop {
        let request = service.request_status(id).await?;
        announce(&mut last, request.status);
        if request.is_terminal() {
            return Ok(request);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn announce(last: &mut Option<RequestStatus>, status: RequestStatus) {
    if *last != Some(status) {
        println!("   … {}", status);
        *last = Some(status);
    }
}

fn report(request: &ProvisionRequest) -> Result<()> {
    if let Some(report) = &request.report {
        super::print_report(report);
    }
    match request.status {
        RequestStatus::Completed => {
            if let Some(result) = &request.result {
                println!("🚀 Pull request #{} opened: {}", result.pr_number, result.pr_url);
                println!("   Branch: {}", result.branch_name);
            }
            Ok(())
        }
        RequestStatus::DryRunCompleted => {
            if let Some(bundle) = &request.preview {
                super::print_bundle(bundle);
            }
            Ok(())
        }
        _ => anyhow::bail!(
            "Request {} failed: {}",
            request.request_id,
            request.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

// ============================================================================
// Remote server
// ============================================================================

#[derive(Debug, Deserialize)]
struct Queued {
    request_id: RequestId,
}

struct RemoteClient {
    client: reqwest::Client,
    base: String,
}

impl RemoteClient {
    fn new(base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn provision(&self, text: &str, metadata: &RequestMetadata) -> Result<RequestId> {
        let response = self
            .client
            .post(format!("{}/api/v1/provision", self.base))
            .json(&json!({
                "request": text,
                "requester": metadata.requester,
                "team": metadata.team,
                "service": metadata.service,
                "environment": metadata.environment,
                "dry_run": metadata.dry_run,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Server rejected the request ({}): {}", status, body.trim());
        }
        let queued: Queued = response.json().await.context("Unexpected server response")?;
        Ok(queued.request_id)
    }

    async fn status(&self, id: &RequestId) -> Result<ProvisionRequest> {
        let response = self
            .client
            .get(format!("{}/api/v1/requests/{}/status", self.base, id))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Status lookup failed ({}): {}", status, body.trim());
        }
        response.json().await.context("Unexpected server response")
    }

    async fn wait(&self, id: &RequestId) -> Result<ProvisionRequest> {
        let mut last = None;
        loop {
            let request = self.status(id).await?;
            announce(&mut last, request.status);
            if request.is_terminal() {
                return Ok(request);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_wait_needs_server() {
        let args = ProvisionArgs {
            text: "a bucket".into(),
            metadata: RequestMetadata::new("alice"),
            no_wait: true,
            server: None,
        };
        let err = run(InfragenConfig::default(), args).await.unwrap_err();
        assert!(err.to_string().contains("--server"));
    }

    #[tokio::test]
    async fn test_in_process_dry_run_request() {
        let args = ProvisionArgs {
            text: "resource_type: object_storage\nresource_name: logs\nenvironment: dev\n".into(),
            metadata: RequestMetadata::new("alice").dry_run(),
            no_wait: false,
            server: None,
        };
        run(InfragenConfig::default(), args).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_process_without_vcs_fails() {
        let args = ProvisionArgs {
            text: "resource_type: object_storage\nresource_name: logs\nenvironment: dev\n".into(),
            metadata: RequestMetadata::new("alice"),
            no_wait: false,
            server: None,
        };
        let err = run(InfragenConfig::default(), args).await.unwrap_err();
        assert!(err.to_string().contains("version control is not configured"));
    }
}
