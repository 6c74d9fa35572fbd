//! Route definitions and handlers.

use crate::api_types::{
    BundleResponse, DEFAULT_LIST_LIMIT, DryRunBody, ListQuery, MAX_LIST_LIMIT, ProvisionBody,
    ProvisionResponse, RenderBody, ReportResponse, RequestListResponse, ValidateBody,
};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use infragen_core::{ProvisionRequest, RequestId, RequestStatus};
use infragen_policy::ComplianceValidator;
use serde_json::{Value, json};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/v1/health", get(health))
        .route("/api/v1/provision", post(provision))
        .route("/api/v1/requests", get(list_requests))
        .route("/api/v1/requests/{request_id}/status", get(request_status))
        .route("/api/v1/dry-run", post(dry_run))
        .route("/api/v1/render", post(render))
        .route("/api/v1/validate", post(validate))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "infragen",
        "version": env!("CARGO_PKG_VERSION"),
        "project": state.project,
        "resource_types": state.orchestrator().registry().resource_types(),
        "endpoints": [
            "GET /api/v1/health",
            "POST /api/v1/provision",
            "GET /api/v1/requests",
            "GET /api/v1/requests/{request_id}/status",
            "POST /api/v1/dry-run",
            "POST /api/v1/render",
            "POST /api/v1/validate",
        ],
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let orchestrator = state.orchestrator();
    Json(json!({
        "status": "ok",
        "service": "infragen",
        "version": env!("CARGO_PKG_VERSION"),
        "components": {
            "parser": orchestrator.parser_kind(),
            "vcs": orchestrator.vcs_name().unwrap_or("not configured"),
            "templates": orchestrator.registry().resource_types().len(),
        },
    }))
}

async fn provision(
    State(state): State<AppState>,
    Json(body): Json<ProvisionBody>,
) -> Result<(StatusCode, Json<ProvisionResponse>), ApiError> {
    let request_id = state
        .service
        .create_provision_request(&body.request, body.metadata())
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ProvisionResponse {
            message: format!(
                "Request queued. Poll /api/v1/requests/{}/status for progress.",
                request_id
            ),
            request_id,
            status: RequestStatus::Queued,
        }),
    ))
}

async fn request_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<ProvisionRequest>, ApiError> {
    let request = state
        .service
        .request_status(&RequestId::from(request_id))
        .await?;
    Ok(Json(request))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }
    let requests: Vec<ProvisionRequest> = state
        .service
        .list_requests(query.user.as_deref(), Some(limit))
        .await?
        .collect();
    Ok(Json(RequestListResponse {
        count: requests.len(),
        requests,
    }))
}

async fn dry_run(
    State(state): State<AppState>,
    Json(body): Json<DryRunBody>,
) -> Result<Json<BundleResponse>, ApiError> {
    let outcome = state
        .orchestrator()
        .dry_run(&body.request, body.environment)
        .await?;
    Ok(Json(outcome.into()))
}

async fn render(
    State(state): State<AppState>,
    Json(body): Json<RenderBody>,
) -> Result<Json<BundleResponse>, ApiError> {
    let outcome = state.orchestrator().render_spec(body.spec)?;
    Ok(Json(outcome.into()))
}

async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<ReportResponse>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::InvalidRequest("content is empty".into()));
    }
    let report = ComplianceValidator::new(state.orchestrator().policy()).validate_text(&body.content)?;
    Ok(Json(ReportResponse::from(&report)))
}
