//! Runtime endpoints: state-change intake, scheduled jobs and the execution log

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use gestor_shared::{ScheduledJob, StateChangeEvent, WorkflowExecutionLog};
use std::sync::Arc;
use uuid::Uuid;

use super::OrgContext;
use crate::pagination::{ExecutionLogListParams, PaginatedResponse, ScheduledJobListParams};
use crate::workflows::dispatcher::{SweepOptions, SweepReport};
use crate::workflows::reactor::{ReactorOutcome, StateChange};
use crate::{ApiResult, AppState};

pub fn workflow_event_routes() -> Router<Arc<AppState>> {
    Router::new().route("/state-change", post(state_change))
}

pub fn scheduled_job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/dispatch", post(dispatch))
        .route("/:id/cancel", post(cancel_job))
}

pub fn execution_log_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_logs))
}

/// Called by entity services after committing a status change
async fn state_change(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Json(event): Json<StateChangeEvent>,
) -> ApiResult<Json<ReactorOutcome>> {
    let change = StateChange::from_event(org, event);
    let outcome = state.engine.on_entity_state_change(&change).await?;
    Ok(Json(outcome))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Query(params): Query<ScheduledJobListParams>,
) -> ApiResult<Json<PaginatedResponse<ScheduledJob>>> {
    let page = params.pagination();
    let (jobs, total) = state.engine.queue.list_jobs(org, &params.filter(), &page).await?;
    Ok(Json(PaginatedResponse::new(jobs, &page, total)))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScheduledJob>> {
    Ok(Json(state.engine.queue.cancel_job(org, id).await?))
}

/// Manual sweep over the calling organization's due jobs. Stale claims are still
/// released for every organization.
async fn dispatch(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    options: Option<Json<SweepOptions>>,
) -> ApiResult<Json<SweepReport>> {
    let mut options = options.map(|Json(o)| o).unwrap_or_default();
    options.organization_id = Some(org);
    tracing::info!(organization_id = %org, "Manual dispatch sweep requested");
    Ok(Json(state.engine.dispatcher.run_sweep(options).await?))
}

async fn list_logs(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Query(params): Query<ExecutionLogListParams>,
) -> ApiResult<Json<PaginatedResponse<WorkflowExecutionLog>>> {
    let page = params.pagination();
    let (logs, total) = state.engine.log.list(org, &params.filter(), &page).await?;
    Ok(Json(PaginatedResponse::new(logs, &page, total)))
}
