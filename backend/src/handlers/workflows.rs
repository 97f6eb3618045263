//! Workflow definition endpoints
//!
//! Workflows and the states, transitions, triggers and actions they own, plus
//! duplication, default selection, bootstrap seeding and trigger dry-runs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use gestor_shared::{
    ActionInput, BusinessModule, StateInput, TransitionInput, TriggerInput, TriggerWithActions, Workflow,
    WorkflowAction, WorkflowDetail, WorkflowInput, WorkflowState, WorkflowTransition,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::OrgContext;
use crate::pagination::WorkflowListParams;
use crate::workflows::simulator::SimulationResult;
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct DuplicateWorkflowRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BootstrapRequest {
    pub module: BusinessModule,
}

pub fn workflow_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route("/bootstrap", post(bootstrap_defaults))
        .route("/:id", get(get_workflow).put(update_workflow).delete(delete_workflow))
        .route("/:id/duplicate", post(duplicate_workflow))
        .route("/:id/default", post(set_default_workflow))
        .route("/:id/states", get(list_states).post(create_state))
        .route("/:id/states/:state_id", axum::routing::put(update_state).delete(delete_state))
        .route("/:id/transitions", get(list_transitions).post(create_transition))
        .route(
            "/:id/transitions/:transition_id",
            axum::routing::put(update_transition).delete(delete_transition),
        )
        .route("/:id/triggers", get(list_triggers).post(create_trigger))
        .route(
            "/:id/triggers/:trigger_id",
            get(get_trigger).put(update_trigger).delete(delete_trigger),
        )
        .route("/:id/triggers/:trigger_id/test", post(test_trigger))
        .route(
            "/:id/triggers/:trigger_id/actions",
            get(list_actions).post(create_action),
        )
        .route(
            "/:id/triggers/:trigger_id/actions/:action_id",
            axum::routing::put(update_action).delete(delete_action),
        )
}

// ==================== Workflows ====================

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Query(params): Query<WorkflowListParams>,
) -> ApiResult<Json<Vec<Workflow>>> {
    let workflows = state.engine.definitions.list_workflows(org, &params.filter()).await?;
    Ok(Json(workflows))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Json(input): Json<WorkflowInput>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let workflow = state.engine.definitions.create_workflow(org, input).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowDetail>> {
    let detail = state.engine.definitions.get_workflow_detail(org, id).await?;
    Ok(Json(detail))
}

async fn update_workflow(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
    Json(input): Json<WorkflowInput>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state.engine.definitions.update_workflow(org, id, input).await?;
    Ok(Json(workflow))
}

async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.definitions.delete_workflow(org, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_workflow(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
    body: Option<Json<DuplicateWorkflowRequest>>,
) -> ApiResult<(StatusCode, Json<WorkflowDetail>)> {
    let name = body.and_then(|Json(request)| request.name);
    let copy = state.engine.definitions.duplicate_workflow(org, id, name).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn set_default_workflow(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state.engine.definitions.set_default_workflow(org, id).await?;
    Ok(Json(workflow))
}

async fn bootstrap_defaults(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Json(request): Json<BootstrapRequest>,
) -> ApiResult<(StatusCode, Json<Vec<WorkflowDetail>>)> {
    let created = state.engine.definitions.bootstrap_defaults(org, request.module).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// ==================== States ====================

async fn list_states(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<WorkflowState>>> {
    Ok(Json(state.engine.definitions.list_states(org, id).await?))
}

async fn create_state(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
    Json(input): Json<StateInput>,
) -> ApiResult<(StatusCode, Json<WorkflowState>)> {
    let created = state.engine.definitions.create_state(org, id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_state(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, state_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<StateInput>,
) -> ApiResult<Json<WorkflowState>> {
    Ok(Json(state.engine.definitions.update_state(org, id, state_id, input).await?))
}

async fn delete_state(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, state_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.engine.definitions.delete_state(org, id, state_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Transitions ====================

async fn list_transitions(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<WorkflowTransition>>> {
    Ok(Json(state.engine.definitions.list_transitions(org, id).await?))
}

async fn create_transition(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
    Json(input): Json<TransitionInput>,
) -> ApiResult<(StatusCode, Json<WorkflowTransition>)> {
    let created = state.engine.definitions.create_transition(org, id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_transition(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, transition_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<TransitionInput>,
) -> ApiResult<Json<WorkflowTransition>> {
    let updated = state
        .engine
        .definitions
        .update_transition(org, id, transition_id, input)
        .await?;
    Ok(Json(updated))
}

async fn delete_transition(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, transition_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.engine.definitions.delete_transition(org, id, transition_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Triggers ====================

async fn list_triggers(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<TriggerWithActions>>> {
    Ok(Json(state.engine.definitions.list_triggers(org, id).await?))
}

async fn create_trigger(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
    Json(input): Json<TriggerInput>,
) -> ApiResult<(StatusCode, Json<TriggerWithActions>)> {
    let created = state.engine.definitions.create_trigger(org, id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_trigger(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<TriggerWithActions>> {
    Ok(Json(state.engine.definitions.get_trigger(org, id, trigger_id).await?))
}

async fn update_trigger(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<TriggerInput>,
) -> ApiResult<Json<TriggerWithActions>> {
    let updated = state
        .engine
        .definitions
        .update_trigger(org, id, trigger_id, input)
        .await?;
    Ok(Json(updated))
}

async fn delete_trigger(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.engine.definitions.delete_trigger(org, id, trigger_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn test_trigger(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<SimulationResult>> {
    Ok(Json(state.engine.simulator.test_trigger(org, id, trigger_id).await?))
}

// ==================== Actions ====================

async fn list_actions(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<WorkflowAction>>> {
    Ok(Json(state.engine.definitions.list_actions(org, id, trigger_id).await?))
}

async fn create_action(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ActionInput>,
) -> ApiResult<(StatusCode, Json<WorkflowAction>)> {
    let created = state
        .engine
        .definitions
        .create_action(org, id, trigger_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_action(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id, action_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(input): Json<ActionInput>,
) -> ApiResult<Json<WorkflowAction>> {
    let updated = state
        .engine
        .definitions
        .update_action(org, id, trigger_id, action_id, input)
        .await?;
    Ok(Json(updated))
}

async fn delete_action(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path((id, trigger_id, action_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .definitions
        .delete_action(org, id, trigger_id, action_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
