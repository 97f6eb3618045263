use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use gestor_shared::{MessageChannel, MessageTemplate, MessageTemplateInput};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::OrgContext;
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct TemplateListParams {
    pub channel: Option<MessageChannel>,
}

pub fn message_template_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route("/:id", get(get_template).put(update_template).delete(delete_template))
}

async fn list_templates(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Query(params): Query<TemplateListParams>,
) -> ApiResult<Json<Vec<MessageTemplate>>> {
    Ok(Json(state.engine.definitions.list_templates(org, params.channel).await?))
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Json(input): Json<MessageTemplateInput>,
) -> ApiResult<(StatusCode, Json<MessageTemplate>)> {
    let template = state.engine.definitions.create_template(org, input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageTemplate>> {
    Ok(Json(state.engine.definitions.get_template(org, id).await?))
}

async fn update_template(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
    Json(input): Json<MessageTemplateInput>,
) -> ApiResult<Json<MessageTemplate>> {
    Ok(Json(state.engine.definitions.update_template(org, id, input).await?))
}

async fn delete_template(
    State(state): State<Arc<AppState>>,
    OrgContext(org): OrgContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.engine.definitions.delete_template(org, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
