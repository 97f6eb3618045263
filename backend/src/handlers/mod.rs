use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub mod message_templates;
pub mod workflow_runtime;
pub mod workflows;

pub use message_templates::message_template_routes;
pub use workflow_runtime::{execution_log_routes, scheduled_job_routes, workflow_event_routes};
pub use workflows::workflow_routes;

/// Header carrying the calling organization; set by the gateway in front of this service
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Tenant of the current request
#[derive(Debug, Clone, Copy)]
pub struct OrgContext(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OrgContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ORGANIZATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(OrgContext)
            .ok_or(AppError::MissingOrganization)
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match state.engine.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "healthy", "service": "gestor-workflows"})),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "service": "gestor-workflows"})),
            )
        }
    }
}
