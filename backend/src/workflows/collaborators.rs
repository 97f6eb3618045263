// Collaborator seams - everything the engine calls but does not own

use std::sync::Arc;

use async_trait::async_trait;
use gestor_shared::{EntityType, MessageChannel};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::actions::{FieldUpdate, TaskRequest};
use super::template::TemplateData;

/// Current data of an entity, keyed by template variable name
pub type EntityData = TemplateData;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{service} request failed: {message}")]
    Request { service: &'static str, message: String },
    #[error("{service} rejected the request ({status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{entity_type} {entity_id} not found")]
    EntityNotFound {
        entity_type: EntityType,
        entity_id: Uuid,
    },
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl CollaboratorError {
    pub fn service(&self) -> &str {
        match self {
            Self::Request { service, .. } | Self::Rejected { service, .. } => service,
            Self::EntityNotFound { .. } => "entity-service",
            Self::InvalidRecipient(_) => "message-gateway",
        }
    }
}

/// One outbound message, already rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub organization_id: Uuid,
    pub job_id: Uuid,
    pub action_id: Uuid,
    /// `<job id>:<attempt>`; gateways must drop repeats of a key they have seen
    pub idempotency_key: String,
    pub channel: MessageChannel,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub provider_message_id: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, request: &SendRequest) -> Result<DeliveryReceipt, CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityDataSource: Send + Sync {
    async fn fetch(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<EntityData, CollaboratorError>;
}

/// Write-backs into the owning entity service
#[async_trait]
pub trait EntityCallbacks: Send + Sync {
    async fn update_field(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        update: &FieldUpdate,
    ) -> Result<(), CollaboratorError>;

    async fn create_task(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        task: &TaskRequest,
    ) -> Result<(), CollaboratorError>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityDataSource>,
    pub callbacks: Arc<dyn EntityCallbacks>,
    pub chat: Arc<dyn MessageGateway>,
    pub email: Arc<dyn MessageGateway>,
}

impl Collaborators {
    pub fn gateway(&self, channel: MessageChannel) -> &Arc<dyn MessageGateway> {
        match channel {
            MessageChannel::Chat => &self.chat,
            MessageChannel::Email => &self.email,
        }
    }
}
