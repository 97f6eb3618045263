// Entity service client - reads entity data and applies action write-backs

use async_trait::async_trait;
use gestor_shared::EntityType;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::json;
use uuid::Uuid;

use crate::config::ServiceEndpoint;
use crate::workflows::actions::{FieldUpdate, TaskRequest};
use crate::workflows::collaborators::{CollaboratorError, EntityCallbacks, EntityData, EntityDataSource};

const SERVICE: &str = "entity-service";

pub struct EntityServiceClient {
    client: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl EntityServiceClient {
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    fn base(&self) -> &str {
        self.endpoint.base_url.trim_end_matches('/')
    }

    fn entity_url(&self, entity_type: EntityType, entity_id: Uuid) -> String {
        format!("{}/internal/{}s/{}", self.base(), entity_type, entity_id)
    }

    fn authorized(&self, builder: RequestBuilder, organization_id: Uuid) -> RequestBuilder {
        let builder = builder.header("X-Organization-Id", organization_id.to_string());
        match &self.endpoint.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, CollaboratorError> {
        builder.send().await.map_err(|e| CollaboratorError::Request {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

async fn rejected(response: Response) -> CollaboratorError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    CollaboratorError::Rejected {
        service: SERVICE,
        status,
        body,
    }
}

#[async_trait]
impl EntityDataSource for EntityServiceClient {
    async fn fetch(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<EntityData, CollaboratorError> {
        let url = format!("{}/workflow-data", self.entity_url(entity_type, entity_id));
        let response = self
            .execute(self.authorized(self.client.get(url), organization_id))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CollaboratorError::EntityNotFound {
                entity_type,
                entity_id,
            }),
            status if status.is_success() => {
                response
                    .json::<EntityData>()
                    .await
                    .map_err(|e| CollaboratorError::Request {
                        service: SERVICE,
                        message: format!("invalid entity payload: {e}"),
                    })
            }
            _ => Err(rejected(response).await),
        }
    }
}

#[async_trait]
impl EntityCallbacks for EntityServiceClient {
    async fn update_field(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        update: &FieldUpdate,
    ) -> Result<(), CollaboratorError> {
        let url = format!("{}/fields", self.entity_url(entity_type, entity_id));
        let mut fields = serde_json::Map::new();
        fields.insert(update.field.clone(), update.value.clone());
        let builder = self.client.patch(url).json(&fields);
        let response = self.execute(self.authorized(builder, organization_id)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CollaboratorError::EntityNotFound {
                entity_type,
                entity_id,
            }),
            status if status.is_success() => Ok(()),
            _ => Err(rejected(response).await),
        }
    }

    async fn create_task(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        task: &TaskRequest,
    ) -> Result<(), CollaboratorError> {
        let builder = self.client.post(format!("{}/internal/tasks", self.base())).json(&json!({
            "entity_type": entity_type,
            "entity_id": entity_id,
            "title": task.title,
            "description": task.description,
            "assignee_id": task.assignee_id,
            "due_at": task.due_at,
        }));
        let response = self.execute(self.authorized(builder, organization_id)).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejected(response).await)
        }
    }
}
