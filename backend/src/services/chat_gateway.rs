// Chat gateway client - delivers chat messages through the messaging provider's HTTP API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServiceEndpoint;
use crate::workflows::collaborators::{CollaboratorError, DeliveryReceipt, MessageGateway, SendRequest};

const SERVICE: &str = "chat-gateway";

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    organization_id: Uuid,
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayResponse {
    #[serde(default, alias = "id")]
    message_id: Option<String>,
}

pub struct ChatGatewayClient {
    client: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl ChatGatewayClient {
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    fn url(&self) -> String {
        format!("{}/messages", self.endpoint.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl MessageGateway for ChatGatewayClient {
    async fn send(&self, request: &SendRequest) -> Result<DeliveryReceipt, CollaboratorError> {
        let payload = OutboundMessage {
            organization_id: request.organization_id,
            to: &request.recipient,
            text: &request.body,
        };

        let mut builder = self
            .client
            .post(self.url())
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&payload);
        if let Some(token) = &self.endpoint.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| CollaboratorError::Request {
            service: SERVICE,
            message: e.to_string(),
        })?;

        if response.status().is_success() {
            let body: GatewayResponse = response.json().await.unwrap_or_default();
            tracing::debug!(job_id = %request.job_id, "Chat message accepted");
            Ok(DeliveryReceipt {
                provider_message_id: body.message_id,
            })
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(CollaboratorError::Rejected {
                service: SERVICE,
                status,
                body,
            })
        }
    }
}
