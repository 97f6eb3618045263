use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tracing::{error, info};

use crate::config::SmtpConfig;
use crate::workflows::collaborators::{CollaboratorError, DeliveryReceipt, MessageGateway, SendRequest};

const SERVICE: &str = "smtp";

/// Email channel of the message gateway
#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl EmailService {
    pub fn new(smtp_config: &SmtpConfig) -> Result<Self, lettre::transport::smtp::Error> {
        let builder = if smtp_config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_config.host)
        };

        let transport = builder
            .port(smtp_config.port)
            .credentials(Credentials::new(
                smtp_config.username.clone(),
                smtp_config.password.clone(),
            ))
            .pool_config(PoolConfig::new().max_size(10))
            .timeout(Some(Duration::from_secs(10)))
            .build();

        Ok(EmailService {
            transport,
            from_email: smtp_config.from_email.clone(),
            from_name: smtp_config.from_name.clone(),
        })
    }

    /// Build the outgoing message; the idempotency key becomes the Message-ID
    pub fn build_message(&self, request: &SendRequest) -> Result<Message, CollaboratorError> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| CollaboratorError::Request {
                service: SERVICE,
                message: format!("invalid sender address: {e}"),
            })?;
        let to = request
            .recipient
            .parse::<Mailbox>()
            .map_err(|_| CollaboratorError::InvalidRecipient(request.recipient.clone()))?;

        let domain = self.from_email.rsplit('@').next().unwrap_or("localhost");
        Message::builder()
            .from(from)
            .to(to)
            .subject(request.subject.clone().unwrap_or_default())
            .message_id(Some(format!("<{}@{}>", request.idempotency_key, domain)))
            .header(ContentType::TEXT_PLAIN)
            .body(request.body.clone())
            .map_err(|e| CollaboratorError::Request {
                service: SERVICE,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl MessageGateway for EmailService {
    async fn send(&self, request: &SendRequest) -> Result<DeliveryReceipt, CollaboratorError> {
        let message = self.build_message(request)?;

        match self.transport.send(message).await {
            Ok(response) => {
                info!(job_id = %request.job_id, recipient = %request.recipient, "Email sent");
                Ok(DeliveryReceipt {
                    provider_message_id: response.message().next().map(str::to_string),
                })
            }
            Err(e) => {
                error!(job_id = %request.job_id, recipient = %request.recipient, "Failed to send email: {}", e);
                Err(CollaboratorError::Request {
                    service: SERVICE,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Stands in for the email channel when SMTP is not configured; every send fails
pub struct EmailDisabled;

#[async_trait]
impl MessageGateway for EmailDisabled {
    async fn send(&self, _request: &SendRequest) -> Result<DeliveryReceipt, CollaboratorError> {
        Err(CollaboratorError::Request {
            service: SERVICE,
            message: "SMTP is not configured".to_string(),
        })
    }
}
