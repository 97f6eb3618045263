// Workflow Actions - typed action configs and their resolution against entity data

use chrono::{DateTime, Duration, Utc};
use gestor_shared::{ActionType, EntityType, MessageChannel, WorkflowAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::WorkflowError;
use super::store::WorkflowStore;
use super::template::{self, TemplateData};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageConfig {
    /// Required when the action has no template
    #[serde(default)]
    pub channel: Option<MessageChannel>,
    /// Entity data key holding the recipient address
    #[serde(default)]
    pub recipient_field: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Inline body, used when the action has no template
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFieldConfig {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskConfig {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub due_in_minutes: Option<i64>,
}

/// Upper bound for a task's due offset
pub const MAX_TASK_DUE_MINUTES: i64 = 10 * 365 * 24 * 60;

/// `action_config` decoded by `action_type`
#[derive(Debug, Clone, PartialEq)]
pub enum ActionConfig {
    SendMessage(SendMessageConfig),
    UpdateField(UpdateFieldConfig),
    CreateTask(CreateTaskConfig),
}

impl ActionConfig {
    pub fn decode(action_type: ActionType, raw: &Value) -> Result<Self, WorkflowError> {
        let raw = match raw {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };
        let decoded = match action_type {
            ActionType::SendMessage => serde_json::from_value(raw).map(Self::SendMessage),
            ActionType::UpdateField => serde_json::from_value(raw).map(Self::UpdateField),
            ActionType::CreateTask => serde_json::from_value(raw).map(Self::CreateTask),
        };
        decoded.map_err(|e| WorkflowError::InvalidActionConfig {
            action_type,
            message: e.to_string(),
        })
    }

    /// Decode and check the invariants an action must satisfy before it is stored
    pub fn validate(
        action_type: ActionType,
        raw: &Value,
        template_id: Option<Uuid>,
    ) -> Result<Self, WorkflowError> {
        let config = Self::decode(action_type, raw)?;
        let invalid = |message: &str| WorkflowError::InvalidActionConfig {
            action_type,
            message: message.to_string(),
        };

        match &config {
            Self::SendMessage(c) => {
                let has_body = c.body.as_deref().is_some_and(|b| !b.trim().is_empty());
                if template_id.is_none() && !has_body {
                    return Err(invalid("a template or an inline body is required"));
                }
                if c.recipient_field.as_deref().is_some_and(|f| f.trim().is_empty()) {
                    return Err(invalid("recipient_field cannot be blank"));
                }
            }
            Self::UpdateField(c) => {
                if c.field.trim().is_empty() {
                    return Err(invalid("field is required"));
                }
            }
            Self::CreateTask(c) => {
                if c.title.trim().is_empty() {
                    return Err(invalid("title is required"));
                }
                if c.due_in_minutes.is_some_and(|m| m < 0) {
                    return Err(invalid("due_in_minutes cannot be negative"));
                }
                if c.due_in_minutes.is_some_and(|m| m > MAX_TASK_DUE_MINUTES) {
                    return Err(invalid("due_in_minutes cannot exceed ten years"));
                }
            }
        }
        if template_id.is_some() && action_type != ActionType::SendMessage {
            return Err(invalid("only send_message actions can reference a template"));
        }
        Ok(config)
    }
}

/// Recipient key used when a send_message action names none
pub fn default_recipient_field(entity_type: EntityType, channel: MessageChannel) -> &'static str {
    match (entity_type, channel) {
        (EntityType::Session, MessageChannel::Chat) => "patient_phone",
        (EntityType::Session, MessageChannel::Email) => "patient_email",
        (_, MessageChannel::Chat) => "client_phone",
        (_, MessageChannel::Email) => "client_email",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub channel: MessageChannel,
    pub template_id: Option<Uuid>,
    pub recipient_field: String,
    /// `None` when the entity data has no usable value under `recipient_field`
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub due_at: Option<DateTime<Utc>>,
}

/// An action with every template variable substituted, ready to perform or preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedAction {
    Message(RenderedMessage),
    FieldUpdate(FieldUpdate),
    Task(TaskRequest),
}

/// Render one action against `data`. Used by both the dispatcher and the simulator.
pub async fn resolve_action(
    store: &dyn WorkflowStore,
    organization_id: Uuid,
    entity_type: EntityType,
    action: &WorkflowAction,
    data: &TemplateData,
    now: DateTime<Utc>,
) -> Result<ResolvedAction, WorkflowError> {
    match ActionConfig::decode(action.action_type, &action.action_config)? {
        ActionConfig::SendMessage(config) => {
            let message =
                render_message(store, organization_id, entity_type, action, config, data).await?;
            Ok(ResolvedAction::Message(message))
        }
        ActionConfig::UpdateField(config) => {
            let value = match config.value {
                Value::String(s) => Value::String(template::render(&s, data)),
                other => other,
            };
            Ok(ResolvedAction::FieldUpdate(FieldUpdate {
                field: config.field,
                value,
            }))
        }
        ActionConfig::CreateTask(config) => {
            let due_at = match config.due_in_minutes {
                Some(minutes) => Some(
                    Duration::try_minutes(minutes)
                        .and_then(|offset| now.checked_add_signed(offset))
                        .ok_or_else(|| WorkflowError::InvalidActionConfig {
                            action_type: action.action_type,
                            message: format!("due_in_minutes {minutes} is out of range"),
                        })?,
                ),
                None => None,
            };
            Ok(ResolvedAction::Task(TaskRequest {
                title: template::render(&config.title, data),
                description: template::render_opt(config.description.as_deref(), data),
                assignee_id: config.assignee_id,
                due_at,
            }))
        }
    }
}

async fn render_message(
    store: &dyn WorkflowStore,
    organization_id: Uuid,
    entity_type: EntityType,
    action: &WorkflowAction,
    config: SendMessageConfig,
    data: &TemplateData,
) -> Result<RenderedMessage, WorkflowError> {
    let (channel, subject, body) = match action.template_id {
        Some(template_id) => {
            let template = store
                .get_template(organization_id, template_id)
                .await?
                .ok_or(WorkflowError::NotFound("Message template"))?;
            (template.channel, template.subject.or(config.subject), template.body)
        }
        None => {
            let body = config.body.ok_or_else(|| WorkflowError::InvalidActionConfig {
                action_type: action.action_type,
                message: "a template or an inline body is required".to_string(),
            })?;
            (config.channel.unwrap_or(MessageChannel::Chat), config.subject, body)
        }
    };

    let recipient_field = config
        .recipient_field
        .unwrap_or_else(|| default_recipient_field(entity_type, channel).to_string());
    let recipient = template::lookup(data, &recipient_field)
        .map(template::value_to_string)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(RenderedMessage {
        channel,
        template_id: action.template_id,
        recipient_field,
        recipient,
        subject: template::render_opt(subject.as_deref(), data),
        body: template::render(&body, data),
    })
}
