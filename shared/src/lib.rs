use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ===== Vocabularies =====

/// Business vertical a workflow belongs to
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "business_module", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessModule {
    Clinical,
    Construction,
}

impl BusinessModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clinical => "clinical",
            Self::Construction => "construction",
        }
    }

    /// Entity types governed by workflows of this module
    pub fn entity_types(&self) -> &'static [EntityType] {
        match self {
            Self::Clinical => &[EntityType::Session],
            Self::Construction => &[EntityType::Budget, EntityType::Project],
        }
    }
}

impl fmt::Display for BusinessModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of business object a workflow governs
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "workflow_entity_type", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Session,
    Budget,
    Project,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Budget => "budget",
            Self::Project => "project",
        }
    }

    pub fn module(&self) -> BusinessModule {
        match self {
            Self::Session => BusinessModule::Clinical,
            Self::Budget | Self::Project => BusinessModule::Construction,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational classification of a state; never enforced by the reactor
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "workflow_state_type", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    Initial,
    Intermediate,
    Final,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "workflow_trigger_type", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    OnEnter,
    OnExit,
    TimeBefore,
    TimeAfter,
    /// Stored for an external periodic evaluator; the reactor ignores it
    Recurring,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnEnter => "on_enter",
            Self::OnExit => "on_exit",
            Self::TimeBefore => "time_before",
            Self::TimeAfter => "time_after",
            Self::Recurring => "recurring",
        }
    }

    pub fn is_time_based(&self) -> bool {
        matches!(self, Self::TimeBefore | Self::TimeAfter)
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "workflow_action_type", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendMessage,
    UpdateField,
    CreateTask,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::UpdateField => "update_field",
            Self::CreateTask => "create_task",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "message_channel", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageChannel {
    Chat,
    Email,
}

impl MessageChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "scheduled_job_status", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    /// Claimed by a dispatcher sweep, side effects under way
    InFlight,
    #[serde(alias = "sent")]
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "workflow_log_event", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    StateChanged,
    ActionExecuted,
    ActionFailed,
    JobCompleted,
    JobFailed,
    JobSkipped,
    JobCancelled,
}

impl LogEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateChanged => "state_changed",
            Self::ActionExecuted => "action_executed",
            Self::ActionFailed => "action_failed",
            Self::JobCompleted => "job_completed",
            Self::JobFailed => "job_failed",
            Self::JobSkipped => "job_skipped",
            Self::JobCancelled => "job_cancelled",
        }
    }
}

// ===== Definitions =====

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub module: BusinessModule,
    pub entity_type: EntityType,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Must match the entity's own status string exactly
    pub name: String,
    pub label: Option<String>,
    pub state_type: StateType,
    pub position: i32,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub from_state_id: Uuid,
    pub to_state_id: Uuid,
    pub name: String,
    pub requires_confirmation: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub state_id: Option<Uuid>,
    pub transition_id: Option<Uuid>,
    pub name: String,
    pub trigger_type: TriggerType,
    pub time_offset_minutes: i32,
    pub time_field: Option<String>,
    pub recurring_cron: Option<String>,
    pub conditions: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAction {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub action_type: ActionType,
    pub action_order: i32,
    pub action_config: serde_json::Value,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub channel: MessageChannel,
    pub subject: Option<String>,
    pub body: String,
    /// Declared placeholders, for the editor only
    pub variables: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerWithActions {
    #[serde(flatten)]
    pub trigger: WorkflowTrigger,
    pub actions: Vec<WorkflowAction>,
}

/// A workflow together with everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDetail {
    pub workflow: Workflow,
    pub states: Vec<WorkflowState>,
    pub transitions: Vec<WorkflowTransition>,
    pub triggers: Vec<TriggerWithActions>,
}

// ===== Runtime =====

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub trigger_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub workflow_id: Option<Uuid>,
    pub trigger_id: Option<Uuid>,
    pub action_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub event: LogEvent,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ===== Request payloads =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub name: String,
    pub description: Option<String>,
    pub module: BusinessModule,
    pub entity_type: EntityType,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateInput {
    pub name: String,
    pub label: Option<String>,
    pub state_type: StateType,
    #[serde(default)]
    pub position: i32,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionInput {
    pub from_state_id: Uuid,
    pub to_state_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub requires_confirmation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerInput {
    pub name: String,
    pub state_id: Option<Uuid>,
    pub transition_id: Option<Uuid>,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub time_offset_minutes: i32,
    pub time_field: Option<String>,
    pub recurring_cron: Option<String>,
    pub conditions: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInput {
    pub action_type: ActionType,
    #[serde(default)]
    pub action_order: i32,
    #[serde(default = "empty_object")]
    pub action_config: serde_json::Value,
    pub template_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplateInput {
    pub name: String,
    pub channel: MessageChannel,
    pub subject: Option<String>,
    pub body: String,
    /// Derived from the body when omitted
    pub variables: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Reported by entity services after a committed status transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    #[serde(default)]
    pub from_status: Option<String>,
    pub to_status: String,
    pub reference_time: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
