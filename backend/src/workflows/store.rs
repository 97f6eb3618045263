// Workflow Store - persistence seam for definitions, jobs and the execution log
//
// Every definition query is scoped by organization at the workflow level; child
// rows are addressed through their parent so a foreign id never resolves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gestor_shared::{
    BusinessModule, EntityType, JobStatus, LogEvent, MessageChannel, MessageTemplate, ScheduledJob,
    Workflow, WorkflowAction, WorkflowDetail, WorkflowExecutionLog, WorkflowState, WorkflowTransition,
    WorkflowTrigger,
};
use uuid::Uuid;

use super::error::WorkflowError;
use crate::pagination::PaginationParams;

pub type StoreResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowFilter {
    pub module: Option<BusinessModule>,
    pub entity_type: Option<EntityType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub trigger_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    pub workflow_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub event: Option<LogEvent>,
}

/// Outcome of releasing claims whose sweep never settled them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveredJobs {
    pub requeued: u64,
    pub failed: u64,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // ----- Workflows -----

    async fn insert_workflow(&self, workflow: &Workflow) -> StoreResult<()>;
    async fn get_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> StoreResult<Option<Workflow>>;
    async fn list_workflows(&self, organization_id: Uuid, filter: &WorkflowFilter) -> StoreResult<Vec<Workflow>>;
    async fn update_workflow(&self, workflow: &Workflow) -> StoreResult<()>;
    /// Cascades to states, transitions, triggers and actions
    async fn delete_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> StoreResult<bool>;
    async fn find_default_workflow(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
    ) -> StoreResult<Option<Workflow>>;
    /// Atomically clear the old default for the workflow's (module, entity_type) and set this one.
    /// Returns `None` when the workflow does not exist in the organization.
    async fn set_default_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> StoreResult<Option<Workflow>>;
    /// Insert a workflow together with its whole graph in one transaction
    async fn insert_workflow_detail(&self, detail: &WorkflowDetail) -> StoreResult<()>;

    // ----- States -----

    async fn insert_state(&self, state: &WorkflowState) -> StoreResult<()>;
    async fn list_states(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowState>>;
    async fn find_state_by_name(&self, workflow_id: Uuid, name: &str) -> StoreResult<Option<WorkflowState>>;
    async fn update_state(&self, state: &WorkflowState) -> StoreResult<()>;
    /// Cascades to transitions and triggers bound to the state
    async fn delete_state(&self, workflow_id: Uuid, state_id: Uuid) -> StoreResult<bool>;

    // ----- Transitions -----

    async fn insert_transition(&self, transition: &WorkflowTransition) -> StoreResult<()>;
    async fn list_transitions(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowTransition>>;
    async fn update_transition(&self, transition: &WorkflowTransition) -> StoreResult<()>;
    async fn delete_transition(&self, workflow_id: Uuid, transition_id: Uuid) -> StoreResult<bool>;

    // ----- Triggers -----

    async fn insert_trigger(&self, trigger: &WorkflowTrigger) -> StoreResult<()>;
    /// Unscoped; callers check the owning workflow's organization
    async fn get_trigger(&self, trigger_id: Uuid) -> StoreResult<Option<WorkflowTrigger>>;
    async fn list_triggers(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowTrigger>>;
    /// Triggers bound to a state, oldest first
    async fn list_state_triggers(&self, state_id: Uuid) -> StoreResult<Vec<WorkflowTrigger>>;
    async fn update_trigger(&self, trigger: &WorkflowTrigger) -> StoreResult<()>;
    async fn delete_trigger(&self, workflow_id: Uuid, trigger_id: Uuid) -> StoreResult<bool>;

    // ----- Actions -----

    async fn insert_action(&self, action: &WorkflowAction) -> StoreResult<()>;
    /// Ordered by `action_order`, then creation time
    async fn list_actions(&self, trigger_id: Uuid) -> StoreResult<Vec<WorkflowAction>>;
    async fn update_action(&self, action: &WorkflowAction) -> StoreResult<()>;
    async fn delete_action(&self, trigger_id: Uuid, action_id: Uuid) -> StoreResult<bool>;

    // ----- Message templates -----

    async fn insert_template(&self, template: &MessageTemplate) -> StoreResult<()>;
    async fn get_template(&self, organization_id: Uuid, template_id: Uuid) -> StoreResult<Option<MessageTemplate>>;
    async fn list_templates(
        &self,
        organization_id: Uuid,
        channel: Option<MessageChannel>,
    ) -> StoreResult<Vec<MessageTemplate>>;
    async fn update_template(&self, template: &MessageTemplate) -> StoreResult<()>;
    async fn delete_template(&self, organization_id: Uuid, template_id: Uuid) -> StoreResult<bool>;

    // ----- Scheduled jobs -----

    async fn insert_job(&self, job: &ScheduledJob) -> StoreResult<()>;
    async fn get_job(&self, organization_id: Uuid, job_id: Uuid) -> StoreResult<Option<ScheduledJob>>;
    async fn list_jobs(
        &self,
        organization_id: Uuid,
        filter: &JobFilter,
        page: &PaginationParams,
    ) -> StoreResult<(Vec<ScheduledJob>, i64)>;
    /// Cancel every pending job the organization holds for the entity; returns how many changed
    async fn cancel_pending_jobs(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<u64>;
    /// Cancel one pending job. `None` when it is missing or no longer pending.
    async fn cancel_job(&self, organization_id: Uuid, job_id: Uuid) -> StoreResult<Option<ScheduledJob>>;
    /// Move up to `limit` jobs with `status` that are due at `now` to in_flight,
    /// stamping `claimed_at` and incrementing `attempts`. `organization_id` narrows
    /// the claim to one tenant. Concurrent callers never receive the same job.
    async fn claim_due_jobs(
        &self,
        status: JobStatus,
        organization_id: Option<Uuid>,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ScheduledJob>>;
    /// Settle an in_flight job into a terminal status
    async fn finish_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Return an in_flight job to pending for another attempt
    async fn requeue_job(&self, job_id: Uuid, last_error: &str) -> StoreResult<()>;
    /// Release in_flight jobs claimed before `claimed_before`: requeue while under
    /// `max_attempts`, fail otherwise
    async fn recover_stale_jobs(
        &self,
        claimed_before: DateTime<Utc>,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<RecoveredJobs>;

    // ----- Execution log -----

    async fn append_log(&self, entry: &WorkflowExecutionLog) -> StoreResult<()>;
    async fn list_logs(
        &self,
        organization_id: Uuid,
        filter: &LogFilter,
        page: &PaginationParams,
    ) -> StoreResult<(Vec<WorkflowExecutionLog>, i64)>;
}
