// Execution Log - append-only record of state changes and job outcomes
//
// Appends are best-effort: a failed write is reported through tracing and never
// fails the reactor or dispatcher operation that produced it.

use std::sync::Arc;

use chrono::Utc;
use gestor_shared::{EntityType, LogEvent, ScheduledJob, WorkflowExecutionLog};
use serde_json::{json, Value};
use uuid::Uuid;

use super::store::{LogFilter, StoreResult, WorkflowStore};
use crate::pagination::PaginationParams;

/// Builder for execution log entries
#[derive(Debug, Clone)]
pub struct LogEntryBuilder {
    organization_id: Uuid,
    entity_type: EntityType,
    entity_id: Uuid,
    event: LogEvent,
    workflow_id: Option<Uuid>,
    trigger_id: Option<Uuid>,
    action_id: Option<Uuid>,
    job_id: Option<Uuid>,
    from_state: Option<String>,
    to_state: Option<String>,
    details: Value,
}

impl LogEntryBuilder {
    pub fn new(organization_id: Uuid, entity_type: EntityType, entity_id: Uuid, event: LogEvent) -> Self {
        Self {
            organization_id,
            entity_type,
            entity_id,
            event,
            workflow_id: None,
            trigger_id: None,
            action_id: None,
            job_id: None,
            from_state: None,
            to_state: None,
            details: json!({}),
        }
    }

    /// Entry about a job, pre-filled with its entity, trigger and attempt
    pub fn for_job(job: &ScheduledJob, event: LogEvent) -> Self {
        Self::new(job.organization_id, job.entity_type, job.entity_id, event)
            .job(job.id)
            .trigger(job.trigger_id)
    }

    pub fn workflow(mut self, id: Uuid) -> Self {
        self.workflow_id = Some(id);
        self
    }

    pub fn trigger(mut self, id: Uuid) -> Self {
        self.trigger_id = Some(id);
        self
    }

    pub fn action(mut self, id: Uuid) -> Self {
        self.action_id = Some(id);
        self
    }

    pub fn job(mut self, id: Uuid) -> Self {
        self.job_id = Some(id);
        self
    }

    pub fn transition(mut self, from: Option<&str>, to: &str) -> Self {
        self.from_state = from.map(str::to_string);
        self.to_state = Some(to.to_string());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn build(self) -> WorkflowExecutionLog {
        WorkflowExecutionLog {
            id: Uuid::new_v4(),
            organization_id: self.organization_id,
            workflow_id: self.workflow_id,
            trigger_id: self.trigger_id,
            action_id: self.action_id,
            job_id: self.job_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            event: self.event,
            from_state: self.from_state,
            to_state: self.to_state,
            details: self.details,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct ExecutionLogger {
    store: Arc<dyn WorkflowStore>,
}

impl ExecutionLogger {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: LogEntryBuilder) {
        let entry = entry.build();
        if let Err(e) = self.store.append_log(&entry).await {
            tracing::warn!(
                event = entry.event.as_str(),
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                "Failed to append workflow execution log: {}",
                e
            );
        }
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        filter: &LogFilter,
        page: &PaginationParams,
    ) -> StoreResult<(Vec<WorkflowExecutionLog>, i64)> {
        self.store.list_logs(organization_id, filter, page).await
    }
}
