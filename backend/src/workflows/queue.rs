// Job Queue - create and cancel scheduled jobs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gestor_shared::{EntityType, JobStatus, ScheduledJob};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use super::store::{JobFilter, WorkflowStore};
use crate::pagination::PaginationParams;

#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn WorkflowStore>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn schedule_job(
        &self,
        organization_id: Uuid,
        trigger_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> WorkflowResult<ScheduledJob> {
        let job = ScheduledJob {
            id: Uuid::new_v4(),
            organization_id,
            trigger_id,
            entity_type,
            entity_id,
            scheduled_for,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            claimed_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.store.insert_job(&job).await?;

        tracing::debug!(
            job_id = %job.id,
            trigger_id = %trigger_id,
            entity_id = %entity_id,
            "Scheduled job for {}",
            scheduled_for
        );
        Ok(job)
    }

    /// Cancel the organization's pending jobs for an entity. Jobs already claimed by
    /// a sweep are left to finish.
    pub async fn cancel_pending_jobs_for_entity(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> WorkflowResult<u64> {
        let cancelled = self
            .store
            .cancel_pending_jobs(organization_id, entity_type, entity_id)
            .await?;
        if cancelled > 0 {
            tracing::info!(entity_type = %entity_type, entity_id = %entity_id, "Cancelled {} pending jobs", cancelled);
        }
        Ok(cancelled)
    }

    /// Operator cancellation of a single job
    pub async fn cancel_job(&self, organization_id: Uuid, job_id: Uuid) -> WorkflowResult<ScheduledJob> {
        if let Some(job) = self.store.cancel_job(organization_id, job_id).await? {
            return Ok(job);
        }
        match self.store.get_job(organization_id, job_id).await? {
            Some(job) => Err(WorkflowError::Conflict(format!(
                "Job is {} and can no longer be cancelled",
                job.status
            ))),
            None => Err(WorkflowError::NotFound("Scheduled job")),
        }
    }

    pub async fn list_jobs(
        &self,
        organization_id: Uuid,
        filter: &JobFilter,
        page: &PaginationParams,
    ) -> WorkflowResult<(Vec<ScheduledJob>, i64)> {
        self.store.list_jobs(organization_id, filter, page).await
    }
}
