// State-Change Reactor - turns a committed entity status change into scheduled jobs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gestor_shared::{EntityType, LogEvent, ScheduledJob, StateChangeEvent, TriggerType, WorkflowTrigger};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use super::execution_log::{ExecutionLogger, LogEntryBuilder};
use super::queue::JobQueue;
use super::store::WorkflowStore;

/// A status change reported by an entity service
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub organization_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    /// Empty or `None` when the entity was just created
    pub from_status: Option<String>,
    pub to_status: String,
    /// Entity date the time-based triggers are measured against
    pub reference_time: Option<DateTime<Utc>>,
}

impl StateChange {
    pub fn from_event(organization_id: Uuid, event: StateChangeEvent) -> Self {
        Self {
            organization_id,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            from_status: event.from_status,
            to_status: event.to_status,
            reference_time: event.reference_time,
        }
    }

    pub fn is_transition(&self) -> bool {
        self.from_status.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `time_before` instant is not in the future
    PastDue,
    /// `time_before` needs a reference time and none was given
    NoReferenceTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPlan {
    Schedule(DateTime<Utc>),
    Skip(SkipReason),
    /// Trigger types this entry point never fires
    Ignore,
}

/// When (if at all) a trigger fires for a state entered at `now`
pub fn plan_trigger(
    trigger: &WorkflowTrigger,
    reference_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> TriggerPlan {
    let offset = Duration::minutes(i64::from(trigger.time_offset_minutes));

    match trigger.trigger_type {
        TriggerType::OnEnter => TriggerPlan::Schedule(now),
        TriggerType::TimeBefore => match reference_time {
            Some(reference) => {
                let at = reference - offset;
                if at > now {
                    TriggerPlan::Schedule(at)
                } else {
                    TriggerPlan::Skip(SkipReason::PastDue)
                }
            }
            None => TriggerPlan::Skip(SkipReason::NoReferenceTime),
        },
        TriggerType::TimeAfter => TriggerPlan::Schedule(reference_time.unwrap_or(now) + offset),
        TriggerType::OnExit | TriggerType::Recurring => TriggerPlan::Ignore,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTrigger {
    pub trigger_id: Uuid,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReactorOutcome {
    pub workflow_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub cancelled_jobs: u64,
    pub scheduled: Vec<ScheduledJob>,
    pub skipped: Vec<SkippedTrigger>,
}

#[derive(Clone)]
pub struct StateChangeReactor {
    store: Arc<dyn WorkflowStore>,
    queue: JobQueue,
    log: ExecutionLogger,
}

impl StateChangeReactor {
    pub fn new(store: Arc<dyn WorkflowStore>, queue: JobQueue, log: ExecutionLogger) -> Self {
        Self { store, queue, log }
    }

    pub async fn on_entity_state_change(&self, change: &StateChange) -> WorkflowResult<ReactorOutcome> {
        self.on_entity_state_change_at(change, Utc::now()).await
    }

    pub async fn on_entity_state_change_at(
        &self,
        change: &StateChange,
        now: DateTime<Utc>,
    ) -> WorkflowResult<ReactorOutcome> {
        let Some(workflow) = self
            .store
            .find_default_workflow(change.organization_id, change.entity_type)
            .await?
            .filter(|w| w.is_active)
        else {
            tracing::debug!(
                entity_type = %change.entity_type,
                organization_id = %change.organization_id,
                "No active default workflow, ignoring state change"
            );
            return Ok(ReactorOutcome::default());
        };

        let Some(state) = self.store.find_state_by_name(workflow.id, &change.to_status).await? else {
            tracing::debug!(
                workflow_id = %workflow.id,
                to_status = %change.to_status,
                "Status has no matching workflow state"
            );
            return Ok(ReactorOutcome {
                workflow_id: Some(workflow.id),
                ..Default::default()
            });
        };

        // Cancel before scheduling so a re-entry never cancels its own new jobs
        let cancelled_jobs = if change.is_transition() {
            self.queue
                .cancel_pending_jobs_for_entity(change.organization_id, change.entity_type, change.entity_id)
                .await?
        } else {
            0
        };

        let triggers = self.store.list_state_triggers(state.id).await?;

        let mut outcome = ReactorOutcome {
            workflow_id: Some(workflow.id),
            state_id: Some(state.id),
            cancelled_jobs,
            ..Default::default()
        };
        let mut failed = Vec::new();
        let mut first_error: Option<WorkflowError> = None;

        for trigger in triggers.iter().filter(|t| t.is_active) {
            match plan_trigger(trigger, change.reference_time, now) {
                TriggerPlan::Schedule(when) => {
                    let scheduled = self
                        .queue
                        .schedule_job(
                            change.organization_id,
                            trigger.id,
                            change.entity_type,
                            change.entity_id,
                            when,
                        )
                        .await;
                    match scheduled {
                        Ok(job) => outcome.scheduled.push(job),
                        Err(e) => {
                            tracing::warn!(trigger_id = %trigger.id, "Failed to schedule trigger: {}", e);
                            failed.push(json!({ "trigger_id": trigger.id, "error": e.to_string() }));
                            first_error.get_or_insert(e);
                        }
                    }
                }
                TriggerPlan::Skip(reason) => outcome.skipped.push(SkippedTrigger {
                    trigger_id: trigger.id,
                    reason,
                }),
                TriggerPlan::Ignore => {}
            }
        }

        let fired: Vec<_> = outcome
            .scheduled
            .iter()
            .map(|j| json!({ "trigger_id": j.trigger_id, "job_id": j.id, "scheduled_for": j.scheduled_for }))
            .collect();
        self.log
            .record(
                LogEntryBuilder::new(
                    change.organization_id,
                    change.entity_type,
                    change.entity_id,
                    LogEvent::StateChanged,
                )
                .workflow(workflow.id)
                .transition(change.from_status.as_deref(), &change.to_status)
                .details(json!({
                    "state_id": state.id,
                    "cancelled_jobs": cancelled_jobs,
                    "fired": fired,
                    "skipped": outcome.skipped,
                    "failed": failed,
                })),
            )
            .await;

        tracing::info!(
            entity_type = %change.entity_type,
            entity_id = %change.entity_id,
            to_status = %change.to_status,
            "State change scheduled {} jobs, cancelled {}",
            outcome.scheduled.len(),
            cancelled_jobs
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}
