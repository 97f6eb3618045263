// Job Dispatcher - sweep-driven execution of due scheduled jobs
//
// A sweep claims due jobs (pending -> in_flight) before any side effect, so
// concurrent sweepers in other processes never execute the same job. Every
// collaborator call is bounded by the delivery timeout.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use gestor_shared::{JobStatus, LogEvent, ScheduledJob, WorkflowAction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::actions::{resolve_action, ResolvedAction};
use super::collaborators::{CollaboratorError, Collaborators, EntityData, SendRequest};
use super::conditions::ConditionGroup;
use super::error::{WorkflowError, WorkflowResult};
use super::execution_log::{ExecutionLogger, LogEntryBuilder};
use super::store::WorkflowStore;
use crate::config::DispatcherConfig;

/// Hard cap on a single sweep's batch, whatever the caller asks for
pub const MAX_BATCH_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct SweepOptions {
    #[serde(default = "default_status")]
    pub status: JobStatus,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Restricts claims to one organization. Set by the API, never by the request body.
    #[serde(skip)]
    pub organization_id: Option<Uuid>,
}

fn default_status() -> JobStatus {
    JobStatus::Pending
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            limit: None,
            organization_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub claimed: u64,
    pub completed: u64,
    pub failed: u64,
    pub requeued: u64,
    pub cancelled: u64,
    /// Completed without running actions because conditions did not hold
    pub skipped: u64,
    /// Stale in_flight claims released before claiming
    pub recovered: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum JobOutcome {
    Completed,
    Skipped,
    Cancelled(String),
    Failed(String),
    TimedOut(String),
}

enum ActionFailure {
    Failed(String),
    TimedOut(String),
}

impl From<WorkflowError> for ActionFailure {
    fn from(err: WorkflowError) -> Self {
        Self::Failed(err.to_string())
    }
}

pub struct JobDispatcher {
    store: Arc<dyn WorkflowStore>,
    collaborators: Collaborators,
    log: ExecutionLogger,
    config: DispatcherConfig,
    sweep_lock: Mutex<()>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        collaborators: Collaborators,
        log: ExecutionLogger,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            collaborators,
            log,
            config,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub async fn run_sweep(&self, options: SweepOptions) -> WorkflowResult<SweepReport> {
        self.run_sweep_at(options, Utc::now()).await
    }

    pub async fn run_sweep_at(&self, options: SweepOptions, now: DateTime<Utc>) -> WorkflowResult<SweepReport> {
        if !matches!(options.status, JobStatus::Pending | JobStatus::Failed) {
            return Err(WorkflowError::validation(
                "status",
                "only pending or failed jobs can be dispatched",
            ));
        }

        let Ok(_guard) = self.sweep_lock.try_lock() else {
            tracing::info!("Dispatch sweep already running, skipping");
            return Ok(SweepReport::default());
        };

        let limit = options
            .limit
            .unwrap_or(self.config.batch_limit)
            .clamp(1, MAX_BATCH_LIMIT);
        let mut report = SweepReport::default();

        let claim_timeout = ChronoDuration::from_std(self.config.claim_timeout)
            .unwrap_or_else(|_| ChronoDuration::seconds(300));
        let recovered = self
            .store
            .recover_stale_jobs(now - claim_timeout, self.config.max_attempts, now)
            .await?;
        report.recovered = recovered.requeued + recovered.failed;
        if report.recovered > 0 {
            tracing::warn!(
                requeued = recovered.requeued,
                failed = recovered.failed,
                "Released stale job claims"
            );
        }

        let jobs = self
            .store
            .claim_due_jobs(options.status, options.organization_id, now, limit)
            .await?;
        report.claimed = jobs.len() as u64;

        for job in &jobs {
            let outcome = self.execute_job(job, now).await;
            self.settle(job, &outcome, &mut report).await;
        }

        if report.claimed > 0 {
            tracing::info!(
                claimed = report.claimed,
                completed = report.completed,
                failed = report.failed,
                requeued = report.requeued,
                "Dispatch sweep finished"
            );
        }
        Ok(report)
    }

    async fn execute_job(&self, job: &ScheduledJob, now: DateTime<Utc>) -> JobOutcome {
        let trigger = match self.store.get_trigger(job.trigger_id).await {
            Ok(Some(trigger)) => trigger,
            Ok(None) => return JobOutcome::Failed("trigger not found".to_string()),
            Err(e) => return JobOutcome::Failed(e.to_string()),
        };

        // The trigger must belong to a workflow of the job's organization
        match self.store.get_workflow(job.organization_id, trigger.workflow_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return JobOutcome::Failed("trigger not found".to_string()),
            Err(e) => return JobOutcome::Failed(e.to_string()),
        }

        if !trigger.is_active {
            return JobOutcome::Cancelled("trigger is inactive".to_string());
        }

        let actions = match self.store.list_actions(trigger.id).await {
            Ok(actions) => actions,
            Err(e) => return JobOutcome::Failed(e.to_string()),
        };

        let data = match self
            .bounded(self.collaborators.entities.fetch(job.organization_id, job.entity_type, job.entity_id))
            .await
        {
            Ok(data) => data,
            Err(ActionFailure::Failed(message)) => return JobOutcome::Failed(message),
            Err(ActionFailure::TimedOut(message)) => return JobOutcome::TimedOut(message),
        };

        match ConditionGroup::decode(trigger.conditions.as_ref()) {
            Ok(Some(group)) if !group.evaluate(&data) => return JobOutcome::Skipped,
            Ok(_) => {}
            Err(e) => return JobOutcome::Failed(e.to_string()),
        }

        for action in &actions {
            match self.run_action(job, action, &data, now).await {
                Ok(output) => {
                    self.log
                        .record(
                            LogEntryBuilder::for_job(job, LogEvent::ActionExecuted)
                                .workflow(trigger.workflow_id)
                                .action(action.id)
                                .details(json!({
                                    "action_type": action.action_type,
                                    "attempt": job.attempts,
                                    "output": output,
                                })),
                        )
                        .await;
                }
                Err(failure) => {
                    let (message, outcome) = match failure {
                        ActionFailure::Failed(m) => (m.clone(), JobOutcome::Failed(m)),
                        ActionFailure::TimedOut(m) => (m.clone(), JobOutcome::TimedOut(m)),
                    };
                    self.log
                        .record(
                            LogEntryBuilder::for_job(job, LogEvent::ActionFailed)
                                .workflow(trigger.workflow_id)
                                .action(action.id)
                                .details(json!({
                                    "action_type": action.action_type,
                                    "attempt": job.attempts,
                                    "error": message,
                                })),
                        )
                        .await;
                    return outcome;
                }
            }
        }

        JobOutcome::Completed
    }

    async fn run_action(
        &self,
        job: &ScheduledJob,
        action: &WorkflowAction,
        data: &EntityData,
        now: DateTime<Utc>,
    ) -> Result<Value, ActionFailure> {
        let resolved = resolve_action(
            self.store.as_ref(),
            job.organization_id,
            job.entity_type,
            action,
            data,
            now,
        )
        .await?;

        match resolved {
            ResolvedAction::Message(message) => {
                let recipient = message.recipient.clone().ok_or_else(|| {
                    ActionFailure::Failed(format!(
                        "{} data has no value for recipient field '{}'",
                        job.entity_type, message.recipient_field
                    ))
                })?;
                let request = SendRequest {
                    organization_id: job.organization_id,
                    job_id: job.id,
                    action_id: action.id,
                    idempotency_key: format!("{}:{}", job.id, job.attempts),
                    channel: message.channel,
                    recipient,
                    subject: message.subject,
                    body: message.body,
                };
                let receipt = self
                    .bounded(self.collaborators.gateway(message.channel).send(&request))
                    .await?;
                Ok(json!({
                    "channel": request.channel,
                    "recipient": request.recipient,
                    "idempotency_key": request.idempotency_key,
                    "provider_message_id": receipt.provider_message_id,
                }))
            }
            ResolvedAction::FieldUpdate(update) => {
                self.bounded(self.collaborators.callbacks.update_field(
                    job.organization_id,
                    job.entity_type,
                    job.entity_id,
                    &update,
                ))
                .await?;
                Ok(json!({ "field": update.field, "value": update.value }))
            }
            ResolvedAction::Task(task) => {
                self.bounded(self.collaborators.callbacks.create_task(
                    job.organization_id,
                    job.entity_type,
                    job.entity_id,
                    &task,
                ))
                .await?;
                Ok(json!({ "title": task.title, "due_at": task.due_at }))
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, ActionFailure> {
        match tokio::time::timeout(self.config.delivery_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ActionFailure::Failed(e.to_string())),
            Err(_) => Err(ActionFailure::TimedOut(format!(
                "collaborator call timed out after {}ms",
                self.config.delivery_timeout.as_millis()
            ))),
        }
    }

    /// Persist a job's outcome. Store errors leave the job in_flight for stale recovery.
    async fn settle(&self, job: &ScheduledJob, outcome: &JobOutcome, report: &mut SweepReport) {
        let now = Utc::now();
        let (result, event, details) = match outcome {
            JobOutcome::Completed => {
                report.completed += 1;
                (
                    self.store.finish_job(job.id, JobStatus::Completed, None, now).await,
                    LogEvent::JobCompleted,
                    json!({ "attempt": job.attempts }),
                )
            }
            JobOutcome::Skipped => {
                report.skipped += 1;
                (
                    self.store.finish_job(job.id, JobStatus::Completed, None, now).await,
                    LogEvent::JobSkipped,
                    json!({ "attempt": job.attempts, "reason": "conditions not met" }),
                )
            }
            JobOutcome::Cancelled(reason) => {
                report.cancelled += 1;
                (
                    self.store.finish_job(job.id, JobStatus::Cancelled, Some(reason.as_str()), now).await,
                    LogEvent::JobCancelled,
                    json!({ "attempt": job.attempts, "reason": reason }),
                )
            }
            JobOutcome::Failed(error) => {
                report.failed += 1;
                (
                    self.store.finish_job(job.id, JobStatus::Failed, Some(error.as_str()), now).await,
                    LogEvent::JobFailed,
                    json!({ "attempt": job.attempts, "error": error }),
                )
            }
            JobOutcome::TimedOut(error) if job.attempts >= self.config.max_attempts => {
                report.failed += 1;
                (
                    self.store.finish_job(job.id, JobStatus::Failed, Some(error.as_str()), now).await,
                    LogEvent::JobFailed,
                    json!({ "attempt": job.attempts, "error": error, "attempts_exhausted": true }),
                )
            }
            JobOutcome::TimedOut(error) => {
                report.requeued += 1;
                (
                    self.store.requeue_job(job.id, error).await,
                    LogEvent::JobFailed,
                    json!({ "attempt": job.attempts, "error": error, "requeued": true }),
                )
            }
        };

        if let Err(e) = result {
            tracing::error!(job_id = %job.id, "Failed to record job outcome: {}", e);
        }
        match outcome {
            JobOutcome::Failed(error) | JobOutcome::TimedOut(error) => {
                tracing::warn!(job_id = %job.id, attempt = job.attempts, "Job did not complete: {}", error);
            }
            _ => tracing::debug!(job_id = %job.id, "Job settled as {:?}", event),
        }

        self.log
            .record(LogEntryBuilder::for_job(job, event).details(details))
            .await;
    }
}
