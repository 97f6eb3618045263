// Job Scheduler - runs the workflow job sweep on a fixed cadence

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler as TokioScheduler, JobSchedulerError};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::workflows::dispatcher::{JobDispatcher, SweepOptions, SweepReport};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Serialize)]
pub struct SweepRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub report: Option<SweepReport>,
    pub error: Option<String>,
}

pub struct JobScheduler {
    scheduler: TokioScheduler,
    dispatcher: Arc<JobDispatcher>,
}

impl JobScheduler {
    pub async fn new(dispatcher: Arc<JobDispatcher>) -> JobResult<Self> {
        let scheduler = TokioScheduler::new().await?;

        Ok(Self { scheduler, dispatcher })
    }

    pub async fn start(&self) -> JobResult<()> {
        let interval = self.dispatcher.config().interval;
        info!(interval_secs = interval.as_secs(), "Starting workflow dispatch scheduler");

        let dispatcher = self.dispatcher.clone();

        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let dispatcher = dispatcher.clone();

            Box::pin(async move {
                let run = run_sweep(&dispatcher).await;
                let duration_ms = (run.completed_at - run.started_at).num_milliseconds();
                match (&run.report, &run.error) {
                    (Some(report), _) => debug!(
                        run_id = %run.id,
                        duration_ms,
                        claimed = report.claimed,
                        completed = report.completed,
                        failed = report.failed,
                        requeued = report.requeued,
                        cancelled = report.cancelled,
                        skipped = report.skipped,
                        recovered = report.recovered,
                        "Scheduled sweep finished"
                    ),
                    (None, error) => error!(
                        run_id = %run.id,
                        duration_ms,
                        "Scheduled sweep failed: {}",
                        error.as_deref().unwrap_or("unknown error")
                    ),
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> JobResult<()> {
        info!("Shutting down workflow dispatch scheduler");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

/// One scheduled sweep with the configured batch limit
pub async fn run_sweep(dispatcher: &JobDispatcher) -> SweepRun {
    let started_at = Utc::now();
    let options = SweepOptions {
        limit: Some(dispatcher.config().batch_limit),
        ..SweepOptions::default()
    };

    let (report, error) = match dispatcher.run_sweep(options).await {
        Ok(report) => (Some(report), None),
        Err(e) => (None, Some(e.to_string())),
    };

    SweepRun {
        id: Uuid::new_v4(),
        started_at,
        completed_at: Utc::now(),
        report,
        error,
    }
}
