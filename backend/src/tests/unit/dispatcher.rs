// Unit tests for the job dispatcher sweep

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gestor_shared::{EntityType, JobStatus, LogEvent, ScheduledJob, TriggerType};
use serde_json::json;
use uuid::Uuid;

use crate::tests::fixtures::*;
use crate::workflows::collaborators::{Collaborators, DeliveryReceipt, MockMessageGateway};
use crate::workflows::dispatcher::{JobDispatcher, SweepOptions};
use crate::workflows::error::WorkflowError;
use crate::workflows::execution_log::ExecutionLogger;
use crate::workflows::store::WorkflowStore;

/// Org, session workflow with one on_enter chat trigger and a due job for a known session
async fn due_job(t: &TestEngine, body: &str) -> (Uuid, ScheduledJob) {
    let org = Uuid::new_v4();
    let wf = session_workflow(t, org).await;
    let trigger = add_chat_trigger(t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, body).await;

    let session = Uuid::new_v4();
    t.entities.insert(session, session_data());
    let job = t
        .engine
        .queue
        .schedule_job(org, trigger.id, EntityType::Session, session, Utc::now())
        .await
        .unwrap();
    (org, job)
}

#[tokio::test]
async fn test_sweep_sends_rendered_message_and_completes() {
    let t = TestEngine::new();
    let (org, job) = due_job(&t, "Olá {{patient_name}}, até {{session_time}}").await;

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);

    let sent = t.chat.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].organization_id, org);
    assert_eq!(sent[0].recipient, "+5511987654321");
    assert_eq!(sent[0].body, "Olá João Silva, até 14:30");
    assert_eq!(sent[0].idempotency_key, format!("{}:1", job.id));

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.completed_at.is_some());

    let events: Vec<_> = t.store.logs().iter().map(|l| l.event).collect();
    assert_eq!(events, vec![LogEvent::ActionExecuted, LogEvent::JobCompleted]);
}

#[tokio::test]
async fn test_completed_job_is_not_swept_again() {
    let t = TestEngine::new();
    due_job(&t, "Olá").await;

    t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    let second = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();

    assert_eq!(second.claimed, 0);
    assert_eq!(t.chat.sent().len(), 1);
}

#[tokio::test]
async fn test_future_job_is_not_claimed() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let trigger = add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;
    t.engine
        .queue
        .schedule_job(org, trigger.id, EntityType::Session, Uuid::new_v4(), Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.claimed, 0);
    assert_eq!(t.store.jobs()[0].status, JobStatus::Pending);
}

#[tokio::test]
async fn test_missing_recipient_fails_job() {
    let t = TestEngine::new();
    let (_, job) = due_job(&t, "Olá").await;
    t.entities.insert(job.entity_id, json!({ "patient_name": "João Silva" }));

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(t.chat.sent().is_empty());

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.last_error.unwrap().contains("patient_phone"));

    let events: Vec<_> = t.store.logs().iter().map(|l| l.event).collect();
    assert_eq!(events, vec![LogEvent::ActionFailed, LogEvent::JobFailed]);
}

#[tokio::test]
async fn test_unknown_entity_fails_job() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let trigger = add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;
    let job = t
        .engine
        .queue
        .schedule_job(org, trigger.id, EntityType::Session, Uuid::new_v4(), Utc::now())
        .await
        .unwrap();

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.failed, 1);
    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.last_error.unwrap().contains("not found"));
}

#[tokio::test]
async fn test_gateway_rejection_fails_without_retry() {
    let t = TestEngine::new();
    let (_, job) = due_job(&t, "Olá").await;
    t.chat.fail_with("number not on network");

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.requeued, 0);

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.last_error.unwrap().contains("number not on network"));
}

#[tokio::test]
async fn test_unmet_conditions_skip_actions() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;

    let mut input = trigger_input(wf.state("scheduled"), TriggerType::OnEnter, 0);
    input.conditions = Some(json!({
        "logic": "and",
        "conditions": [{ "field": "status", "operator": "equals", "value": "confirmed" }]
    }));
    let trigger = t
        .engine
        .definitions
        .create_trigger(org, wf.workflow.id, input)
        .await
        .unwrap()
        .trigger;
    t.engine
        .definitions
        .create_action(org, wf.workflow.id, trigger.id, chat_action("Olá"))
        .await
        .unwrap();

    let session = Uuid::new_v4();
    t.entities.insert(session, session_data());
    let job = t
        .engine
        .queue
        .schedule_job(org, trigger.id, EntityType::Session, session, Utc::now())
        .await
        .unwrap();

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(t.chat.sent().is_empty());
    assert_eq!(t.store.job(job.id).unwrap().status, JobStatus::Completed);

    let logs = t.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event, LogEvent::JobSkipped);
}

#[tokio::test]
async fn test_inactive_trigger_cancels_job() {
    let t = TestEngine::new();
    let (org, job) = due_job(&t, "Olá").await;

    let trigger = t.store.jobs()[0].trigger_id;
    let workflow_id = t.store.workflows()[0].id;
    let current = t
        .engine
        .definitions
        .get_trigger(org, workflow_id, trigger)
        .await
        .unwrap()
        .trigger;
    let mut input = trigger_input(current.state_id.unwrap(), TriggerType::OnEnter, 0);
    input.is_active = false;
    t.engine
        .definitions
        .update_trigger(org, workflow_id, trigger, input)
        .await
        .unwrap();

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert!(t.chat.sent().is_empty());

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert_eq!(stored.last_error.as_deref(), Some("trigger is inactive"));

    let logs = t.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event, LogEvent::JobCancelled);
    assert_eq!(logs[0].details["reason"], "trigger is inactive");
}

#[tokio::test]
async fn test_deleted_workflow_fails_job() {
    let t = TestEngine::new();
    let (org, job) = due_job(&t, "Olá").await;
    let workflow_id = t.store.workflows()[0].id;
    t.engine.definitions.delete_workflow(org, workflow_id).await.unwrap();

    t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("trigger not found"));
}

#[tokio::test]
async fn test_timeout_requeues_then_fails_at_max_attempts() {
    let mut config = test_config();
    config.delivery_timeout = Duration::from_millis(50);
    config.max_attempts = 2;
    let t = TestEngine::with_config(config);
    let (_, job) = due_job(&t, "Olá").await;
    t.chat.delay(Duration::from_millis(500));

    let first = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(first.requeued, 1);
    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert_eq!(stored.attempts, 1);
    assert!(stored.last_error.unwrap().contains("timed out"));

    let second = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(second.failed, 1);
    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn test_stale_claims_are_recovered() {
    let t = TestEngine::new();
    let (_, job) = due_job(&t, "Olá").await;

    let long_ago = Utc::now() - chrono::Duration::hours(1);
    t.store.put_job(ScheduledJob {
        status: JobStatus::InFlight,
        attempts: 1,
        claimed_at: Some(long_ago),
        ..job.clone()
    });

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.recovered, 1);
    assert_eq!(report.completed, 1);

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.attempts, 2);
    assert_eq!(t.chat.sent()[0].idempotency_key, format!("{}:2", job.id));
}

#[tokio::test]
async fn test_stale_claim_at_max_attempts_fails() {
    let t = TestEngine::new();
    let (_, job) = due_job(&t, "Olá").await;

    t.store.put_job(ScheduledJob {
        status: JobStatus::InFlight,
        attempts: 3,
        claimed_at: Some(Utc::now() - chrono::Duration::hours(1)),
        ..job.clone()
    });

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.recovered, 1);
    assert_eq!(report.claimed, 0);
    assert_eq!(t.store.job(job.id).unwrap().status, JobStatus::Failed);
    assert!(t.chat.sent().is_empty());
}

#[tokio::test]
async fn test_failed_jobs_are_only_retried_on_request() {
    let t = TestEngine::new();
    let (_, job) = due_job(&t, "Olá").await;
    t.chat.fail_with("gateway down");
    t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();

    let pending_only = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(pending_only.claimed, 0);

    let retry = SweepOptions {
        status: JobStatus::Failed,
        ..SweepOptions::default()
    };
    let report = t.engine.dispatcher.run_sweep(retry).await.unwrap();
    assert_eq!(report.claimed, 1);

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn test_sweep_rejects_non_dispatchable_status() {
    let t = TestEngine::new();
    let options = SweepOptions {
        status: JobStatus::Completed,
        ..SweepOptions::default()
    };

    let err = t.engine.dispatcher.run_sweep(options).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation { .. }));
}

#[tokio::test]
async fn test_sweep_respects_limit() {
    let t = TestEngine::new();
    let (org, first) = due_job(&t, "Olá").await;
    for _ in 0..2 {
        t.engine
            .queue
            .schedule_job(org, first.trigger_id, EntityType::Session, first.entity_id, Utc::now())
            .await
            .unwrap();
    }

    let options = SweepOptions {
        limit: Some(2),
        ..SweepOptions::default()
    };
    let report = t.engine.dispatcher.run_sweep(options).await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(t.chat.sent().len(), 2);
}

#[tokio::test]
async fn test_concurrent_dispatchers_never_double_send() {
    let t = TestEngine::new();
    due_job(&t, "Olá").await;
    t.chat.delay(Duration::from_millis(100));

    let other = JobDispatcher::new(
        t.store.clone(),
        Collaborators {
            entities: t.entities.clone(),
            callbacks: t.callbacks.clone(),
            chat: t.chat.clone(),
            email: t.email.clone(),
        },
        ExecutionLogger::new(t.store.clone()),
        test_config(),
    );

    let (a, b) = tokio::join!(
        t.engine.dispatcher.run_sweep(SweepOptions::default()),
        other.run_sweep(SweepOptions::default())
    );
    let claimed = a.unwrap().claimed + b.unwrap().claimed;

    assert_eq!(claimed, 1);
    assert_eq!(t.chat.sent().len(), 1);
}

#[tokio::test]
async fn test_overlapping_sweeps_in_one_process_are_skipped() {
    let t = TestEngine::new();
    due_job(&t, "Olá").await;
    t.chat.delay(Duration::from_millis(100));

    let dispatcher = &t.engine.dispatcher;
    let (a, b) = tokio::join!(
        dispatcher.run_sweep(SweepOptions::default()),
        dispatcher.run_sweep(SweepOptions::default())
    );

    assert_eq!(a.unwrap().claimed + b.unwrap().claimed, 1);
    assert_eq!(t.chat.sent().len(), 1);
}

#[tokio::test]
async fn test_gateway_receives_attempt_scoped_idempotency_key() {
    let mut gateway = MockMessageGateway::new();
    gateway
        .expect_send()
        .withf(|request| request.idempotency_key.ends_with(":1") && request.recipient == "+5511987654321")
        .times(1)
        .returning(|_| {
            Ok(DeliveryReceipt {
                provider_message_id: Some("wamid.1".to_string()),
            })
        });

    let t = TestEngine::with_chat_gateway(Arc::new(gateway), test_config());
    let (_, job) = due_job(&t, "Olá").await;

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.completed, 1);

    let logs = t.store.logs();
    let executed = logs.iter().find(|l| l.event == LogEvent::ActionExecuted).unwrap();
    assert_eq!(executed.job_id, Some(job.id));
    assert_eq!(executed.details["output"]["provider_message_id"], "wamid.1");
}

#[tokio::test]
async fn test_field_update_and_task_actions_call_back() {
    let t = TestEngine::new();
    let (org, job) = due_job(&t, "Olá").await;
    let workflow_id = t.store.workflows()[0].id;

    let definitions = &t.engine.definitions;
    definitions
        .create_action(
            org,
            workflow_id,
            job.trigger_id,
            gestor_shared::ActionInput {
                action_type: gestor_shared::ActionType::UpdateField,
                action_order: 1,
                action_config: json!({ "field": "reminder_sent", "value": true }),
                template_id: None,
            },
        )
        .await
        .unwrap();
    definitions
        .create_action(
            org,
            workflow_id,
            job.trigger_id,
            gestor_shared::ActionInput {
                action_type: gestor_shared::ActionType::CreateTask,
                action_order: 2,
                action_config: json!({ "title": "Ligar para {{patient_name}}" }),
                template_id: None,
            },
        )
        .await
        .unwrap();

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.completed, 1);

    let updates = t.callbacks.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, job.entity_id);
    assert_eq!(updates[0].1.field, "reminder_sent");
    assert_eq!(updates[0].1.value, json!(true));

    let tasks = t.callbacks.tasks.lock().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].1.title, "Ligar para João Silva");
}

#[tokio::test]
async fn test_out_of_range_task_offset_fails_job() {
    let t = TestEngine::new();
    let (_, job) = due_job(&t, "Olá").await;

    // Row written before the offset bound existed
    t.store
        .insert_action(&gestor_shared::WorkflowAction {
            id: Uuid::new_v4(),
            trigger_id: job.trigger_id,
            action_type: gestor_shared::ActionType::CreateTask,
            action_order: 5,
            action_config: json!({ "title": "Retorno", "due_in_minutes": i64::MAX / 2 }),
            template_id: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let report = t.engine.dispatcher.run_sweep(SweepOptions::default()).await.unwrap();
    assert_eq!(report.failed, 1);

    let stored = t.store.job(job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.last_error.unwrap().contains("out of range"));
    assert!(t.callbacks.tasks.lock().unwrap().is_empty());
}
