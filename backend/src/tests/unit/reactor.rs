// Unit tests for the state-change reactor

use chrono::{Duration, Utc};
use gestor_shared::{EntityType, JobStatus, LogEvent, TriggerType};
use uuid::Uuid;

use crate::tests::fixtures::*;
use crate::workflows::reactor::{SkipReason, StateChange};

fn change(org: Uuid, entity_id: Uuid, from: Option<&str>, to: &str) -> StateChange {
    StateChange {
        organization_id: org,
        entity_type: EntityType::Session,
        entity_id,
        from_status: from.map(str::to_string),
        to_status: to.to_string(),
        reference_time: None,
    }
}

#[tokio::test]
async fn test_on_enter_schedules_job_at_now() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let trigger = add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;

    let now = Utc::now();
    let session = Uuid::new_v4();
    let outcome = t
        .engine
        .reactor
        .on_entity_state_change_at(&change(org, session, None, "scheduled"), now)
        .await
        .unwrap();

    assert_eq!(outcome.workflow_id, Some(wf.workflow.id));
    assert_eq!(outcome.cancelled_jobs, 0);
    assert_eq!(outcome.scheduled.len(), 1);

    let job = &outcome.scheduled[0];
    assert_eq!(job.trigger_id, trigger.id);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.scheduled_for, now);
    assert_eq!(job.attempts, 0);

    let logs = t.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event, LogEvent::StateChanged);
    assert_eq!(logs[0].to_state.as_deref(), Some("scheduled"));
    assert_eq!(logs[0].from_state, None);
}

#[tokio::test]
async fn test_transition_cancels_pending_jobs_before_scheduling() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Agendada").await;
    let confirmed =
        add_chat_trigger(&t, org, wf.workflow.id, wf.state("confirmed"), TriggerType::OnEnter, 0, "Confirmada").await;

    let session = Uuid::new_v4();
    let reactor = &t.engine.reactor;
    let first = reactor
        .on_entity_state_change(&change(org, session, None, "scheduled"))
        .await
        .unwrap();
    let second = reactor
        .on_entity_state_change(&change(org, session, Some("scheduled"), "confirmed"))
        .await
        .unwrap();

    assert_eq!(second.cancelled_jobs, 1);
    assert_eq!(second.scheduled.len(), 1);
    assert_eq!(second.scheduled[0].trigger_id, confirmed.id);

    let old = t.store.job(first.scheduled[0].id).unwrap();
    assert_eq!(old.status, JobStatus::Cancelled);
    let new = t.store.job(second.scheduled[0].id).unwrap();
    assert_eq!(new.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_transition_leaves_other_organizations_jobs_alone() {
    let t = TestEngine::new();
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();
    let wf_a = session_workflow(&t, org_a).await;
    let wf_b = session_workflow(&t, org_b).await;
    add_chat_trigger(&t, org_a, wf_a.workflow.id, wf_a.state("confirmed"), TriggerType::OnEnter, 0, "A").await;
    add_chat_trigger(&t, org_b, wf_b.workflow.id, wf_b.state("scheduled"), TriggerType::OnEnter, 0, "B").await;

    // Same entity id reported by two tenants
    let session = Uuid::new_v4();
    let reactor = &t.engine.reactor;
    let b_entry = reactor
        .on_entity_state_change(&change(org_b, session, None, "scheduled"))
        .await
        .unwrap();
    let a_transition = reactor
        .on_entity_state_change(&change(org_a, session, Some("scheduled"), "confirmed"))
        .await
        .unwrap();

    assert_eq!(a_transition.cancelled_jobs, 0);
    let b_job = t.store.job(b_entry.scheduled[0].id).unwrap();
    assert_eq!(b_job.status, JobStatus::Pending);

    let cancelled = t
        .engine
        .queue
        .cancel_pending_jobs_for_entity(org_a, EntityType::Session, session)
        .await
        .unwrap();
    assert_eq!(cancelled, 1);
    assert_eq!(t.store.job(b_job.id).unwrap().status, JobStatus::Pending);
}

#[tokio::test]
async fn test_initial_entry_does_not_cancel() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;

    let session = Uuid::new_v4();
    let reactor = &t.engine.reactor;
    reactor
        .on_entity_state_change(&change(org, session, None, "scheduled"))
        .await
        .unwrap();
    let again = reactor
        .on_entity_state_change(&change(org, session, Some(""), "scheduled"))
        .await
        .unwrap();

    assert_eq!(again.cancelled_jobs, 0);
    let pending = t.store.jobs().iter().filter(|j| j.status == JobStatus::Pending).count();
    assert_eq!(pending, 2);
}

#[tokio::test]
async fn test_time_triggers_relative_to_reference() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let state = wf.state("scheduled");
    let before = add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::TimeBefore, 24 * 60, "Amanhã").await;
    let after = add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::TimeAfter, 60, "Como foi?").await;

    let now = Utc::now();
    let session_at = now + Duration::days(3);
    let mut event = change(org, Uuid::new_v4(), None, "scheduled");
    event.reference_time = Some(session_at);

    let outcome = t.engine.reactor.on_entity_state_change_at(&event, now).await.unwrap();
    assert_eq!(outcome.scheduled.len(), 2);

    let at = |trigger_id| {
        outcome
            .scheduled
            .iter()
            .find(|j| j.trigger_id == trigger_id)
            .map(|j| j.scheduled_for)
            .unwrap()
    };
    assert_eq!(at(before.id), session_at - Duration::hours(24));
    assert_eq!(at(after.id), session_at + Duration::hours(1));
}

#[tokio::test]
async fn test_past_time_before_is_skipped_but_time_after_fires() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let state = wf.state("scheduled");
    let before = add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::TimeBefore, 24 * 60, "Amanhã").await;
    add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::TimeAfter, 30, "Depois").await;

    let now = Utc::now();
    let mut event = change(org, Uuid::new_v4(), None, "scheduled");
    event.reference_time = Some(now + Duration::hours(2));

    let outcome = t.engine.reactor.on_entity_state_change_at(&event, now).await.unwrap();
    assert_eq!(outcome.scheduled.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].trigger_id, before.id);
    assert_eq!(outcome.skipped[0].reason, SkipReason::PastDue);
}

#[tokio::test]
async fn test_no_default_workflow_is_noop() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    t.engine
        .definitions
        .create_workflow(org, workflow_input(EntityType::Session, "Not default"))
        .await
        .unwrap();

    let outcome = t
        .engine
        .reactor
        .on_entity_state_change(&change(org, Uuid::new_v4(), None, "scheduled"))
        .await
        .unwrap();

    assert_eq!(outcome.workflow_id, None);
    assert!(t.store.jobs().is_empty());
    assert!(t.store.logs().is_empty());
}

#[tokio::test]
async fn test_inactive_default_workflow_is_noop() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;

    let mut input = workflow_input(EntityType::Session, "Atendimento");
    input.is_active = false;
    t.engine
        .definitions
        .update_workflow(org, wf.workflow.id, input)
        .await
        .unwrap();

    let outcome = t
        .engine
        .reactor
        .on_entity_state_change(&change(org, Uuid::new_v4(), None, "scheduled"))
        .await
        .unwrap();
    assert!(outcome.scheduled.is_empty());
    assert!(t.store.jobs().is_empty());
}

#[tokio::test]
async fn test_unknown_status_is_noop() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;

    let outcome = t
        .engine
        .reactor
        .on_entity_state_change(&change(org, Uuid::new_v4(), Some("scheduled"), "archived"))
        .await
        .unwrap();

    assert_eq!(outcome.workflow_id, Some(wf.workflow.id));
    assert_eq!(outcome.state_id, None);
    assert!(t.store.logs().is_empty());
}

#[tokio::test]
async fn test_other_organization_default_is_ignored() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;

    let outcome = t
        .engine
        .reactor
        .on_entity_state_change(&change(Uuid::new_v4(), Uuid::new_v4(), None, "scheduled"))
        .await
        .unwrap();
    assert_eq!(outcome.workflow_id, None);
    assert!(t.store.jobs().is_empty());
}

#[tokio::test]
async fn test_inactive_and_ignored_triggers_do_not_schedule() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let state = wf.state("scheduled");

    let mut inactive = trigger_input(state, TriggerType::OnEnter, 0);
    inactive.is_active = false;
    t.engine.definitions.create_trigger(org, wf.workflow.id, inactive).await.unwrap();
    add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::OnExit, 0, "Tchau").await;

    let outcome = t
        .engine
        .reactor
        .on_entity_state_change(&change(org, Uuid::new_v4(), None, "scheduled"))
        .await
        .unwrap();
    assert!(outcome.scheduled.is_empty());
    assert!(outcome.skipped.is_empty());
}

#[tokio::test]
async fn test_partial_failure_schedules_remaining_and_returns_error() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let state = wf.state("scheduled");
    let broken = add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::OnEnter, 0, "Um").await;
    let healthy = add_chat_trigger(&t, org, wf.workflow.id, state, TriggerType::OnEnter, 0, "Dois").await;
    t.store.fail_job_inserts_for(broken.id);

    let result = t
        .engine
        .reactor
        .on_entity_state_change(&change(org, Uuid::new_v4(), None, "scheduled"))
        .await;

    assert!(result.is_err());
    let jobs = t.store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].trigger_id, healthy.id);

    let logs = t.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].details["failed"][0]["trigger_id"], broken.id.to_string());
}

#[tokio::test]
async fn test_log_failure_does_not_fail_state_change() {
    let t = TestEngine::new();
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;
    t.store.fail_log_appends();

    let outcome = t
        .engine
        .reactor
        .on_entity_state_change(&change(org, Uuid::new_v4(), None, "scheduled"))
        .await
        .unwrap();
    assert_eq!(outcome.scheduled.len(), 1);
}
