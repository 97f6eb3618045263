use axum::http::{Method, StatusCode};
use gestor_shared::TriggerType;
use serde_json::json;
use uuid::Uuid;

use crate::tests::fixtures::*;
use crate::tests::helpers::*;

#[tokio::test]
async fn test_state_change_schedules_and_dispatch_sends() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    add_chat_trigger(
        &t,
        org,
        wf.workflow.id,
        wf.state("confirmed"),
        TriggerType::OnEnter,
        0,
        "{{patient_name}}, sua sessão está confirmada",
    )
    .await;

    let session = Uuid::new_v4();
    t.entities.insert(session, session_data());

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/workflow-events/state-change",
            Some(org),
            Some(json!({
                "entity_type": "session",
                "entity_id": session,
                "from_status": "scheduled",
                "to_status": "confirmed"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["scheduled"].as_array().unwrap().len(), 1);

    let response = send(
        &app,
        json_request(Method::GET, "/api/v1/workflow-jobs?status=pending", Some(org), None),
    )
    .await;
    let jobs = body_json(response).await;
    assert_eq!(jobs["meta"]["total"], 1);
    assert_eq!(jobs["data"][0]["entity_id"], session.to_string());

    let response = send(
        &app,
        json_request(Method::POST, "/api/v1/workflow-jobs/dispatch", Some(org), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["claimed"], 1);
    assert_eq!(report["completed"], 1);

    let sent = t.chat.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "João Silva, sua sessão está confirmada");

    let response = send(
        &app,
        json_request(
            Method::GET,
            &format!("/api/v1/workflow-logs?entity_id={session}&event=job_completed"),
            Some(org),
            None,
        ),
    )
    .await;
    let logs = body_json(response).await;
    assert_eq!(logs["meta"]["total"], 1);

    // Tenants only see their own jobs
    let response = send(
        &app,
        json_request(Method::GET, "/api/v1/workflow-jobs", Some(Uuid::new_v4()), None),
    )
    .await;
    assert_eq!(body_json(response).await["meta"]["total"], 0);
}

#[tokio::test]
async fn test_state_change_without_default_workflow_is_accepted() {
    let t = TestEngine::new();
    let app = test_app(&t);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/workflow-events/state-change",
            Some(Uuid::new_v4()),
            Some(json!({
                "entity_type": "budget",
                "entity_id": Uuid::new_v4(),
                "to_status": "sent"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert!(outcome["workflow_id"].is_null());
    assert!(t.store.jobs().is_empty());
}

#[tokio::test]
async fn test_cancel_job() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;
    let trigger =
        add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::TimeAfter, 60, "Olá").await;
    let job = t
        .engine
        .queue
        .schedule_job(org, trigger.id, gestor_shared::EntityType::Session, Uuid::new_v4(), chrono::Utc::now())
        .await
        .unwrap();

    let uri = format!("/api/v1/workflow-jobs/{}/cancel", job.id);
    let response = send(&app, json_request(Method::POST, &uri, Some(Uuid::new_v4()), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, json_request(Method::POST, &uri, Some(org), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");

    let response = send(&app, json_request(Method::POST, &uri, Some(org), None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_dispatch_rejects_completed_status() {
    let t = TestEngine::new();
    let app = test_app(&t);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/workflow-jobs/dispatch",
            Some(Uuid::new_v4()),
            Some(json!({ "status": "completed" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_dispatch_only_claims_callers_jobs() {
    let t = TestEngine::new();
    let app = test_app(&t);

    let mut jobs = Vec::new();
    for org in [Uuid::new_v4(), Uuid::new_v4()] {
        let wf = session_workflow(&t, org).await;
        let trigger =
            add_chat_trigger(&t, org, wf.workflow.id, wf.state("scheduled"), TriggerType::OnEnter, 0, "Olá").await;
        let session = Uuid::new_v4();
        t.entities.insert(session, session_data());
        let job = t
            .engine
            .queue
            .schedule_job(org, trigger.id, gestor_shared::EntityType::Session, session, chrono::Utc::now())
            .await
            .unwrap();
        jobs.push((org, job));
    }
    let (org_a, job_a) = &jobs[0];
    let (_, job_b) = &jobs[1];

    let response = send(
        &app,
        json_request(Method::POST, "/api/v1/workflow-jobs/dispatch", Some(*org_a), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["claimed"], 1);
    assert_eq!(report["completed"], 1);

    assert_eq!(t.store.job(job_a.id).unwrap().status, gestor_shared::JobStatus::Completed);
    let untouched = t.store.job(job_b.id).unwrap();
    assert_eq!(untouched.status, gestor_shared::JobStatus::Pending);
    assert_eq!(untouched.attempts, 0);
    assert_eq!(t.chat.sent().len(), 1);
}
