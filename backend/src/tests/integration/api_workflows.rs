use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use crate::tests::fixtures::*;
use crate::tests::helpers::*;

#[tokio::test]
async fn test_missing_organization_header_is_rejected() {
    let t = TestEngine::new();
    let app = test_app(&t);

    let response = send(&app, json_request(Method::GET, "/api/v1/workflows", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "MISSING_ORGANIZATION");
}

#[tokio::test]
async fn test_health_and_root() {
    let t = TestEngine::new();
    let app = test_app(&t);

    let response = send(&app, json_request(Method::GET, "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = send(&app, json_request(Method::GET, "/", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_workflow_lifecycle() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/workflows",
            Some(org),
            Some(json!({
                "name": "Orçamentos",
                "module": "construction",
                "entity_type": "budget"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let workflow = body_json(response).await;
    assert_eq!(workflow["is_active"], true);
    assert_eq!(workflow["is_default"], false);
    let id = workflow["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/workflows/{id}/states"),
            Some(org),
            Some(json!({ "name": "sent", "state_type": "initial" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        json_request(Method::POST, &format!("/api/v1/workflows/{id}/default"), Some(org), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["is_default"], true);

    let response = send(
        &app,
        json_request(Method::GET, &format!("/api/v1/workflows/{id}"), Some(org), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["states"].as_array().unwrap().len(), 1);

    let response = send(
        &app,
        json_request(Method::GET, "/api/v1/workflows?entity_type=budget", Some(org), None),
    )
    .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = send(
        &app,
        json_request(Method::DELETE, &format!("/api/v1/workflows/{id}"), Some(org), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(t.store.workflows().is_empty());
}

#[tokio::test]
async fn test_invalid_workflow_returns_field_errors() {
    let t = TestEngine::new();
    let app = test_app(&t);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/workflows",
            Some(Uuid::new_v4()),
            Some(json!({
                "name": "",
                "module": "clinical",
                "entity_type": "project"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"]["name"].is_array());
    assert!(body["details"]["entity_type"].is_array());
}

#[tokio::test]
async fn test_other_organization_sees_not_found() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;

    let response = send(
        &app,
        json_request(
            Method::GET,
            &format!("/api/v1/workflows/{}", wf.workflow.id),
            Some(Uuid::new_v4()),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Workflow not found");
}

#[tokio::test]
async fn test_duplicate_and_bootstrap() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/workflows/{}/duplicate", wf.workflow.id),
            Some(org),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let copy = body_json(response).await;
    assert_eq!(copy["workflow"]["name"], "Atendimento (copy)");
    assert_eq!(copy["states"].as_array().unwrap().len(), 3);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/workflows/bootstrap",
            Some(org),
            Some(json!({ "module": "construction" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_trigger_dry_run_endpoint() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();
    let wf = session_workflow(&t, org).await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/workflows/{}/triggers", wf.workflow.id),
            Some(org),
            Some(json!({
                "name": "Boas-vindas",
                "state_id": wf.state("scheduled"),
                "trigger_type": "on_enter"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let trigger_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/workflows/{}/triggers/{trigger_id}/actions", wf.workflow.id),
            Some(org),
            Some(json!({
                "action_type": "send_message",
                "action_config": { "channel": "chat", "body": "Hi {{patient_name}}" }
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/workflows/{}/triggers/{trigger_id}/test", wf.workflow.id),
            Some(org),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["actions"][0]["result"]["body"], "Hi João Silva");
    assert!(t.store.jobs().is_empty());
}

#[tokio::test]
async fn test_message_template_crud() {
    let t = TestEngine::new();
    let app = test_app(&t);
    let org = Uuid::new_v4();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/message-templates",
            Some(org),
            Some(json!({
                "name": "Lembrete",
                "channel": "email",
                "subject": "Lembrete de sessão",
                "body": "Olá {{patient_name}}, até {{session_time}}"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let template = body_json(response).await;
    assert_eq!(template["variables"], json!(["patient_name", "session_time"]));
    let id = template["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        json_request(Method::GET, "/api/v1/message-templates?channel=chat", Some(org), None),
    )
    .await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    let response = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/message-templates/{id}"),
            Some(org),
            Some(json!({
                "name": "Lembrete",
                "channel": "email",
                "body": "Oi {{patient_name}}",
                "is_active": false
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["variables"], json!(["patient_name"]));

    let response = send(
        &app,
        json_request(Method::DELETE, &format!("/api/v1/message-templates/{id}"), Some(Uuid::new_v4()), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        json_request(Method::DELETE, &format!("/api/v1/message-templates/{id}"), Some(org), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
