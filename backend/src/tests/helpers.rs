// HTTP helpers for exercising the router in-process

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use super::fixtures::TestEngine;
use crate::handlers::ORGANIZATION_HEADER;
use crate::AppState;

pub fn test_app(t: &TestEngine) -> Router {
    crate::app(Arc::new(AppState {
        engine: t.engine.clone(),
    }))
}

/// Request scoped to `org`, with a JSON body when one is given
pub fn json_request(method: Method, uri: &str, org: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(org) = org {
        builder = builder.header(ORGANIZATION_HEADER, org.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
