// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{test_config, MockTransport};
use pulse_kernel::ledger::LedgerSnapshot;
use pulse_node::engine::PulseEngine;
use pulse_node::server::build_router;
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

fn app_with_token(token: Option<&str>) -> (Router, Arc<PulseEngine>) {
    let engine = Arc::new(PulseEngine::with_transport(test_config(), MockTransport::echo()).unwrap());
    (build_router(engine.clone(), token.map(str::to_string)), engine)
}

fn app() -> (Router, Arc<PulseEngine>) {
    app_with_token(None)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_compute_endpoint() {
    let (app, engine) = app();

    let response = app
        .oneshot(post_json("/v1/compute", json!({ "prompt": "hi", "endpoint_index": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["text"], "reply to hi");
    assert_eq!(body["fallback"], false);
    assert_eq!(body["attempts"], 1);
    assert_eq!(engine.ledger_len().await, 1);
}

#[tokio::test]
async fn test_unknown_endpoint_is_bad_request() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json("/v1/compute", json!({ "prompt": "hi", "endpoint_index": 9 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("index 9"));
}

#[tokio::test]
async fn test_task_roundtrip() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(post_json("/v1/tasks", json!({ "id": "t1", "prompt": "two words" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let out = json_body(response).await;
    assert_eq!(out["output"], "reply to two words");
    assert_eq!(out["tokens"], json!(["two", "words"]));
    assert_eq!(out["embedding"].as_array().unwrap().len(), 128);

    let status = json_body(app.clone().oneshot(get("/v1/tasks/t1")).await.unwrap()).await;
    assert_eq!(status, json!({ "id": "t1", "state": "completed", "output": "reply to two words" }));

    let unknown = json_body(app.oneshot(get("/v1/tasks/nope")).await.unwrap()).await;
    assert_eq!(unknown, json!({ "id": "nope", "state": "idle" }));
}

#[tokio::test]
async fn test_ledger_verify_and_restore() {
    let (app, engine) = app();
    engine.compute("a", 0).await.unwrap();
    engine.compute("b", 1).await.unwrap();

    let verify = json_body(app.clone().oneshot(get("/v1/ledger/verify")).await.unwrap()).await;
    assert_eq!(verify, json!({ "valid": true, "entries": 2 }));

    let response = app.clone().oneshot(get("/v1/ledger")).await.unwrap();
    let snapshot: LedgerSnapshot = serde_json::from_value(json_body(response).await).unwrap();
    assert_eq!(snapshot.entries.len(), 2);

    // Tamper with the last entry: only the cursor check catches it
    let mut tampered = snapshot.clone();
    tampered.entries[1].output = "forged".into();
    let response = app
        .clone()
        .oneshot(post_json("/v1/ledger/restore", serde_json::to_value(&tampered).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["valid"], false);
    assert_eq!(report["faultIndex"], 2);
    assert_eq!(report["fault"]["kind"], "cursor");

    let mut malformed = snapshot;
    malformed.prev_hash_hex = "xyz".into();
    let response = app
        .oneshot(post_json("/v1/ledger/restore", serde_json::to_value(&malformed).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_abort_and_endpoints() {
    let (app, _) = app();

    let response = app.clone().oneshot(post_json("/v1/abort", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let endpoints = json_body(app.oneshot(get("/v1/endpoints")).await.unwrap()).await;
    assert_eq!(endpoints.as_array().unwrap().len(), 2);
    assert_eq!(endpoints[1]["agent"], "endpoint-1");
    assert_eq!(endpoints[1]["apiUrl"], "http://agent.test/api/generate");
}

#[tokio::test]
async fn test_refine_without_files_is_bad_request() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json("/v1/refine", json!({ "task": "tidy", "files": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["endpoints"].as_array().unwrap().len(), 2);
    assert_eq!(body["endpoints"][0]["reachable"], true);
}

#[tokio::test]
async fn test_bearer_auth() {
    let (app, _) = app_with_token(Some("s3cret"));

    let response = app.clone().oneshot(get("/v1/endpoints")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/v1/endpoints")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(wrong).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let authed = Request::builder()
        .uri("/v1/endpoints")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(authed).await.unwrap().status(), StatusCode::OK);

    // Metrics bypass auth
    assert_eq!(app.oneshot(get("/metrics")).await.unwrap().status(), StatusCode::OK);
}
