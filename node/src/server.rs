// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use axum::extract::{Path, Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use pulse_kernel::ledger::LedgerSnapshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::*;
use crate::engine::{EndpointInfo, PulseEngine, TaskOutput, TaskRequest};
use crate::errors::EngineError;
use crate::network::ComputeResult;
use crate::refine::{RefineRequest, RefinedFile};

pub type SharedEngine = Arc<PulseEngine>;

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    match provided {
        Some(p) if p == token.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn build_router(state: SharedEngine, auth_token: Option<String>) -> Router {
    let mut app = Router::new()
        .route("/v1/tasks", post(run_task))
        .route("/v1/tasks/:id", get(task_status))
        .route("/v1/compute", post(compute))
        .route("/v1/refine", post(refine))
        .route("/v1/abort", post(abort))
        .route("/v1/ledger", get(ledger_snapshot))
        .route("/v1/ledger/verify", get(ledger_verify))
        .route("/v1/ledger/restore", post(ledger_restore))
        .route("/v1/endpoints", get(endpoints))
        .route("/health", get(health))
        .with_state(state);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        app = app.layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    // Metrics stay reachable for scrapers without a token
    app.route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn run_task(
    State(engine): State<SharedEngine>,
    Json(req): Json<TaskRequest>,
) -> Result<Json<TaskOutput>, EngineError> {
    Ok(Json(engine.run_task(req).await?))
}

async fn task_status(State(engine): State<SharedEngine>, Path(id): Path<String>) -> Json<TaskStatusResponse> {
    Json(TaskStatusResponse {
        state: engine.task_state(&id),
        output: engine.cached_output(&id),
        id,
    })
}

async fn compute(
    State(engine): State<SharedEngine>,
    Json(req): Json<ComputeRequest>,
) -> Result<Json<ComputeResult>, EngineError> {
    Ok(Json(engine.compute(&req.prompt, req.endpoint_index).await?))
}

async fn refine(
    State(engine): State<SharedEngine>,
    Json(req): Json<RefineRequest>,
) -> Result<Json<Vec<RefinedFile>>, EngineError> {
    Ok(Json(engine.refine(req).await?))
}

async fn abort(State(engine): State<SharedEngine>) -> StatusCode {
    engine.abort();
    StatusCode::NO_CONTENT
}

async fn ledger_snapshot(State(engine): State<SharedEngine>) -> Json<LedgerSnapshot> {
    Json(engine.integrity_snapshot().await)
}

async fn ledger_verify(State(engine): State<SharedEngine>) -> Json<VerifyResponse> {
    let (verdict, entries) = engine.verify_chain_with_len().await;
    Json(VerifyResponse::new(&verdict, entries))
}

async fn ledger_restore(
    State(engine): State<SharedEngine>,
    Json(snapshot): Json<LedgerSnapshot>,
) -> Result<Json<VerifyResponse>, EngineError> {
    let entries = snapshot.len();
    let verdict = engine.restore_integrity(snapshot).await?;
    Ok(Json(VerifyResponse::new(&verdict, entries)))
}

async fn endpoints(State(engine): State<SharedEngine>) -> Json<Vec<EndpointInfo>> {
    Json(engine.endpoints())
}

async fn health(State(engine): State<SharedEngine>) -> Json<HealthResponse> {
    let reachable = engine.check_endpoints().await;
    let endpoints = engine
        .endpoints()
        .into_iter()
        .zip(reachable)
        .map(|(ep, reachable)| EndpointHealth {
            index: ep.index,
            agent: ep.agent,
            reachable,
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        ledger_entries: engine.ledger_len().await,
        running: engine.scheduler().running(),
        queued: engine.scheduler().queued(),
        endpoints,
    })
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
