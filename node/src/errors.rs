// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pulse_kernel::error::KernelError;
use serde_json::json;
use thiserror::Error;

use crate::network::TransientFailure;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Every attempt failed and fallback is disabled.
    #[error("Remote compute exhausted for {agent} after {attempts} attempts: {last_error}")]
    RemoteComputeExhausted {
        agent: String,
        attempts: u32,
        last_error: TransientFailure,
    },
    #[error("No compute endpoint at index {index} ({available} configured)")]
    UnknownEndpoint { index: usize, available: usize },
    #[error("Operation aborted")]
    Aborted,
    #[error("Scheduler closed")]
    SchedulerClosed,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl EngineError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, EngineError::Aborted)
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::UnknownEndpoint { .. } | EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Kernel(KernelError::InvalidSnapshot(_)) => StatusCode::BAD_REQUEST,
            EngineError::RemoteComputeExhausted { .. } => StatusCode::BAD_GATEWAY,
            EngineError::Aborted | EngineError::SchedulerClosed => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Persistence(_) | EngineError::Kernel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
