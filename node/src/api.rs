// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use pulse_kernel::ledger::{ChainFault, ChainVerification};
use serde::{Deserialize, Serialize};

use crate::engine::TaskState;

#[derive(Deserialize)]
pub struct ComputeRequest {
    pub prompt: String,
    #[serde(default)]
    pub endpoint_index: usize,
}

#[derive(Serialize)]
pub struct TaskStatusResponse {
    pub id: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Flat view of a chain verification for HTTP clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    pub entries: usize,
    /// Index of the first bad entry; `entries` when only the cursor is wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ChainFault>,
}

impl VerifyResponse {
    pub fn new(verdict: &ChainVerification, entries: usize) -> Self {
        Self {
            valid: verdict.is_valid(),
            entries,
            fault_index: verdict.fault_index(entries),
            fault: verdict.fault().cloned(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger_entries: usize,
    pub running: usize,
    pub queued: usize,
    pub endpoints: Vec<EndpointHealth>,
}

#[derive(Serialize)]
pub struct EndpointHealth {
    pub index: usize,
    pub agent: String,
    pub reachable: bool,
}
