// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::{OnceLock, PoisonError, RwLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pulse_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Prometheus
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }

    metrics::describe_counter!("pulse_compute_calls_total", "Compute calls completed, per agent");
    metrics::describe_counter!("pulse_compute_fallbacks_total", "Compute calls answered by the local fallback");
    metrics::describe_histogram!("pulse_compute_duration_seconds", "Wall time of a compute call including retries");
    metrics::describe_gauge!("pulse_ledger_entries", "Entries in the integrity ledger");
    metrics::describe_counter!("pulse_tasks_total", "Tasks finished, by status");

    metrics::gauge!("pulse_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub kind: String,
    pub id: String,
    pub tokens: usize,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
}

/// In-process record of finished tasks, mirrored into metrics.
#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    records: RwLock<Vec<TelemetryRecord>>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: &str, id: &str, tokens: usize) {
        metrics::counter!("pulse_tasks_total", 1, "status" => kind.to_string());
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TelemetryRecord {
                kind: kind.to_string(),
                id: id.to_string(),
                tokens,
                ts: chrono::Utc::now().timestamp_millis(),
            });
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
