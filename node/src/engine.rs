// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Pulse Orchestrator
//!
//! Owns the compute clients, the scheduler and the integrity ledger, and
//! turns each finished compute call into exactly one ledger entry.
//!
//! # Ordering
//! Compute calls run concurrently (bounded by the scheduler). Ledger appends
//! happen under one lock after a call finishes, so entries land in
//! completion order, not start order.
//!
//! # Cancellation
//! Every call runs under a child of the engine's root token. `abort()`
//! cancels the root and installs a fresh one; later calls are unaffected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures::future::join_all;
use pulse_kernel::ledger::entry::now_timestamp;
use pulse_kernel::ledger::{ChainVerification, IntegrityLedger, LedgerSnapshot};
use pulse_kernel::text;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TaskCache;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::heartbeat::Heartbeat;
use crate::network::{ComputeResult, HttpTransport, RemoteComputeClient, Transport};
use crate::persistence;
use crate::plugins::{JsonFlowPlugin, PluginManager};
use crate::scheduler::Scheduler;
use crate::telemetry::TelemetryRecorder;

/// Steps reported through `progress` events by `run_task`.
pub const TASK_STEPS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskRequest {
    pub id: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub output: String,
    pub tokens: Vec<String>,
    pub embedding: Vec<f32>,
    /// Output came from the local fallback rather than the endpoint.
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    pub index: usize,
    pub agent: String,
    pub api_url: String,
    pub model: String,
}

pub struct PulseEngine {
    config: EngineConfig,
    clients: Vec<RemoteComputeClient>,
    scheduler: Scheduler,
    ledger: tokio::sync::Mutex<IntegrityLedger>,
    events: Arc<EventBus>,
    cache: TaskCache,
    telemetry: TelemetryRecorder,
    plugins: PluginManager,
    root_token: Mutex<CancellationToken>,
    tasks: RwLock<HashMap<String, TaskState>>,
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl std::fmt::Debug for PulseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseEngine")
            .field("clients", &self.clients)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl PulseEngine {
    /// Engine talking to its endpoints over HTTP.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Result<Self, EngineError> {
        config.validate()?;
        let digester = config.digester()?;
        let policy = config.retry_policy();

        let clients: Vec<RemoteComputeClient> = config
            .endpoints
            .iter()
            .enumerate()
            .map(|(i, ep)| RemoteComputeClient::new(i, ep, policy, transport.clone()))
            .collect();

        let cache = match &config.cache_path {
            Some(path) => TaskCache::open(path)?,
            None => TaskCache::in_memory(),
        };

        let plugins = PluginManager::new();
        plugins.register(Arc::new(JsonFlowPlugin));

        info!(
            endpoints = clients.len(),
            concurrency = config.concurrency,
            digest = %digester.algorithm(),
            "Pulse engine initialized"
        );

        Ok(Self {
            scheduler: Scheduler::new(config.concurrency),
            ledger: tokio::sync::Mutex::new(IntegrityLedger::new(digester)),
            events: Arc::new(EventBus::new()),
            cache,
            telemetry: TelemetryRecorder::new(),
            plugins,
            root_token: Mutex::new(CancellationToken::new()),
            tasks: RwLock::new(HashMap::new()),
            heartbeat: Mutex::new(None),
            clients,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn endpoints(&self) -> Vec<EndpointInfo> {
        self.clients
            .iter()
            .map(|c| EndpointInfo {
                index: c.index(),
                agent: c.agent().to_string(),
                api_url: c.api_url().to_string(),
                model: c.model().to_string(),
            })
            .collect()
    }

    fn child_token(&self) -> CancellationToken {
        self.root_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }

    /// Run `prompt` on endpoint `index` and record the result in the ledger.
    pub async fn compute(&self, prompt: &str, index: usize) -> Result<ComputeResult, EngineError> {
        let client = self.clients.get(index).ok_or(EngineError::UnknownEndpoint {
            index,
            available: self.clients.len(),
        })?;

        let token = self.child_token();
        let started = Instant::now();
        let result = self.scheduler.schedule(client.compute(prompt, &token)).await??;

        metrics::counter!("pulse_compute_calls_total", 1, "agent" => client.agent().to_string());
        metrics::histogram!("pulse_compute_duration_seconds", started.elapsed().as_secs_f64());

        if self.config.integrity_logs_enabled {
            let mut ledger = self.ledger.lock().await;
            let (entry, entry_hash) = ledger.append(client.agent(), prompt, &result.text);
            metrics::gauge!("pulse_ledger_entries", ledger.len() as f64);
            debug!(agent = client.agent(), entry_hash = %entry_hash, "Ledger entry appended");
            // Emitted under the lock so listeners see chain order
            self.events.emit(&EngineEvent::IntegrityLog { entry, entry_hash });
        }

        self.events.emit(&EngineEvent::Dialogue {
            index,
            api_url: client.api_url().to_string(),
            prompt: prompt.to_string(),
            reply: result.text.clone(),
            ts: now_timestamp(),
        });

        Ok(result)
    }

    /// Tokenize, embed and compute one task on endpoint 0.
    pub async fn run_task(&self, request: TaskRequest) -> Result<TaskOutput, EngineError> {
        self.set_state(&request.id, TaskState::Running);

        match self.execute_task(&request).await {
            Ok(output) => {
                self.set_state(&request.id, TaskState::Completed);
                Ok(output)
            }
            Err(e) => {
                let state = if e.is_aborted() {
                    TaskState::Aborted
                } else {
                    TaskState::Failed
                };
                self.set_state(&request.id, state);
                self.telemetry.record("error", &request.id, 0);
                warn!(id = %request.id, error = %e, "Task failed");
                self.events.emit(&EngineEvent::Error {
                    id: request.id.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute_task(&self, request: &TaskRequest) -> Result<TaskOutput, EngineError> {
        self.progress(0);
        let tokens = text::tokenize(&request.prompt);
        self.progress(1);
        let embedding = text::embed(&request.prompt);
        self.progress(2);

        let result = self.compute(&request.prompt, 0).await?;
        self.progress(3);

        let output = self.plugins.after_generation(&request.id, result.text).await;

        self.cache.insert(&request.id, &output, tokens.clone());
        if let Err(e) = self.cache.persist() {
            warn!(id = %request.id, error = %e, "Task cache not persisted");
        }
        self.telemetry.record("taskComplete", &request.id, tokens.len());

        self.progress(TASK_STEPS);
        self.events.emit(&EngineEvent::TaskComplete {
            id: request.id.clone(),
            output: output.clone(),
        });

        Ok(TaskOutput {
            id: request.id.clone(),
            output,
            tokens,
            embedding,
            fallback: result.fallback,
        })
    }

    fn progress(&self, step: u32) {
        self.events.emit(&EngineEvent::Progress {
            step,
            total_steps: TASK_STEPS,
        });
    }

    fn set_state(&self, id: &str, state: TaskState) {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), state);
    }

    /// State of task `id`; `Idle` if never run.
    pub fn task_state(&self, id: &str) -> TaskState {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or(TaskState::Idle)
    }

    pub fn cached_output(&self, id: &str) -> Option<String> {
        self.cache.get(id).map(|e| e.output)
    }

    /// Cancel every outstanding call. The ledger is left untouched.
    pub fn abort(&self) {
        let previous = {
            let mut root = self.root_token.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *root, CancellationToken::new())
        };
        previous.cancel();
        info!("Engine aborted all outstanding calls");
        self.events.emit(&EngineEvent::Aborted);
    }

    pub fn start_heartbeat(&self, interval: Duration) {
        let mut slot = self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.take() {
            old.stop();
        }
        *slot = Some(Heartbeat::start(self.events.clone(), interval));
        debug!(interval_ms = interval.as_millis() as u64, "Heartbeat started");
    }

    pub fn stop_heartbeat(&self) {
        if let Some(hb) = self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner).take() {
            hb.stop();
        }
    }

    pub async fn integrity_snapshot(&self) -> LedgerSnapshot {
        self.ledger.lock().await.snapshot()
    }

    /// Replace the ledger with `snapshot` and report its verification.
    pub async fn restore_integrity(&self, snapshot: LedgerSnapshot) -> Result<ChainVerification, EngineError> {
        let mut ledger = self.ledger.lock().await;
        ledger.restore(snapshot)?;
        metrics::gauge!("pulse_ledger_entries", ledger.len() as f64);
        let verdict = ledger.verify_chain();
        info!(entries = ledger.len(), valid = verdict.is_valid(), "Ledger restored");
        Ok(verdict)
    }

    pub async fn verify_chain(&self) -> ChainVerification {
        self.ledger.lock().await.verify_chain()
    }

    /// Verification and entry count taken under one lock.
    pub async fn verify_chain_with_len(&self) -> (ChainVerification, usize) {
        let ledger = self.ledger.lock().await;
        (ledger.verify_chain(), ledger.len())
    }

    pub async fn ledger_len(&self) -> usize {
        self.ledger.lock().await.len()
    }

    /// Reachability of every endpoint, by index.
    pub async fn check_endpoints(&self) -> Vec<bool> {
        join_all(self.clients.iter().map(|c| c.health_check())).await
    }

    /// Load the ledger file, if configured and present.
    pub async fn load_state(&self) -> Result<Option<ChainVerification>, EngineError> {
        let Some(path) = &self.config.ledger_path else {
            return Ok(None);
        };
        match persistence::load_ledger(path)? {
            Some(snapshot) => Ok(Some(self.restore_integrity(snapshot).await?)),
            None => {
                info!(path = ?path, "No ledger snapshot found, starting fresh");
                Ok(None)
            }
        }
    }

    /// Write the ledger and the task cache to their configured files.
    pub async fn persist_state(&self) -> Result<(), EngineError> {
        if let Some(path) = &self.config.ledger_path {
            let snapshot = self.integrity_snapshot().await;
            persistence::save_ledger(path, &snapshot)?;
        }
        self.cache.persist()
    }

    /// Stop the heartbeat, cancel outstanding calls and refuse new ones.
    pub fn shutdown(&self) {
        self.stop_heartbeat();
        self.abort();
        self.scheduler.close();
        info!("Pulse engine shut down");
    }
}

impl Drop for PulseEngine {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}
