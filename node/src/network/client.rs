// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Remote Compute Client
//!
//! One client per endpoint. A call is attempted up to `max_retries` times
//! with linear backoff (`base_delay * attempt`) between attempts. When every
//! attempt fails the client either synthesizes a local placeholder
//! (fallback enabled) or reports `RemoteComputeExhausted`.
//!
//! # Cancellation
//! - The token aborts the in-flight request at once; that attempt counts as
//!   failed
//! - A cancelled attempt returns at once without arming the backoff
//! - Backoff sleeps run to completion; the token is checked before the next
//!   attempt starts
//! - A cancelled call returns `Aborted` and never falls back

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{EndpointConfig, RequestFormat};
use crate::errors::EngineError;
use crate::network::transport::{Transport, TransientFailure};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Health check limit when no request timeout is configured.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one compute call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeResult {
    pub text: String,
    /// Text is a local placeholder, not remote output.
    pub fallback: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub request_timeout: Option<Duration>,
    pub fallback_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            request_timeout: None,
            fallback_enabled: true,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Endpoint URL with trailing `/` removed and `/api/generate` appended when
/// no API path is given.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return DEFAULT_ENDPOINT.to_string();
    }
    let url = url.strip_suffix('/').unwrap_or(url);
    if !url.contains("/api/") {
        return format!("{}/api/generate", url);
    }
    url.to_string()
}

/// Deterministic placeholder used when an endpoint stays unreachable.
pub fn local_fallback(description: &str, prev_content: &str, rules: &[&str]) -> String {
    format!(
        "// Local fallback for {}\n// Rules: {}\n{}",
        description,
        rules.join(", "),
        prev_content
    )
}

/// Reply text from `output`, `text` or `response`, then chat-style
/// `message.content`.
pub fn extract_text(body: &Value) -> String {
    ["output", "text", "response"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| body.pointer("/message/content").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

pub struct RemoteComputeClient {
    index: usize,
    agent: String,
    api_url: String,
    model: String,
    format: RequestFormat,
    policy: RetryPolicy,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RemoteComputeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteComputeClient")
            .field("index", &self.index)
            .field("agent", &self.agent)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish()
    }
}

impl RemoteComputeClient {
    pub fn new(
        index: usize,
        endpoint: &EndpointConfig,
        policy: RetryPolicy,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let policy = RetryPolicy {
            max_retries: policy.max_retries.max(1),
            ..policy
        };
        Self {
            index,
            agent: endpoint.agent_for(index),
            api_url: normalize_url(&endpoint.url),
            model: endpoint.model.clone(),
            format: endpoint.format,
            policy,
            transport,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn request_body(&self, prompt: &str) -> Value {
        match self.format {
            RequestFormat::Prompt => json!({ "prompt": prompt }),
            RequestFormat::Generate => json!({ "model": self.model, "prompt": prompt, "stream": false }),
        }
    }

    /// Run `prompt` against the endpoint with retry, backoff and fallback.
    pub async fn compute(&self, prompt: &str, cancel: &CancellationToken) -> Result<ComputeResult, EngineError> {
        let body = self.request_body(prompt);
        let max = self.policy.max_retries;
        let mut last_error = None;

        for attempt in 1..=max {
            if cancel.is_cancelled() {
                return Err(EngineError::Aborted);
            }

            debug!(
                agent = %self.agent,
                attempt,
                api_url = %self.api_url,
                preview = %preview(prompt, 80),
                "Sending compute request"
            );

            match self.attempt(&body, cancel).await {
                Ok(reply) => {
                    return Ok(ComputeResult {
                        text: extract_text(&reply),
                        fallback: false,
                        attempts: attempt,
                    });
                }
                Err(failure) => {
                    warn!(agent = %self.agent, attempt, error = %failure, "Compute request failed");
                    metrics::counter!("pulse_compute_attempt_failures_total", 1, "agent" => self.agent.clone());
                    last_error = Some(failure);
                }
            }

            if cancel.is_cancelled() {
                return Err(EngineError::Aborted);
            }
            if attempt < max {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Aborted);
        }

        if self.policy.fallback_enabled {
            info!(agent = %self.agent, "Falling back to local processing");
            metrics::counter!("pulse_compute_fallbacks_total", 1, "agent" => self.agent.clone());
            return Ok(ComputeResult {
                text: local_fallback(prompt, "", &[]),
                fallback: true,
                attempts: max,
            });
        }

        Err(EngineError::RemoteComputeExhausted {
            agent: self.agent.clone(),
            attempts: max,
            last_error: last_error.unwrap_or(TransientFailure::Cancelled),
        })
    }

    async fn attempt(&self, body: &Value, cancel: &CancellationToken) -> Result<Value, TransientFailure> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransientFailure::Cancelled),
            reply = with_timeout(self.policy.request_timeout, self.transport.post_json(&self.api_url, body)) => reply,
        }
    }

    /// Probe the endpoint's `/api/tags` sibling. Bounded by the request
    /// timeout, or `DEFAULT_HEALTH_TIMEOUT` when none is set.
    pub async fn health_check(&self) -> bool {
        let base = self
            .api_url
            .find("/api/")
            .map(|i| &self.api_url[..i])
            .unwrap_or(&self.api_url);
        let url = format!("{}/api/tags", base);
        let limit = self.policy.request_timeout.or(Some(DEFAULT_HEALTH_TIMEOUT));
        match with_timeout(limit, self.transport.probe(&url)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(agent = %self.agent, error = %e, "Endpoint health check failed");
                false
            }
        }
    }
}

async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, TransientFailure>
where
    F: Future<Output = Result<T, TransientFailure>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(TransientFailure::Timeout)),
        None => fut.await,
    }
}

fn preview(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
