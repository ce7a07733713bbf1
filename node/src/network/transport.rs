// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Why a single attempt failed. Retried by the client, never surfaced on its
/// own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransientFailure {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
}

/// Wire seam between the compute client and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body and decode a JSON reply. Non-2xx is a failure.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransientFailure>;

    /// Reachability probe.
    async fn probe(&self, _url: &str) -> Result<(), TransientFailure> {
        Ok(())
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransientFailure> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransientFailure::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransientFailure::Status(resp.status().as_u16()));
        }

        resp.json().await.map_err(|e| TransientFailure::Decode(e.to_string()))
    }

    async fn probe(&self, url: &str) -> Result<(), TransientFailure> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransientFailure::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransientFailure::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}
