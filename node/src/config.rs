// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pulse_kernel::digest::Digester;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::network::RetryPolicy;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "PULSE_CONFIG";

pub const DEFAULT_MODEL: &str = "llama3";

/// Request body shape sent to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFormat {
    /// `{ "prompt": ... }`
    Prompt,
    /// `{ "model": ..., "prompt": ..., "stream": false }`
    #[default]
    Generate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Ledger identity; defaults to `endpoint-{index}`.
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub format: RequestFormat,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: default_model(),
            agent: None,
            format: RequestFormat::default(),
        }
    }

    pub fn agent_for(&self, index: usize) -> String {
        self.agent.clone().unwrap_or_else(|| format!("endpoint-{}", index))
    }
}

/// Endpoint roles for the refinement pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub manager: usize,
    pub expander: usize,
    /// Used only in dual mode.
    pub optimizer: usize,
    pub chunk_kb: usize,
    pub cycle_pause_ms: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            manager: 0,
            expander: 1,
            optimizer: 1,
            chunk_kb: 8,
            cycle_pause_ms: 250,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub concurrency: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub request_timeout_ms: Option<u64>,
    pub fallback_enabled: bool,
    pub integrity_logs_enabled: bool,
    pub digest: String,
    pub heartbeat_enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub ledger_path: Option<PathBuf>,
    pub cache_path: Option<PathBuf>,
    pub auto_persist_interval_secs: Option<u64>,
    pub bind_addr: SocketAddr,
    pub auth_token: Option<String>,
    pub refine: RefineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                EndpointConfig::new("http://localhost:11434/api/generate"),
                EndpointConfig::new("http://localhost:11435/api/generate"),
            ],
            concurrency: 2,
            max_retries: 3,
            base_delay_ms: 500,
            request_timeout_ms: None,
            fallback_enabled: true,
            integrity_logs_enabled: true,
            digest: "sha256".to_string(),
            heartbeat_enabled: true,
            heartbeat_interval_ms: 5000,
            ledger_path: None,
            cache_path: None,
            auto_persist_interval_secs: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            auth_token: None,
            refine: RefineConfig::default(),
        }
    }
}

/// `auth_token` is never printed.
impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("endpoints", &self.endpoints)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("fallback_enabled", &self.fallback_enabled)
            .field("integrity_logs_enabled", &self.integrity_logs_enabled)
            .field("digest", &self.digest)
            .field("heartbeat_enabled", &self.heartbeat_enabled)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("ledger_path", &self.ledger_path)
            .field("cache_path", &self.cache_path)
            .field("auto_persist_interval_secs", &self.auto_persist_interval_secs)
            .field("bind_addr", &self.bind_addr)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("refine", &self.refine)
            .finish()
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: Self = serde_json::from_str(&raw)
            .map_err(|e| EngineError::InvalidInput(format!("config {:?}: {}", path.as_ref(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Config from `PULSE_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> Result<Self, EngineError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.endpoints.is_empty() {
            return Err(EngineError::InvalidInput("at least one endpoint is required".into()));
        }
        if self.concurrency == 0 {
            return Err(EngineError::InvalidInput("concurrency must be >= 1".into()));
        }
        if self.max_retries == 0 {
            return Err(EngineError::InvalidInput("max_retries must be >= 1".into()));
        }
        if self.refine.chunk_kb == 0 {
            return Err(EngineError::InvalidInput("refine.chunk_kb must be >= 1".into()));
        }
        // tokio::time::interval panics on a zero period
        if self.heartbeat_interval_ms == 0 {
            return Err(EngineError::InvalidInput("heartbeat_interval_ms must be >= 1".into()));
        }
        if self.auto_persist_interval_secs == Some(0) {
            return Err(EngineError::InvalidInput("auto_persist_interval_secs must be >= 1".into()));
        }
        self.digester()?;
        Ok(())
    }

    /// Resolve the digest primitive. Failure is fatal for engine startup.
    pub fn digester(&self) -> Result<Digester, EngineError> {
        Ok(Digester::from_name(&self.digest)?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            fallback_enabled: self.fallback_enabled,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_kernel::error::KernelError;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.endpoints.len(), 2);
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.max_retries, 3);
        assert!(cfg.fallback_enabled);
        assert_eq!(cfg.endpoints[1].agent_for(1), "endpoint-1");
        cfg.validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"endpoints":[{"url":"http://x/api/chat","agent":"manager","format":"prompt"}],"concurrency":4}"#,
        )
        .unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.endpoints[0].model, DEFAULT_MODEL);
        assert_eq!(cfg.endpoints[0].format, RequestFormat::Prompt);
        assert_eq!(cfg.endpoints[0].agent_for(0), "manager");
    }

    #[test]
    fn test_unknown_digest_is_fatal() {
        let cfg = EngineConfig {
            digest: "md5".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::Kernel(KernelError::CryptoUnavailable(_)))
        ));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let cfg = EngineConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig {
            endpoints: Vec::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_heartbeat_interval_rejected() {
        let cfg = EngineConfig {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidInput(_))));

        // Rejected even with the heartbeat switched off
        let cfg = EngineConfig {
            heartbeat_enabled: false,
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_auto_persist_interval_rejected() {
        let cfg = EngineConfig {
            auto_persist_interval_secs: Some(0),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidInput(_))));

        let cfg = EngineConfig {
            auto_persist_interval_secs: Some(30),
            ..Default::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_debug_redacts_auth_token() {
        let cfg = EngineConfig {
            auth_token: Some("s3cret-token".into()),
            ..Default::default()
        };
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("s3cret-token"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("heartbeat_interval_ms"));

        assert!(format!("{:?}", EngineConfig::default()).contains("auth_token: None"));
    }
}
