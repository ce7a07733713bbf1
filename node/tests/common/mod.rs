// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pulse_node::config::{EndpointConfig, EngineConfig};
use pulse_node::events::{EngineEvent, EventBus, EventKind};
use pulse_node::network::{Transport, TransientFailure};
use serde_json::{json, Value};

pub enum Reply {
    After(Duration, Result<Value, TransientFailure>),
    Hang,
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::After(Duration::ZERO, Ok(json!({ "response": s })))
    }

    pub fn status(code: u16) -> Self {
        Reply::After(Duration::ZERO, Err(TransientFailure::Status(code)))
    }
}

type Handler = Box<dyn Fn(&str, &str) -> Reply + Send + Sync>;

/// In-process endpoint. The handler sees `(url, prompt)`.
pub struct MockTransport {
    handler: Handler,
    pub calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    pub peak: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&str, &str) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Echoes `reply to <prompt>` immediately.
    pub fn echo() -> Arc<Self> {
        Self::new(|_, prompt| Reply::text(&format!("reply to {}", prompt)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransientFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
        self.prompts.lock().unwrap().push(prompt.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(self.in_flight.clone());
        self.peak.fetch_max(now, Ordering::SeqCst);

        match (self.handler)(url, &prompt) {
            Reply::After(delay, reply) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Two endpoints, no heartbeat, otherwise defaults.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        endpoints: vec![
            EndpointConfig::new("http://manager.test/api/generate"),
            EndpointConfig::new("http://agent.test/api/generate"),
        ],
        heartbeat_enabled: false,
        ..Default::default()
    }
}

/// Records every event emitted on `bus`.
pub fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<EngineEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let s = seen.clone();
        bus.on(kind, move |e| s.lock().unwrap().push(e.clone()));
    }
    seen
}

pub fn kinds(events: &Arc<Mutex<Vec<EngineEvent>>>) -> Vec<EventKind> {
    events.lock().unwrap().iter().map(EngineEvent::kind).collect()
}

/// Endpoint that accepts connections and never answers.
pub struct Stalled;

#[async_trait]
impl Transport for Stalled {
    async fn post_json(&self, _url: &str, _body: &Value) -> Result<Value, TransientFailure> {
        std::future::pending().await
    }

    async fn probe(&self, _url: &str) -> Result<(), TransientFailure> {
        std::future::pending().await
    }
}
