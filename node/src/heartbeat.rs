// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Periodic liveness events.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{EngineEvent, EventBus};

#[derive(Debug)]
pub struct Heartbeat {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Emit a `heartbeat` event every `interval`, first one after one interval.
    pub fn start(events: Arc<EventBus>, interval: Duration) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        events.emit(&EngineEvent::Heartbeat {
                            ts: chrono::Utc::now().timestamp_millis(),
                        });
                    }
                }
            }
            tracing::debug!("Heartbeat stopped");
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        self.stop.cancel();
        self.handle.abort();
    }
}
