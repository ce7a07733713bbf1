// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Engine Event Bus
//!
//! Named events with any number of listeners per name.
//!
//! # Guarantees
//! - Listeners run in registration order
//! - A panicking listener is logged and skipped, the rest still run
//! - Listeners may subscribe or unsubscribe while an event is being emitted;
//!   the change applies from the next emission

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use pulse_kernel::ledger::LedgerEntry;
use serde::Serialize;

use crate::errors::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    Log {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Dialogue {
        index: usize,
        api_url: String,
        prompt: String,
        reply: String,
        ts: String,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        step: u32,
        total_steps: u32,
    },
    TaskComplete {
        id: String,
        output: String,
    },
    Error {
        id: String,
        message: String,
    },
    Heartbeat {
        /// Milliseconds since the Unix epoch.
        ts: i64,
    },
    #[serde(rename_all = "camelCase")]
    IntegrityLog {
        entry: LedgerEntry,
        entry_hash: String,
    },
    Aborted,
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Log { .. } => EventKind::Log,
            EngineEvent::Dialogue { .. } => EventKind::Dialogue,
            EngineEvent::Progress { .. } => EventKind::Progress,
            EngineEvent::TaskComplete { .. } => EventKind::TaskComplete,
            EngineEvent::Error { .. } => EventKind::Error,
            EngineEvent::Heartbeat { .. } => EventKind::Heartbeat,
            EngineEvent::IntegrityLog { .. } => EventKind::IntegrityLog,
            EngineEvent::Aborted => EventKind::Aborted,
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        EngineEvent::Log {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Log,
    Dialogue,
    Progress,
    TaskComplete,
    Error,
    Heartbeat,
    IntegrityLog,
    Aborted,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Log,
        EventKind::Dialogue,
        EventKind::Progress,
        EventKind::TaskComplete,
        EventKind::Error,
        EventKind::Heartbeat,
        EventKind::IntegrityLog,
        EventKind::Aborted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::Dialogue => "dialogue",
            EventKind::Progress => "progress",
            EventKind::TaskComplete => "taskComplete",
            EventKind::Error => "error",
            EventKind::Heartbeat => "heartbeat",
            EventKind::IntegrityLog => "integrityLog",
            EventKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown event: {}", s)))
    }
}

pub type Listener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (*k, v.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match listeners.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(lid, _)| *lid != id);
                list.len() != before
            }
            None => false,
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn emit(&self, event: &EngineEvent) {
        let kind = event.kind();
        // Snapshot so listeners can (un)subscribe without deadlocking
        let targets: Vec<Listener> = match self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
        {
            Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };

        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| (*listener)(event))).is_err() {
                tracing::error!(event = %kind, "Error in event listener");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_registration_order_and_off() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let a = bus.on(EventKind::Aborted, move |_| s.lock().unwrap().push("a"));
        let s = seen.clone();
        bus.on(EventKind::Aborted, move |_| s.lock().unwrap().push("b"));

        bus.emit(&EngineEvent::Aborted);
        assert!(bus.off(EventKind::Aborted, a));
        assert!(!bus.off(EventKind::Aborted, a));
        bus.emit(&EngineEvent::Aborted);

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "b"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));

        bus.on(EventKind::Log, |_| panic!("listener failure"));
        let h = hits.clone();
        bus.on(EventKind::Log, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&EngineEvent::log("x"));
        bus.emit(&EngineEvent::log("y"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_events_routed_by_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        bus.on(EventKind::Progress, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&EngineEvent::Aborted);
        bus.emit(&EngineEvent::Progress { step: 0, total_steps: 4 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicU64::new(0));

        let (b, s, h) = (bus.clone(), slot.clone(), hits.clone());
        let id = bus.on(EventKind::Aborted, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *s.lock().unwrap() {
                b.off(EventKind::Aborted, id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        bus.emit(&EngineEvent::Aborted);
        bus.emit(&EngineEvent::Aborted);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(EventKind::Aborted), 0);
    }

    #[test]
    fn test_event_names_and_json_shape() {
        for kind in EventKind::ALL {
            assert_eq!(kind.name().parse::<EventKind>().unwrap(), kind);
        }
        let json = serde_json::to_value(EngineEvent::Progress { step: 1, total_steps: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "progress", "step": 1, "totalSteps": 4}));
    }
}
