// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! pulse-node: async orchestration around the `pulse-kernel` ledger.
//!
//! `PulseEngine` fans prompts out to remote compute endpoints through a
//! bounded scheduler, records every result in the hash-chained ledger and
//! reports progress on the event bus. `server` exposes it over HTTP.

pub mod config;
pub mod errors;
pub mod api;
pub mod cache;
pub mod engine;
pub mod events;
pub mod heartbeat;
pub mod network;
pub mod persistence;
pub mod plugins;
pub mod refine;
pub mod scheduler;
pub mod server;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::{PulseEngine, TaskOutput, TaskRequest, TaskState};
pub use errors::EngineError;
pub use events::{EngineEvent, EventBus, EventKind};
