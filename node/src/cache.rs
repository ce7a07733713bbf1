// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Completed-task cache keyed by task id.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::EngineError;
use crate::persistence;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub output: String,
    pub tokens: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub cached_at: i64,
}

#[derive(Debug, Default)]
pub struct TaskCache {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    path: Option<PathBuf>,
}

impl TaskCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache backed by a JSON file, loaded now if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let entries: BTreeMap<String, CacheEntry> = persistence::read_json(&path)?.unwrap_or_default();
        info!(path = ?path, entries = entries.len(), "Task cache loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn insert(&self, id: &str, output: &str, tokens: Vec<String>) {
        let entry = CacheEntry {
            output: output.to_string(),
            tokens,
            cached_at: chrono::Utc::now().timestamp_millis(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), entry);
        debug!(id, "Task output cached");
    }

    pub fn get(&self, id: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache to its file. No-op for an in-memory cache.
    pub fn persist(&self) -> Result<(), EngineError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = self.entries.read().unwrap_or_else(PoisonError::into_inner).clone();
        persistence::write_json_atomic(path, &snapshot)?;
        debug!(path = ?path, entries = snapshot.len(), "Task cache persisted");
        Ok(())
    }
}
