// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

use crate::config::GENESIS_HASH;
use crate::error::{KernelError, KernelResult};
use crate::ledger::entry::LedgerEntry;

/// Full chain state: the cursor plus every entry in append order.
///
/// JSON form: `{"prevHashHex": "...", "entries": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub prev_hash_hex: String,
    pub entries: Vec<LedgerEntry>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            prev_hash_hex: GENESIS_HASH.to_string(),
            entries: Vec::new(),
        }
    }
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> KernelResult<String> {
        serde_json::to_string(self).map_err(|e| KernelError::Serialization(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> KernelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| KernelError::Serialization(e.to_string()))
    }

    pub fn from_json(s: &str) -> KernelResult<Self> {
        serde_json::from_str(s).map_err(|e| KernelError::InvalidSnapshot(e.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> KernelResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| KernelError::InvalidSnapshot(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
