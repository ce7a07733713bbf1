// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::Serialize;

use crate::config::GENESIS_HASH;
use crate::digest::{is_digest_hex, Digester};
use crate::error::{KernelError, KernelResult};
use crate::ledger::entry::{now_timestamp, LedgerEntry};
use crate::ledger::snapshot::LedgerSnapshot;

/// Where a chain stopped agreeing with itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainFault {
    /// `entries[index].prevHash` is not the digest of its predecessor.
    Link {
        index: usize,
        expected: String,
        found: String,
    },
    /// Every link holds but the cursor is not the digest of the last entry.
    Cursor { expected: String, found: String },
}

/// Outcome of [`IntegrityLedger::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerification {
    Valid { entries: usize },
    Broken { fault: ChainFault },
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChainVerification::Valid { .. })
    }

    pub fn fault(&self) -> Option<&ChainFault> {
        match self {
            ChainVerification::Valid { .. } => None,
            ChainVerification::Broken { fault } => Some(fault),
        }
    }

    /// Index of the offending entry; the cursor counts as index `len`.
    pub fn fault_index(&self, len: usize) -> Option<usize> {
        match self.fault()? {
            ChainFault::Link { index, .. } => Some(*index),
            ChainFault::Cursor { .. } => Some(len),
        }
    }
}

/// Append-only hash-chained ledger.
///
/// The owner is responsible for serializing calls to [`append`](Self::append);
/// the ledger itself is a plain `&mut self` structure.
#[derive(Debug, Clone)]
pub struct IntegrityLedger {
    digester: Digester,
    entries: Vec<LedgerEntry>,
    cursor: String,
}

impl Default for IntegrityLedger {
    fn default() -> Self {
        Self::new(Digester::default())
    }
}

impl IntegrityLedger {
    pub fn new(digester: Digester) -> Self {
        Self {
            digester,
            entries: Vec::new(),
            cursor: GENESIS_HASH.to_string(),
        }
    }

    pub fn digester(&self) -> Digester {
        self.digester
    }

    /// Append a call record stamped with the current time.
    ///
    /// Returns the stored entry and its digest (the new cursor).
    pub fn append(&mut self, agent: &str, input: &str, output: &str) -> (LedgerEntry, String) {
        self.append_at(now_timestamp(), agent, input, output)
    }

    /// Append with an explicit timestamp.
    pub fn append_at(
        &mut self,
        timestamp: impl Into<String>,
        agent: &str,
        input: &str,
        output: &str,
    ) -> (LedgerEntry, String) {
        let entry = LedgerEntry {
            timestamp: timestamp.into(),
            agent: agent.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            prev_hash: self.cursor.clone(),
        };
        let hash = self.entry_hash(&entry);

        self.entries.push(entry.clone());
        self.cursor = hash.clone();

        tracing::trace!(index = self.entries.len() - 1, agent, "ledger entry appended");
        (entry, hash)
    }

    /// Digest of an entry's canonical encoding.
    pub fn entry_hash(&self, entry: &LedgerEntry) -> String {
        self.digester.digest_hex(entry.canonical().as_bytes())
    }

    /// Replay the chain from genesis and report the first disagreement.
    pub fn verify_chain(&self) -> ChainVerification {
        let mut expected = GENESIS_HASH.to_string();

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != expected {
                tracing::warn!(
                    index,
                    expected = %expected,
                    found = %entry.prev_hash,
                    "Integrity mismatch at index"
                );
                return ChainVerification::Broken {
                    fault: ChainFault::Link {
                        index,
                        expected,
                        found: entry.prev_hash.clone(),
                    },
                };
            }
            expected = self.entry_hash(entry);
        }

        if self.cursor != expected {
            tracing::warn!(expected = %expected, found = %self.cursor, "Integrity mismatch at cursor");
            return ChainVerification::Broken {
                fault: ChainFault::Cursor {
                    expected,
                    found: self.cursor.clone(),
                },
            };
        }

        ChainVerification::Valid {
            entries: self.entries.len(),
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            prev_hash_hex: self.cursor.clone(),
            entries: self.entries.clone(),
        }
    }

    /// Replace the whole chain state.
    ///
    /// Entries are taken verbatim, a tampered snapshot restores as tampered.
    /// Only a malformed cursor is rejected.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) -> KernelResult<()> {
        if !is_digest_hex(&snapshot.prev_hash_hex) {
            return Err(KernelError::InvalidSnapshot(format!(
                "cursor is not a 64-char hex digest: {:?}",
                snapshot.prev_hash_hex
            )));
        }
        self.entries = snapshot.entries;
        self.cursor = snapshot.prev_hash_hex;
        tracing::info!(entries = self.entries.len(), "Integrity log restored");
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Digest of the last entry, or genesis.
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
