// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::canonical::canonical_string;

/// A recorded compute interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// ISO-8601 UTC, millisecond precision (`2025-01-01T00:00:00.000Z`)
    pub timestamp: String,
    pub agent: String,
    pub input: String,
    pub output: String,
    pub prev_hash: String,
}

impl LedgerEntry {
    /// Canonical encoding that is hashed into the chain. Covers exactly the
    /// five entry fields.
    pub fn canonical(&self) -> String {
        canonical_string(&json!({
            "timestamp": self.timestamp,
            "agent": self.agent,
            "input": self.input,
            "output": self.output,
            "prevHash": self.prev_hash,
        }))
    }
}

/// Current time in the ledger's timestamp format.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_field_order() {
        let entry = LedgerEntry {
            timestamp: "2025-01-01T00:00:00.000Z".into(),
            agent: "a".into(),
            input: "i".into(),
            output: "o".into(),
            prev_hash: "p".into(),
        };
        assert_eq!(
            entry.canonical(),
            r#"{"agent":"a","input":"i","output":"o","prevHash":"p","timestamp":"2025-01-01T00:00:00.000Z"}"#
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
    }
}
