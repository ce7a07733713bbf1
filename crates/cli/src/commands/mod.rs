// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod inspect;
pub mod verify;

use std::path::Path;

use anyhow::Context;
use pulse_kernel::{Digester, IntegrityLedger, LedgerSnapshot};

/// Load a persisted snapshot into a ledger using `algorithm` for digests.
pub fn load_ledger(snapshot_path: &Path, algorithm: &str) -> anyhow::Result<IntegrityLedger> {
    let digester = Digester::from_name(algorithm)?;
    let bytes = std::fs::read(snapshot_path)
        .with_context(|| format!("reading snapshot {}", snapshot_path.display()))?;
    let snapshot = LedgerSnapshot::from_slice(&bytes)
        .with_context(|| format!("parsing snapshot {}", snapshot_path.display()))?;

    let mut ledger = IntegrityLedger::new(digester);
    ledger.restore(snapshot)?;
    Ok(ledger)
}
