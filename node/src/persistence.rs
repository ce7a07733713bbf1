// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! JSON snapshot files.
//!
//! Writes go to `<path>.tmp`, are synced, and then renamed over `<path>`.
//! The previous file is kept as `<path>.prev`.

use std::ffi::OsString;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use pulse_kernel::error::KernelError;
use pulse_kernel::ledger::LedgerSnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::EngineError;

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn prev_path(path: &Path) -> PathBuf {
    sibling(path, ".prev")
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64, EngineError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| KernelError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = sibling(path, ".tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    // Keep one previous version
    if path.exists() {
        if let Err(e) = std::fs::copy(path, prev_path(path)) {
            warn!(path = ?path, error = %e, "Could not rotate previous snapshot");
        }
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(bytes.len() as u64)
}

/// Read a JSON file. `Ok(None)` if it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, EngineError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| KernelError::InvalidSnapshot(format!("{}: {}", path.display(), e)).into())
}

pub fn save_ledger(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), EngineError> {
    let size = write_json_atomic(path, snapshot)?;
    metrics::gauge!("pulse_ledger_snapshot_bytes", size as f64);
    info!(path = ?path, entries = snapshot.len(), bytes = size, "Ledger snapshot saved");
    Ok(())
}

/// Load a ledger snapshot, falling back to `<path>.prev` when the main file
/// is unreadable.
pub fn load_ledger(path: &Path) -> Result<Option<LedgerSnapshot>, EngineError> {
    match read_json::<LedgerSnapshot>(path) {
        Ok(found) => Ok(found),
        Err(e) => {
            warn!(path = ?path, error = %e, "Ledger snapshot unreadable, trying previous copy");
            match read_json::<LedgerSnapshot>(&prev_path(path))? {
                Some(prev) => Ok(Some(prev)),
                None => Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_kernel::ledger::IntegrityLedger;
    use pulse_kernel::Digester;
    use tempfile::tempdir;

    fn ledger_with(n: usize) -> IntegrityLedger {
        let mut ledger = IntegrityLedger::new(Digester::default());
        for i in 0..n {
            ledger.append("endpoint-0", &format!("in {}", i), &format!("out {}", i));
        }
        ledger
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_ledger(&dir.path().join("ledger.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_load_and_rotation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.json");

        save_ledger(&path, &ledger_with(1).snapshot()).unwrap();
        assert!(!prev_path(&path).exists());

        let second = ledger_with(2).snapshot();
        save_ledger(&path, &second).unwrap();
        assert!(prev_path(&path).exists());
        assert!(!sibling(&path, ".tmp").exists());

        let loaded = load_ledger(&path).unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_corrupt_main_falls_back_to_prev() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let first = ledger_with(1).snapshot();
        save_ledger(&path, &first).unwrap();
        save_ledger(&path, &ledger_with(3).snapshot()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        assert_eq!(load_ledger(&path).unwrap().unwrap(), first);
    }

    #[test]
    fn test_corrupt_without_prev_is_invalid_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"[]").unwrap();

        assert!(matches!(
            load_ledger(&path),
            Err(EngineError::Kernel(KernelError::InvalidSnapshot(_)))
        ));
    }
}
