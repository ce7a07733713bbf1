// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use pulse_kernel::{ChainFault, ChainVerification};

use super::load_ledger;

/// Verify a snapshot without printing.
pub fn check(snapshot_path: &Path, algorithm: &str) -> anyhow::Result<ChainVerification> {
    let ledger = load_ledger(snapshot_path, algorithm)?;
    Ok(ledger.verify_chain())
}

pub fn run(snapshot_path: &Path, algorithm: &str) -> anyhow::Result<()> {
    let verdict = check(snapshot_path, algorithm)?;

    match &verdict {
        ChainVerification::Valid { entries } => {
            println!("\n✅ VERIFIED\n");
            println!("Entries:   {}", entries);
            println!("Algorithm: {}\n", algorithm);
            Ok(())
        }
        ChainVerification::Broken { fault } => {
            println!("\n❌ CORRUPTED\n");
            match fault {
                ChainFault::Link { index, expected, found } => {
                    println!("Broken link at entry {}", index);
                    println!("Expected prevHash: {}", expected);
                    println!("Found prevHash:    {}", found);
                }
                ChainFault::Cursor { expected, found } => {
                    println!("Cursor does not match the last entry");
                    println!("Expected cursor: {}", expected);
                    println!("Found cursor:    {}", found);
                }
            }
            anyhow::bail!("integrity chain broken: {:?}", fault)
        }
    }
}
