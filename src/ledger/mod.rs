// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Hash-Chained Integrity Ledger
//!
//! One entry per observed compute call. Each entry records the digest of its
//! predecessor, so editing, dropping or reordering any entry breaks the chain.
//!
//! # Chain Rule
//! ```text
//! entries[0].prevHash = "0" * 64
//! entries[i].prevHash = digest(canonical(entries[i - 1]))
//! cursor              = digest(canonical(entries[last]))
//! ```
//!
//! # Guarantees
//! - Append-only: no API mutates or removes an appended entry
//! - Verification reports the first broken link, it never repairs
//! - `restore(snapshot())` is bit-for-bit identical

pub mod entry;
pub mod chain;
pub mod snapshot;

pub use entry::LedgerEntry;
pub use chain::{ChainFault, ChainVerification, IntegrityLedger};
pub use snapshot::LedgerSnapshot;
