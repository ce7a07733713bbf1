// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! pulse-kernel: deterministic core of the Pulse compute ledger.
//!
//! Everything in this crate is synchronous and free of I/O: canonical
//! serialization, digests, the hash-chained integrity ledger and the
//! text featurization used by the task pipeline. The async engine lives in
//! `pulse-node`.

pub mod config;
pub mod error;
pub mod canonical;
pub mod digest;
pub mod ledger;
pub mod text;

pub use digest::{DigestAlgorithm, Digester};
pub use error::{KernelError, KernelResult};
pub use ledger::{ChainFault, ChainVerification, IntegrityLedger, LedgerEntry, LedgerSnapshot};
