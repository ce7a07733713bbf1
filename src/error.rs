// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Value could not be represented as JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Requested digest primitive is not available. Fatal at initialization.
    #[error("Digest algorithm unavailable: {0}")]
    CryptoUnavailable(String),
    /// Snapshot could not be decoded or carries a malformed cursor.
    #[error("Invalid ledger snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
