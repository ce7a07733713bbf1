// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Digest adapter.
//!
//! Every chained hash in the ledger goes through [`Digester`]. SHA-256 is the
//! default so chains stay comparable with the browser engine's WebCrypto
//! digests; BLAKE3 is available for deployments that only verify locally.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = KernelError;

    /// Resolving an unknown name is the `CryptoUnavailable` condition.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            other => Err(KernelError::CryptoUnavailable(other.to_string())),
        }
    }
}

/// Deterministic, side-effect free 256-bit digest producing lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Digester {
    algorithm: DigestAlgorithm,
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Build from a configured algorithm name.
    pub fn from_name(name: &str) -> Result<Self, KernelError> {
        name.parse().map(Self::new)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn digest(&self, bytes: &[u8]) -> [u8; 32] {
        match self.algorithm {
            DigestAlgorithm::Sha256 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&Sha256::digest(bytes));
                out
            }
            DigestAlgorithm::Blake3 => *blake3::hash(bytes).as_bytes(),
        }
    }

    /// 64-char lowercase hex digest.
    pub fn digest_hex(&self, bytes: &[u8]) -> String {
        hex::encode(self.digest(bytes))
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Digester::new(DigestAlgorithm::Sha256).digest_hex(bytes)
}

/// True if `s` looks like a hex-encoded 256-bit digest.
pub fn is_digest_hex(s: &str) -> bool {
    s.len() == crate::config::DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
