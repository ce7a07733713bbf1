// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Length of a hex-encoded 256-bit digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Chain cursor of an empty ledger: 64 zero characters.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Dimension of the bag-of-hashed-tokens embedding.
pub const EMBEDDING_DIM: usize = 128;
