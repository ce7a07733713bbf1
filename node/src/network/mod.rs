// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Remote compute endpoints: wire transport and the retrying client.

pub mod transport;
pub mod client;

pub use client::{local_fallback, normalize_url, ComputeResult, RemoteComputeClient, RetryPolicy};
pub use transport::{HttpTransport, Transport, TransientFailure};
