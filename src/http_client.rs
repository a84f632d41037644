// ABOUTME: Shared HTTP client with connection pooling and bounded timeouts
// ABOUTME: All vendor and key-fetch calls go through one pooled reqwest client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Global shared HTTP client with default configuration
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or create the shared HTTP client.
///
/// Every network call a run makes is a blocking await with these bounds; a
/// vendor that stops responding costs at most one timeout, not a hung run.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// Create a client with custom timeout settings, for endpoints that need
/// tighter bounds than the shared defaults.
#[must_use]
pub fn client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}
