// ABOUTME: Static per-vendor configuration selected once at startup
// ABOUTME: Carries endpoints, auth scheme, clock skew, and pagination heuristics as data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Vendor profile configuration.
//!
//! A [`VendorProfile`] is immutable after startup and selects exactly one
//! [`AuthScheme`] variant. Scheme-embedded secrets (the symmetric envelope
//! key, the static RSA public key) live here as data rather than as code
//! constants; they are part of the vendor's client contract, shipped inside
//! every official app, and must be preserved bit-for-bit for the wire
//! protocol to work. Treat them as interoperability constants, not as
//! security measures.

use serde::{Deserialize, Serialize};

/// Incremental window bounds in days. Values observed across vendors range
/// from one to seven; anything wider defeats the point of an incremental run.
pub const MIN_INCREMENTAL_DAYS: i64 = 1;
/// Upper bound for the incremental window length.
pub const MAX_INCREMENTAL_DAYS: i64 = 7;

/// Backlog window length, wide enough to recover full scale history once.
pub const BACKLOG_DAYS: i64 = 5 * 365;

/// Account credentials for password-login vendors, supplied by the external
/// configuration surface. Token-refresh vendors use the credential store
/// instead.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountCredentials {
    /// Account email address
    pub email: String,
    /// Account password, sent only in the scheme-mandated encrypted form
    pub password: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Password omitted from debug output.
        f.debug_struct("AccountCredentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Authentication scheme implemented by a vendor's login endpoint.
///
/// Selected by the profile at configuration time; call sites never branch on
/// vendor names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthScheme {
    /// Whole-payload AES-128-ECB envelope with a scheme-embedded key.
    ///
    /// ECB with a client-shipped key is the vendor's own wire contract.
    /// Flagged in security review; not upgraded here because any change
    /// breaks interoperability.
    SymmetricEnvelope {
        /// 16-byte ASCII cipher key shipped with the vendor's app
        key: String,
    },
    /// Password encrypted with a fixed RSA public key, PKCS#1 v1.5 padding.
    RsaStaticKey {
        /// PEM-encoded public key embedded in the vendor's app
        public_key_pem: String,
    },
    /// Password encrypted with a public key fetched from the vendor first.
    RsaFetchedKey {
        /// Endpoint returning the current public key (possibly bare base64)
        key_url: String,
    },
    /// OAuth-style access/refresh token pair persisted by the credential
    /// store; expired tokens are exchanged transparently.
    TokenRefresh {
        /// OAuth client id issued to this integration
        client_id: String,
        /// OAuth client secret issued to this integration
        client_secret: String,
        /// Token exchange endpoint
        token_url: String,
    },
}

/// Static configuration for one vendor, loaded at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Vendor identifier (e.g. "renpho", "qnscale", "icomon", "fitbit")
    pub vendor: String,
    /// Base URL for the vendor's cloud API
    pub api_base_url: String,
    /// Login scheme and its embedded key material
    pub auth: AuthScheme,
    /// Fixed correction subtracted from every raw timestamp, in seconds.
    ///
    /// Some vendor servers stamp measurements in their own local zone
    /// (observed: one fleet reporting eight hours ahead of the user's true
    /// local time). Zero for vendors with sane clocks.
    pub clock_skew_secs: i64,
    /// Page size requested from paginated endpoints; a batch shorter than
    /// this signals the last page.
    pub page_size: usize,
    /// Query-parameter name the vendor uses for the watermark timestamp
    pub watermark_param: String,
    /// Incremental window length in days, clamped to the observed 1..=7 range
    pub incremental_window_days: i64,
}

impl VendorProfile {
    /// Incremental window length with the 1..=7 day clamp applied.
    #[must_use]
    pub fn incremental_days(&self) -> i64 {
        self.incremental_window_days
            .clamp(MIN_INCREMENTAL_DAYS, MAX_INCREMENTAL_DAYS)
    }
}
