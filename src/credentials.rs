// ABOUTME: Credential store boundary for token-refresh vendors
// ABOUTME: Persists the OAuth token pair as JSON with atomic file rewrites
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Credential store for refreshable token pairs.
//!
//! The interactive authorization flow that mints the first token pair lives
//! outside this crate; it writes the token file this module reads. The only
//! state that survives across runs is this token pair; everything else in a
//! session is discarded when the run ends.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};

/// Refresh tokens slightly before their stated expiry so an upload burst
/// never races the deadline.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// A persisted OAuth access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Current access token
    pub access_token: String,
    /// Refresh token exchanged for a new pair once the access token expires
    pub refresh_token: String,
    /// Access token expiry as epoch seconds, when the vendor reports one
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether the access token is expired or inside the refresh margin.
    /// Tokens without a stated expiry are assumed live until the vendor
    /// rejects them.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + Duration::minutes(REFRESH_MARGIN_MINUTES) > expires_at)
    }
}

/// Source of account secrets for token-refresh vendors.
///
/// `save` is invoked from the refresh callback before the original request is
/// retried, so a crash after refresh never strands an unusable pair on disk.
pub trait CredentialStore: Send + Sync {
    /// Load the persisted token pair.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the store is missing or
    /// unreadable.
    fn load(&self) -> SyncResult<StoredToken>;

    /// Persist a freshly refreshed token pair.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the pair cannot be written.
    fn save(&self, token: &StoredToken) -> SyncResult<()>;
}

/// File-backed credential store holding one JSON token object.
#[derive(Debug, Clone)]
pub struct TokenFile {
    vendor: String,
    path: PathBuf,
}

impl TokenFile {
    /// Create a store reading and rewriting `path`.
    #[must_use]
    pub fn new(vendor: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            vendor: vendor.into(),
            path: path.into(),
        }
    }
}

impl CredentialStore for TokenFile {
    fn load(&self) -> SyncResult<StoredToken> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            SyncError::configuration(
                &self.vendor,
                format!("token file {} unreadable: {e}", self.path.display()),
            )
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            SyncError::configuration(
                &self.vendor,
                format!("token file {} malformed: {e}", self.path.display()),
            )
        })
    }

    fn save(&self, token: &StoredToken) -> SyncResult<()> {
        let body = serde_json::to_string_pretty(token).map_err(|e| {
            SyncError::configuration(&self.vendor, format!("token serialization failed: {e}"))
        })?;

        // Write-then-rename so a crash mid-save never truncates the live file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|e| {
            SyncError::configuration(
                &self.vendor,
                format!("token file {} write failed: {e}", tmp.display()),
            )
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            SyncError::configuration(
                &self.vendor,
                format!("token file {} rename failed: {e}", self.path.display()),
            )
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn needs_refresh_respects_margin() {
        let now = Utc::now();
        let live = StoredToken {
            access_token: "a".to_owned(),
            refresh_token: "r".to_owned(),
            expires_at: Some(now + Duration::hours(1)),
        };
        assert!(!live.needs_refresh(now));

        let expiring = StoredToken {
            expires_at: Some(now + Duration::minutes(2)),
            ..live.clone()
        };
        assert!(expiring.needs_refresh(now));

        let unstated = StoredToken {
            expires_at: None,
            ..live
        };
        assert!(!unstated.needs_refresh(now));
    }
}
