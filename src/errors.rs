// ABOUTME: Structured error taxonomy for vendor sync operations
// ABOUTME: Distinguishes fatal run-level failures from recoverable per-record failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Error types for the sync engine.
//!
//! The taxonomy mirrors how failures propagate through a run:
//!
//! - [`SyncError::Authentication`], [`SyncError::Transport`],
//!   [`SyncError::Decryption`] and [`SyncError::Configuration`] are fatal to
//!   the current run. The run aborts, the cause is logged, and the next
//!   scheduled trigger is the retry mechanism.
//! - [`SyncError::DataUnavailable`] and [`SyncError::StaleFallback`] are
//!   non-fatal: they yield an empty window and a normal result.
//! - [`SyncError::Upload`] is recovered per record by the upload loop.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by vendor adapters, the fetch loop, and the uploader.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Vendor or destination login was rejected.
    #[error("{vendor} authentication failed: {reason}")]
    Authentication {
        /// Vendor (or destination) that rejected the login
        vendor: String,
        /// Vendor-supplied message or local diagnosis
        reason: String,
    },

    /// Network or HTTP failure, including public-key fetch failures.
    #[error("{vendor} transport failure: {details}")]
    Transport {
        /// Vendor the request was addressed to
        vendor: String,
        /// Underlying error rendered as text
        details: String,
    },

    /// An encrypted envelope could not be decrypted or parsed.
    #[error("{vendor} envelope decryption failed: {details}")]
    Decryption {
        /// Vendor whose envelope failed to open
        vendor: String,
        /// What went wrong (base64, padding, UTF-8, JSON)
        details: String,
    },

    /// The vendor had no measurements for the requested window.
    #[error("{vendor} returned no measurements for the requested window")]
    DataUnavailable {
        /// Vendor queried
        vendor: String,
    },

    /// A latest-only vendor echoed a recent measurement for a historical
    /// request; accepting it would mis-date the record.
    #[error("{vendor} returned a stale latest-only record dated {returned} for requested date {requested}")]
    StaleFallback {
        /// Vendor queried
        vendor: String,
        /// Date the run asked for
        requested: NaiveDate,
        /// Date the vendor actually returned
        returned: NaiveDate,
    },

    /// A single record was rejected by the destination platform.
    #[error("upload of record at {timestamp} rejected: {cause}")]
    Upload {
        /// Timestamp identifying the rejected record
        timestamp: DateTime<Utc>,
        /// Destination-supplied cause
        cause: String,
    },

    /// Profile or credential data is malformed (wrong key length, bad PEM,
    /// unreadable token file).
    #[error("{vendor} configuration invalid: {details}")]
    Configuration {
        /// Vendor the configuration belongs to
        vendor: String,
        /// What is malformed
        details: String,
    },
}

impl SyncError {
    /// Build a [`SyncError::Transport`] from any displayable source error.
    pub fn transport(vendor: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            vendor: vendor.to_owned(),
            details: err.to_string(),
        }
    }

    /// Build a [`SyncError::Authentication`] with the given reason.
    pub fn authentication(vendor: &str, reason: impl Into<String>) -> Self {
        Self::Authentication {
            vendor: vendor.to_owned(),
            reason: reason.into(),
        }
    }

    /// Build a [`SyncError::Decryption`] with the given details.
    pub fn decryption(vendor: &str, details: impl Into<String>) -> Self {
        Self::Decryption {
            vendor: vendor.to_owned(),
            details: details.into(),
        }
    }

    /// Build a [`SyncError::Configuration`] with the given details.
    pub fn configuration(vendor: &str, details: impl Into<String>) -> Self {
        Self::Configuration {
            vendor: vendor.to_owned(),
            details: details.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single record.
    ///
    /// Upload rejections are isolated per record; empty windows and stale
    /// latest-only fallbacks simply produce an empty result.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Authentication { .. }
            | Self::Transport { .. }
            | Self::Decryption { .. }
            | Self::Configuration { .. } => true,
            Self::DataUnavailable { .. } | Self::StaleFallback { .. } | Self::Upload { .. } => {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification_follows_propagation_policy() {
        assert!(SyncError::authentication("renpho", "bad password").is_fatal());
        assert!(SyncError::transport("qnscale", "connection reset").is_fatal());
        assert!(SyncError::decryption("renpho", "bad padding").is_fatal());
        assert!(!SyncError::DataUnavailable {
            vendor: "renpho".to_owned()
        }
        .is_fatal());
        assert!(!SyncError::Upload {
            timestamp: Utc::now(),
            cause: "500".to_owned(),
        }
        .is_fatal());
    }

    #[test]
    fn display_carries_vendor_and_reason() {
        let err = SyncError::authentication("icomon", "device binding required");
        assert_eq!(
            err.to_string(),
            "icomon authentication failed: device binding required"
        );
    }
}
