// ABOUTME: Core vendor adapter trait and session model for scale cloud APIs
// ABOUTME: One adapter per login scheme; profiles select the variant at configuration time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! The vendor adapter contract.
//!
//! Each supported scale cloud implements [`VendorAdapter`]: establish a
//! [`Session`] from account credentials, then serve raw measurement batches
//! for the fetch loop. The adapters differ wildly in login scheme (that is
//! the point of the trait), but all of them hand the engine the same
//! [`RawMeasurement`](crate::models::RawMeasurement) shape.
//!
//! Adapters own the vendor-specific field mapping (e.g. selecting one of
//! several mutually exclusive device payloads); the shared normalizer owns
//! timestamp and unit resolution. Protocol details below the trait are
//! partially reverse-engineered and should be re-validated against live
//! vendor responses when a vendor ships an app update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::VendorProfile;
use crate::errors::SyncResult;
use crate::models::RawMeasurement;

/// An authenticated vendor session, owned by exactly one run and discarded
/// when the run ends. Only token-refresh vendors persist anything beyond it.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session token or access token
    pub token: String,
    /// Numeric account id, when the vendor issues one at login
    pub account_id: Option<i64>,
    /// Scale/device profile id resolved by the secondary lookup; falls back
    /// to the account id for vendors that tolerate it
    pub scale_profile_id: Option<String>,
    /// Session expiry, when the vendor states one
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session holding only a token.
    #[must_use]
    pub const fn with_token(token: String) -> Self {
        Self {
            token,
            account_id: None,
            scale_profile_id: None,
            expires_at: None,
        }
    }

    /// The identifier measurement endpoints should be keyed by: the resolved
    /// scale profile when present, otherwise the account id.
    #[must_use]
    pub fn measurement_subject(&self) -> Option<String> {
        self.scale_profile_id
            .clone()
            .or_else(|| self.account_id.map(|id| id.to_string()))
    }
}

/// How a vendor exposes historical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalModel {
    /// Watermark-driven pages; a batch shorter than the profile's page size
    /// signals the last page.
    Paginated,
    /// The endpoint only ever returns the most recent measurement, whatever
    /// date is requested.
    LatestOnly,
}

/// A scale vendor's cloud API, reduced to the two calls a sync run needs.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// Vendor identifier, matching the profile's `vendor` field.
    fn vendor(&self) -> &'static str;

    /// Static profile this adapter was configured with.
    fn profile(&self) -> &VendorProfile;

    /// Which retrieval model the measurement endpoint follows.
    fn retrieval(&self) -> RetrievalModel;

    /// Establish an authenticated session, including the secondary
    /// scale-profile lookup where the vendor has one.
    async fn authenticate(&self) -> SyncResult<Session>;

    /// Fetch one batch of raw measurements strictly newer than `since`.
    ///
    /// Paginated vendors treat `since` as the watermark; latest-only vendors
    /// treat its date as the requested day and ignore the time of day.
    async fn fetch_page(
        &self,
        session: &Session,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<RawMeasurement>>;
}
