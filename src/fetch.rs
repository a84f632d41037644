// ABOUTME: Measurement retrieval loop: watermark pagination and latest-only fallback guard
// ABOUTME: Accumulates raw batches with explicit termination conditions, no unbounded loops
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Windowed measurement retrieval.
//!
//! Paginated vendors are driven by a watermark loop with three ordered
//! termination conditions: an empty batch, a watermark that fails to
//! advance (vendors have been observed echoing stale pages forever), and a
//! batch shorter than the vendor's page size. The non-advancing guard is the
//! loop's safety valve; there is no other cancellation path and none is
//! needed.
//!
//! Latest-only vendors get exactly one call. When a historical date was
//! requested and the vendor answers with a recent measurement anyway, the
//! answer is a stale "latest" fallback and is discarded rather than
//! mis-dated into the past.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::{SyncError, SyncResult};
use crate::models::{RawMeasurement, SyncMode, SyncWindow};
use crate::normalize::resolve_instant;
use crate::vendors::core::{RetrievalModel, Session, VendorAdapter};

/// Maximum distance between requested and returned date before a latest-only
/// response counts as a stale fallback.
const LATEST_TOLERANCE_DAYS: i64 = 1;

/// Raw records accepted from the vendor for one window, plus how many were
/// discarded as stale fallbacks; kept distinct from a genuinely empty
/// window.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Accepted raw measurements, in vendor order
    pub records: Vec<RawMeasurement>,
    /// Latest-only responses rejected by the staleness check
    pub stale_discarded: usize,
}

/// Fetch all raw measurements for `window` using the adapter's retrieval
/// model.
///
/// # Errors
/// Propagates [`SyncError::Transport`] (and any other adapter failure) to the
/// caller; a transport failure aborts the fetch for the whole run.
pub async fn fetch_window(
    adapter: &dyn VendorAdapter,
    session: &Session,
    window: &SyncWindow,
    now: DateTime<Utc>,
) -> SyncResult<FetchOutcome> {
    match adapter.retrieval() {
        RetrievalModel::Paginated => fetch_paginated(adapter, session, window).await,
        RetrievalModel::LatestOnly => fetch_latest(adapter, session, window, now).await,
    }
}

async fn fetch_paginated(
    adapter: &dyn VendorAdapter,
    session: &Session,
    window: &SyncWindow,
) -> SyncResult<FetchOutcome> {
    let vendor = adapter.vendor();
    let page_size = adapter.profile().page_size;
    let mut records: Vec<RawMeasurement> = Vec::new();
    let mut watermark = window.since;

    loop {
        let batch = adapter.fetch_page(session, watermark).await?;
        if batch.is_empty() {
            break;
        }

        let newest = batch
            .iter()
            .filter_map(|record| resolve_instant(&record.timestamp))
            .max();
        match newest {
            Some(ts) if ts > watermark => watermark = ts,
            _ => {
                // The vendor echoed data at or before the watermark; taking
                // the batch would loop forever on the same page.
                warn!(
                    vendor,
                    watermark = %watermark,
                    batch_len = batch.len(),
                    "watermark failed to advance, discarding batch and stopping"
                );
                break;
            }
        }

        let batch_len = batch.len();
        records.extend(batch);
        if batch_len < page_size {
            // Short batch: the vendor has nothing further.
            break;
        }
    }

    debug!(vendor, fetched = records.len(), "paginated fetch complete");
    Ok(FetchOutcome {
        records,
        stale_discarded: 0,
    })
}

async fn fetch_latest(
    adapter: &dyn VendorAdapter,
    session: &Session,
    window: &SyncWindow,
    now: DateTime<Utc>,
) -> SyncResult<FetchOutcome> {
    let vendor = adapter.vendor();
    // Incremental runs against a latest-only vendor ask for today; only a
    // backlog run asks for a historical date.
    let requested = match window.mode {
        SyncMode::Incremental => now,
        SyncMode::Backlog => window.since,
    };
    let requested_date = requested.date_naive();
    let today = now.date_naive();

    let batch = adapter.fetch_page(session, requested).await?;
    if batch.is_empty() {
        debug!(vendor, %requested_date, "no measurement available for requested date");
        return Ok(FetchOutcome::default());
    }

    let mut outcome = FetchOutcome::default();
    for record in batch {
        let returned_date = resolve_instant(&record.timestamp).map(|ts| ts.date_naive());
        let stale = requested_date != today
            && returned_date.is_some_and(|returned| {
                (returned - requested_date).num_days().abs() > LATEST_TOLERANCE_DAYS
            });

        if let (true, Some(returned)) = (stale, returned_date) {
            let rejection = SyncError::StaleFallback {
                vendor: vendor.to_owned(),
                requested: requested_date,
                returned,
            };
            warn!(vendor, %rejection, "discarding stale latest-only record");
            outcome.stale_discarded += 1;
        } else {
            outcome.records.push(record);
        }
    }

    Ok(outcome)
}
