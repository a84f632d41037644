// ABOUTME: The sync engine: one entry point composing login, fetch, normalize, upload
// ABOUTME: Stateless between runs; a failed run aborts cleanly and the next trigger retries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! The synchronization engine.
//!
//! [`SyncEngine::synchronize`] performs one complete run: resolve the
//! window, log in to the vendor, log in to the destination, fetch, normalize
//! and upload, then hand back a [`SyncReport`]. The engine holds no mutable
//! state across runs (sessions live and die inside a single call), so the
//! external trigger (cron, timer, startup hook) can invoke it repeatedly
//! without coordination beyond not overlapping invocations for one account.
//!
//! Failures before fetch begins (either login) are fatal to the run and
//! surface as `Err`; the hosting process is expected to log them and keep
//! waiting for the next trigger rather than terminate.

use chrono::Utc;
use tracing::{debug, error, info, info_span, Instrument};

use crate::errors::SyncResult;
use crate::fetch;
use crate::models::{SyncMode, SyncReport, SyncWindow};
use crate::normalize::normalize_record;
use crate::upload::{self, BodyCompositionSink};
use crate::vendors::core::VendorAdapter;

/// One vendor-to-destination synchronization pipeline.
pub struct SyncEngine {
    adapter: Box<dyn VendorAdapter>,
    sink: Box<dyn BodyCompositionSink>,
}

impl SyncEngine {
    /// Build an engine from a configured vendor adapter and destination sink.
    #[must_use]
    pub fn new(adapter: Box<dyn VendorAdapter>, sink: Box<dyn BodyCompositionSink>) -> Self {
        Self { adapter, sink }
    }

    /// Run one synchronization pass and report what happened.
    ///
    /// # Errors
    /// Returns the underlying [`SyncError`](crate::errors::SyncError) when
    /// the run aborts before any upload: vendor or destination login
    /// rejected, transport failure during fetch, or an envelope that would
    /// not decrypt.
    pub async fn synchronize(&self, mode: SyncMode) -> SyncResult<SyncReport> {
        let span = info_span!(
            "sync_run",
            vendor = self.adapter.vendor(),
            destination = self.sink.name(),
            ?mode
        );
        self.run(mode).instrument(span).await
    }

    async fn run(&self, mode: SyncMode) -> SyncResult<SyncReport> {
        let profile = self.adapter.profile();
        let now = Utc::now();
        let window = SyncWindow::resolve(mode, profile, now);
        info!(since = %window.since, "sync run starting");

        let session = self
            .adapter
            .authenticate()
            .await
            .inspect_err(|err| error!(%err, "vendor login failed, aborting run"))?;

        self.sink
            .authenticate()
            .await
            .inspect_err(|err| error!(%err, "destination login failed, aborting run"))?;

        let outcome = fetch::fetch_window(&*self.adapter, &session, &window, now)
            .await
            .inspect_err(|err| error!(%err, "fetch failed, aborting run"))?;

        let fetched = outcome.records.len();
        let mut skipped = outcome.stale_discarded;

        let mut canonical = Vec::with_capacity(fetched);
        for raw in &outcome.records {
            match normalize_record(raw, profile, window.since) {
                Some(record) => canonical.push(record),
                None => {
                    debug!("measurement without weight dropped");
                    skipped += 1;
                }
            }
        }

        let (uploaded, failures) = upload::upload_all(&*self.sink, canonical).await;

        let report = SyncReport {
            fetched,
            uploaded,
            skipped,
            failed: failures.len(),
            errors: failures,
        };
        info!(
            fetched = report.fetched,
            uploaded = report.uploaded,
            skipped = report.skipped,
            failed = report.failed,
            "sync run complete"
        );
        Ok(report)
    }
}
