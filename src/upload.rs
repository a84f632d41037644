// ABOUTME: Destination sink trait and the sequential per-record upload loop
// ABOUTME: Isolates single-record failures so one rejection never aborts the rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Upload orchestration.
//!
//! The destination platform is consumed as an opaque authenticated
//! capability: log in, then push one body-composition record at a time.
//! There is no batch API and no query-before-write, so idempotency is
//! delegated to the destination's own overwrite-on-matching-timestamp
//! behavior; a known limitation, not a guarantee this engine can make.
//!
//! Uploads run sequentially in ascending timestamp order. Ordering is for
//! log readability and vendor-side friendliness; records share no state, so
//! correctness does not depend on it.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::SyncResult;
use crate::models::{BodyComposition, UploadFailure};

/// The destination platform's body-composition ingestion capability.
///
/// Implementations format the record timestamp as ISO 8601 and map the
/// optional metrics onto whatever the destination's upload call accepts;
/// the login protocol behind `authenticate` is the implementation's own
/// business.
#[async_trait]
pub trait BodyCompositionSink: Send + Sync {
    /// Destination name, for logs and error messages.
    fn name(&self) -> &'static str;

    /// Establish the destination session for this run.
    async fn authenticate(&self) -> SyncResult<()>;

    /// Push one canonical record.
    async fn add_body_composition(&self, record: &BodyComposition) -> SyncResult<()>;
}

/// Upload every record, isolating per-record failures.
///
/// Returns the number of accepted records and the ordered failures. A
/// rejection is logged and counted, and the loop moves on to the next
/// record.
pub async fn upload_all(
    sink: &dyn BodyCompositionSink,
    mut records: Vec<BodyComposition>,
) -> (usize, Vec<UploadFailure>) {
    records.sort_by_key(|record| record.timestamp);

    let mut uploaded = 0;
    let mut failures = Vec::new();

    for record in &records {
        match sink.add_body_composition(record).await {
            Ok(()) => {
                debug!(
                    destination = sink.name(),
                    timestamp = %record.timestamp,
                    weight_kg = record.weight_kg,
                    "record uploaded"
                );
                uploaded += 1;
            }
            Err(err) => {
                warn!(
                    destination = sink.name(),
                    timestamp = %record.timestamp,
                    %err,
                    "record rejected, continuing with remaining records"
                );
                failures.push(UploadFailure {
                    timestamp: record.timestamp,
                    cause: err.to_string(),
                });
            }
        }
    }

    (uploaded, failures)
}
