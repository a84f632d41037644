// ABOUTME: Tests for the watermark pagination loop and latest-only staleness guard
// ABOUTME: Covers termination conditions, non-advancing watermarks, and stale fallback rejection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use common::{raw_at, ScriptedAdapter};
use scale_sync::fetch::fetch_window;
use scale_sync::models::{SyncMode, SyncWindow};
use scale_sync::vendors::core::VendorAdapter;

#[tokio::test]
async fn paginated_fetch_accumulates_all_batches() {
    let now = Utc::now();
    let base = now.timestamp() - 10_000;

    // Three batches with strictly increasing watermarks; the last one is
    // short (1 < page size 2) and signals the final page.
    let adapter = ScriptedAdapter::paginated(
        2,
        vec![
            vec![raw_at(base + 100), raw_at(base + 200)],
            vec![raw_at(base + 300), raw_at(base + 400)],
            vec![raw_at(base + 500)],
        ],
    );
    let session = adapter.authenticate().await.unwrap();
    let window = SyncWindow {
        mode: SyncMode::Backlog,
        since: now - Duration::days(365),
    };

    let outcome = fetch_window(&adapter, &session, &window, now).await.unwrap();
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.stale_discarded, 0);
    // Short batch terminated the loop; no fourth call was made.
    assert_eq!(adapter.fetch_calls(), 3);
}

#[tokio::test]
async fn empty_first_batch_terminates_immediately() {
    let now = Utc::now();
    let adapter = ScriptedAdapter::paginated(2, vec![vec![]]);
    let session = adapter.authenticate().await.unwrap();
    let window = SyncWindow {
        mode: SyncMode::Incremental,
        since: now - Duration::days(2),
    };

    let outcome = fetch_window(&adapter, &session, &window, now).await.unwrap();
    assert!(outcome.records.is_empty());
    assert_eq!(adapter.fetch_calls(), 1);
}

#[tokio::test]
async fn non_advancing_watermark_stops_without_keeping_the_echoed_batch() {
    let now = Utc::now();
    let base = now.timestamp() - 10_000;

    // The vendor echoes the same full page forever; the loop must keep
    // batch one, discard batch two, and stop.
    let page = vec![raw_at(base + 100), raw_at(base + 200)];
    let adapter = ScriptedAdapter::paginated(2, vec![page.clone(), page.clone(), page]);
    let session = adapter.authenticate().await.unwrap();
    let window = SyncWindow {
        mode: SyncMode::Backlog,
        since: now - Duration::days(365),
    };

    let outcome = fetch_window(&adapter, &session, &window, now).await.unwrap();
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(adapter.fetch_calls(), 2);
}

#[tokio::test]
async fn latest_only_backlog_discards_stale_fallback() {
    let now = Utc::now();

    // Backlog run asks for a date 400 days back; the vendor answers with
    // today's measurement anyway. Accepting it would date today's weight
    // over a year into the past.
    let adapter = ScriptedAdapter::latest_only(vec![vec![raw_at(now.timestamp())]]);
    let session = adapter.authenticate().await.unwrap();
    let window = SyncWindow {
        mode: SyncMode::Backlog,
        since: now - Duration::days(400),
    };

    let outcome = fetch_window(&adapter, &session, &window, now).await.unwrap();
    assert!(outcome.records.is_empty());
    // Distinct from a genuinely empty answer.
    assert_eq!(outcome.stale_discarded, 1);
}

#[tokio::test]
async fn latest_only_incremental_accepts_todays_measurement() {
    let now = Utc::now();
    let adapter = ScriptedAdapter::latest_only(vec![vec![raw_at(now.timestamp() - 3600)]]);
    let session = adapter.authenticate().await.unwrap();
    let window = SyncWindow {
        mode: SyncMode::Incremental,
        since: now - Duration::days(2),
    };

    let outcome = fetch_window(&adapter, &session, &window, now).await.unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.stale_discarded, 0);
    // Latest-only vendors get exactly one call per run.
    assert_eq!(adapter.fetch_calls(), 1);
}

#[tokio::test]
async fn latest_only_empty_answer_is_plain_empty() {
    let now = Utc::now();
    let adapter = ScriptedAdapter::latest_only(vec![vec![]]);
    let session = adapter.authenticate().await.unwrap();
    let window = SyncWindow {
        mode: SyncMode::Backlog,
        since: now - Duration::days(400),
    };

    let outcome = fetch_window(&adapter, &session, &window, now).await.unwrap();
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stale_discarded, 0);
}
