// ABOUTME: Tests for the sequential upload loop and per-record failure isolation
// ABOUTME: A rejected record is counted and logged while the rest still upload
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{DateTime, Utc};
use common::RecordingSink;
use scale_sync::models::BodyComposition;
use scale_sync::upload::upload_all;

fn record_at(epoch_secs: i64) -> BodyComposition {
    BodyComposition {
        timestamp: DateTime::<Utc>::from_timestamp(epoch_secs, 0).unwrap(),
        weight_kg: 80.0,
        body_fat_pct: Some(20.0),
        hydration_pct: None,
        bone_mass_kg: None,
        muscle_mass_kg: None,
        visceral_fat: None,
        source_watermark: epoch_secs,
    }
}

#[tokio::test]
async fn one_rejected_record_does_not_abort_the_rest() {
    let records: Vec<BodyComposition> = (0..5)
        .map(|i| record_at(1_700_000_000 + i * 86_400))
        .collect();
    let third_timestamp = records[2].timestamp;

    // Record three (index 2 in ascending order) is rejected.
    let sink = RecordingSink::failing_at(2);
    let (uploaded, failures) = upload_all(&sink, records).await;

    assert_eq!(uploaded, 4);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].timestamp, third_timestamp);
    // Records four and five were still attempted.
    assert_eq!(sink.upload_calls(), 5);
}

#[tokio::test]
async fn uploads_run_in_ascending_timestamp_order() {
    // Hand the loop records out of order; vendors page newest-first.
    let records = vec![
        record_at(1_700_200_000),
        record_at(1_700_000_000),
        record_at(1_700_100_000),
    ];

    let sink = RecordingSink::new();
    let (uploaded, failures) = upload_all(&sink, records).await;

    assert_eq!(uploaded, 3);
    assert!(failures.is_empty());

    let seen: Vec<i64> = sink
        .uploads()
        .iter()
        .map(|record| record.timestamp.timestamp())
        .collect();
    assert_eq!(seen, vec![1_700_000_000, 1_700_100_000, 1_700_200_000]);
}

#[tokio::test]
async fn empty_input_uploads_nothing() {
    let sink = RecordingSink::new();
    let (uploaded, failures) = upload_all(&sink, Vec::new()).await;
    assert_eq!(uploaded, 0);
    assert!(failures.is_empty());
    assert_eq!(sink.upload_calls(), 0);
}
