// ABOUTME: Shared data models for raw vendor payloads and canonical records
// ABOUTME: Defines the sync window, run report, and the vendor-independent measurement shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Domain models shared across vendor adapters and the sync engine.
//!
//! Vendor adapters deserialize their own wire DTOs and convert them into
//! [`RawMeasurement`]s; the normalizer turns those into [`BodyComposition`]
//! records with a resolved UTC timestamp. Both are transient within one run;
//! nothing here is persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{VendorProfile, BACKLOG_DAYS};

/// A raw timestamp exactly as the vendor reported it, before unit and format
/// resolution. Vendors disagree on epoch scale and some report textual
/// date-times in their server's local zone.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// Numeric epoch value; may be seconds or milliseconds
    Numeric(f64),
    /// Textual date-time in the vendor's fixed pattern
    Text(String),
    /// Field absent from the payload
    Missing,
}

/// One measurement as extracted from a vendor payload, fields optional and
/// units already metric (vendors in scope all report kilograms and percent).
#[derive(Debug, Clone)]
pub struct RawMeasurement {
    /// Unresolved measurement timestamp
    pub timestamp: RawTimestamp,
    /// Body weight in kilograms; a record without it is invalid
    pub weight_kg: Option<f64>,
    /// Body fat percentage
    pub body_fat_pct: Option<f64>,
    /// Body water percentage
    pub hydration_pct: Option<f64>,
    /// Bone mass in kilograms
    pub bone_mass_kg: Option<f64>,
    /// Muscle mass in kilograms
    pub muscle_mass_kg: Option<f64>,
    /// Visceral fat rating/mass as reported
    pub visceral_fat: Option<f64>,
}

impl RawMeasurement {
    /// A measurement with only a timestamp set; adapters fill in the fields
    /// their payload actually carries.
    #[must_use]
    pub const fn at(timestamp: RawTimestamp) -> Self {
        Self {
            timestamp,
            weight_kg: None,
            body_fat_pct: None,
            hydration_pct: None,
            bone_mass_kg: None,
            muscle_mass_kg: None,
            visceral_fat: None,
        }
    }
}

/// The canonical, vendor-independent body-composition record.
///
/// Invariants: `timestamp` is UTC after normalization and `weight_kg` is
/// always present; a raw measurement without weight never becomes one of
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyComposition {
    /// Measurement instant, normalized to UTC
    pub timestamp: DateTime<Utc>,
    /// Body weight in kilograms
    pub weight_kg: f64,
    /// Body fat percentage
    pub body_fat_pct: Option<f64>,
    /// Body water percentage
    pub hydration_pct: Option<f64>,
    /// Bone mass in kilograms
    pub bone_mass_kg: Option<f64>,
    /// Muscle mass in kilograms
    pub muscle_mass_kg: Option<f64>,
    /// Visceral fat rating/mass as reported
    pub visceral_fat: Option<f64>,
    /// Vendor-clock epoch seconds this record was seen at, kept opaque for
    /// watermark bookkeeping
    pub source_watermark: i64,
}

/// Which window a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Short window (days) covering recent measurements plus clock-skew slack
    Incremental,
    /// Multi-year window used once to recover full history
    Backlog,
}

/// Resolved time window for one run. `since` never lies in the future.
#[derive(Debug, Clone, Copy)]
pub struct SyncWindow {
    /// Window mode the run was invoked with
    pub mode: SyncMode,
    /// Lower bound of the window
    pub since: DateTime<Utc>,
}

impl SyncWindow {
    /// Resolve the window for `mode` against the vendor's tuning.
    #[must_use]
    pub fn resolve(mode: SyncMode, profile: &VendorProfile, now: DateTime<Utc>) -> Self {
        let days = match mode {
            SyncMode::Incremental => profile.incremental_days(),
            SyncMode::Backlog => BACKLOG_DAYS,
        };
        Self {
            mode,
            since: now - Duration::days(days),
        }
    }
}

/// One rejected upload, identified by the record's timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFailure {
    /// Timestamp of the record the destination rejected
    pub timestamp: DateTime<Utc>,
    /// Destination-supplied cause
    pub cause: String,
}

/// Terminal summary of one run, handed to the caller for reporting and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Raw measurements accepted from the vendor
    pub fetched: usize,
    /// Records the destination accepted
    pub uploaded: usize,
    /// Records dropped before upload (missing weight, stale latest-only
    /// fallback)
    pub skipped: usize,
    /// Records the destination rejected
    pub failed: usize,
    /// Per-record failures, in upload order
    pub errors: Vec<UploadFailure>,
}
