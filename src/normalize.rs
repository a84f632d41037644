// ABOUTME: Record normalization: timestamp unit/format resolution and skew correction
// ABOUTME: Turns vendor-extracted raw measurements into canonical UTC records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Normalization of raw vendor measurements into canonical records.
//!
//! Vendors report timestamps as epoch seconds, epoch milliseconds, or a
//! fixed textual pattern, without ever saying which. Resolution is attempted
//! in a fixed order and applies exactly once, on raw input only; the
//! canonical record carries no raw timestamp, so a record can never be
//! normalized twice.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::config::VendorProfile;
use crate::models::{BodyComposition, RawMeasurement, RawTimestamp};

/// Epoch values above this are taken to be milliseconds. Seconds-scale
/// values stay below it until the year 2096; millisecond values crossed it
/// in 1970.
const MS_DETECTION_THRESHOLD: f64 = 4_000_000_000.0;

/// The one textual pattern observed across vendors that report text dates.
const TEXT_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Resolve a raw timestamp to epoch seconds in the vendor's clock, without
/// skew correction. Returns `None` when nothing parses; callers decide the
/// fallback.
///
/// Resolution order: numeric seconds, numeric milliseconds (magnitude above
/// 4×10⁹), then the fixed textual pattern.
pub(crate) fn resolve_epoch_seconds(timestamp: &RawTimestamp) -> Option<i64> {
    match timestamp {
        RawTimestamp::Numeric(n) if n.is_finite() => {
            let seconds = if n.abs() > MS_DETECTION_THRESHOLD {
                n / 1000.0
            } else {
                *n
            };
            Some(seconds as i64)
        }
        RawTimestamp::Text(s) => NaiveDateTime::parse_from_str(s.trim(), TEXT_PATTERN)
            .ok()
            .map(|naive| naive.and_utc().timestamp()),
        RawTimestamp::Numeric(_) | RawTimestamp::Missing => None,
    }
}

/// Resolve a raw timestamp to a vendor-clock instant, for watermark
/// comparisons in the fetch loop. Watermarks are echoed back to the vendor,
/// so they stay in the vendor's clock and never get skew-corrected.
pub(crate) fn resolve_instant(timestamp: &RawTimestamp) -> Option<DateTime<Utc>> {
    resolve_epoch_seconds(timestamp).and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

/// Normalize one raw measurement into a canonical record.
///
/// Returns `None` when the weight field is absent; such records are invalid
/// and are counted as skipped by the caller, never uploaded.
///
/// `fallback` is the requested window date, used when the raw timestamp
/// fails every resolution step.
#[must_use]
pub fn normalize_record(
    raw: &RawMeasurement,
    profile: &VendorProfile,
    fallback: DateTime<Utc>,
) -> Option<BodyComposition> {
    let weight_kg = raw.weight_kg?;

    let vendor_epoch = resolve_epoch_seconds(&raw.timestamp).unwrap_or_else(|| {
        debug!(
            vendor = %profile.vendor,
            "timestamp unparseable, falling back to requested window date"
        );
        fallback.timestamp()
    });

    // Skew correction applies after unit resolution and before UTC
    // conversion, once per raw record.
    let corrected = vendor_epoch - profile.clock_skew_secs;
    let timestamp = DateTime::<Utc>::from_timestamp(corrected, 0)?;

    Some(BodyComposition {
        timestamp,
        weight_kg,
        body_fat_pct: raw.body_fat_pct,
        hydration_pct: raw.hydration_pct,
        bone_mass_kg: raw.bone_mass_kg,
        muscle_mass_kg: raw.muscle_mass_kg,
        visceral_fat: raw.visceral_fat,
        source_watermark: vendor_epoch,
    })
}
