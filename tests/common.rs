// ABOUTME: Shared test fixtures: scripted vendor adapters and a recording destination sink
// ABOUTME: Used by the fetch, upload, and engine integration tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scale_sync::config::{AuthScheme, VendorProfile};
use scale_sync::errors::{SyncError, SyncResult};
use scale_sync::models::{BodyComposition, RawMeasurement, RawTimestamp};
use scale_sync::upload::BodyCompositionSink;
use scale_sync::vendors::core::{RetrievalModel, Session, VendorAdapter};

pub fn test_profile(page_size: usize) -> VendorProfile {
    VendorProfile {
        vendor: "scripted".to_owned(),
        api_base_url: "https://cloud.example.com".to_owned(),
        auth: AuthScheme::SymmetricEnvelope {
            key: "0123456789abcdef".to_owned(),
        },
        clock_skew_secs: 0,
        page_size,
        watermark_param: "lastAt".to_owned(),
        incremental_window_days: 2,
    }
}

pub fn raw_at(epoch_secs: i64) -> RawMeasurement {
    RawMeasurement {
        weight_kg: Some(80.0),
        ..RawMeasurement::at(RawTimestamp::Numeric(epoch_secs as f64))
    }
}

pub fn weightless_at(epoch_secs: i64) -> RawMeasurement {
    RawMeasurement::at(RawTimestamp::Numeric(epoch_secs as f64))
}

struct AdapterState {
    batches: Mutex<VecDeque<Vec<RawMeasurement>>>,
    fetch_calls: AtomicUsize,
    fail_auth: bool,
}

/// Vendor adapter that replays a scripted sequence of batches, one per
/// `fetch_page` call, then empty batches forever.
#[derive(Clone)]
pub struct ScriptedAdapter {
    profile: VendorProfile,
    retrieval: RetrievalModel,
    state: Arc<AdapterState>,
}

impl ScriptedAdapter {
    pub fn paginated(page_size: usize, batches: Vec<Vec<RawMeasurement>>) -> Self {
        Self {
            profile: test_profile(page_size),
            retrieval: RetrievalModel::Paginated,
            state: Arc::new(AdapterState {
                batches: Mutex::new(batches.into()),
                fetch_calls: AtomicUsize::new(0),
                fail_auth: false,
            }),
        }
    }

    pub fn latest_only(batches: Vec<Vec<RawMeasurement>>) -> Self {
        Self {
            profile: test_profile(1),
            retrieval: RetrievalModel::LatestOnly,
            state: Arc::new(AdapterState {
                batches: Mutex::new(batches.into()),
                fetch_calls: AtomicUsize::new(0),
                fail_auth: false,
            }),
        }
    }

    pub fn rejecting_login() -> Self {
        Self {
            profile: test_profile(1),
            retrieval: RetrievalModel::Paginated,
            state: Arc::new(AdapterState {
                batches: Mutex::new(VecDeque::new()),
                fetch_calls: AtomicUsize::new(0),
                fail_auth: true,
            }),
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VendorAdapter for ScriptedAdapter {
    fn vendor(&self) -> &'static str {
        "scripted"
    }

    fn profile(&self) -> &VendorProfile {
        &self.profile
    }

    fn retrieval(&self) -> RetrievalModel {
        self.retrieval
    }

    async fn authenticate(&self) -> SyncResult<Session> {
        if self.state.fail_auth {
            return Err(SyncError::authentication("scripted", "login rejected"));
        }
        Ok(Session::with_token("scripted-token".to_owned()))
    }

    async fn fetch_page(
        &self,
        _session: &Session,
        _since: DateTime<Utc>,
    ) -> SyncResult<Vec<RawMeasurement>> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut batches = self.state.batches.lock().unwrap();
        Ok(batches.pop_front().unwrap_or_default())
    }
}

struct SinkState {
    uploads: Mutex<Vec<BodyComposition>>,
    auth_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    fail_at: Option<usize>,
}

/// Destination sink that records every accepted upload and can reject a
/// single call by index.
#[derive(Clone)]
pub struct RecordingSink {
    state: Arc<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::with_failure(None)
    }

    /// Reject the `index`-th upload call (zero-based), accept the rest.
    pub fn failing_at(index: usize) -> Self {
        Self::with_failure(Some(index))
    }

    fn with_failure(fail_at: Option<usize>) -> Self {
        Self {
            state: Arc::new(SinkState {
                uploads: Mutex::new(Vec::new()),
                auth_calls: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
                fail_at,
            }),
        }
    }

    pub fn uploads(&self) -> Vec<BodyComposition> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn auth_calls(&self) -> usize {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(Ordering::SeqCst)
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BodyCompositionSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn authenticate(&self) -> SyncResult<()> {
        self.state.auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_body_composition(&self, record: &BodyComposition) -> SyncResult<()> {
        let index = self.state.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_at == Some(index) {
            return Err(SyncError::Upload {
                timestamp: record.timestamp,
                cause: "destination returned 500".to_owned(),
            });
        }
        self.state.uploads.lock().unwrap().push(record.clone());
        Ok(())
    }
}
