// ABOUTME: Tests for the file-backed credential store used by token-refresh vendors
// ABOUTME: Round-trips the token pair and checks the atomic-rewrite behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use scale_sync::credentials::{CredentialStore, StoredToken, TokenFile};
use scale_sync::errors::SyncError;

#[test]
fn save_then_load_round_trips_the_pair() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitbit_token.json");
    let store = TokenFile::new("fitbit", &path);

    let token = StoredToken {
        access_token: "access-abc".to_owned(),
        refresh_token: "refresh-xyz".to_owned(),
        expires_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0),
    };
    store.save(&token).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.access_token, "access-abc");
    assert_eq!(loaded.refresh_token, "refresh-xyz");
    assert_eq!(loaded.expires_at, token.expires_at);

    // The temp file was renamed away, not left beside the live one.
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn save_overwrites_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitbit_token.json");
    let store = TokenFile::new("fitbit", &path);

    let first = StoredToken {
        access_token: "a1".to_owned(),
        refresh_token: "r1".to_owned(),
        expires_at: None,
    };
    let second = StoredToken {
        access_token: "a2".to_owned(),
        refresh_token: "r2".to_owned(),
        expires_at: None,
    };
    store.save(&first).unwrap();
    store.save(&second).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.access_token, "a2");
    assert_eq!(loaded.refresh_token, "r2");
}

#[test]
fn missing_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenFile::new("fitbit", dir.path().join("nope.json"));
    assert!(matches!(
        store.load(),
        Err(SyncError::Configuration { .. })
    ));
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitbit_token.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = TokenFile::new("fitbit", &path);
    assert!(matches!(
        store.load(),
        Err(SyncError::Configuration { .. })
    ));
}

#[test]
fn epoch_seconds_expiry_matches_the_bootstrap_tool_format() {
    // The interactive authorization tool writes expires_at as epoch seconds;
    // the store must read that shape as-is.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitbit_token.json");
    std::fs::write(
        &path,
        r#"{"access_token":"a","refresh_token":"r","expires_at":1700000000}"#,
    )
    .unwrap();

    let store = TokenFile::new("fitbit", &path);
    let loaded = store.load().unwrap();
    assert_eq!(
        loaded.expires_at,
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0)
    );
}
