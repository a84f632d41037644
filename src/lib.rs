// ABOUTME: Body-composition sync engine for smart-scale vendor clouds
// ABOUTME: Vendor auth adapters, watermark fetch, normalization, and upload orchestration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Synchronizes body-composition measurements (weight, body fat, water,
//! bone, muscle, visceral fat) from a scale vendor's cloud API into a
//! fitness platform, unattended, on behalf of a single account.
//!
//! The crate is trigger-agnostic: the hosting process owns scheduling,
//! configuration loading, logging setup, and the interactive OAuth bootstrap
//! for token-refresh vendors. Each invocation of
//! [`SyncEngine::synchronize`](engine::SyncEngine::synchronize) is a
//! self-contained run (authenticate, fetch, normalize, upload, report)
//! with no state shared across runs beyond the persisted refresh token.
//!
//! ```rust,no_run
//! use scale_sync::config::AccountCredentials;
//! use scale_sync::engine::SyncEngine;
//! use scale_sync::models::SyncMode;
//! use scale_sync::vendors::renpho::RenphoAdapter;
//! # use scale_sync::upload::BodyCompositionSink;
//! # async fn example(sink: Box<dyn BodyCompositionSink>) -> scale_sync::errors::SyncResult<()> {
//! let adapter = RenphoAdapter::new(AccountCredentials {
//!     email: "user@example.com".to_owned(),
//!     password: "secret".to_owned(),
//! })?;
//!
//! let engine = SyncEngine::new(Box::new(adapter), sink);
//! let report = engine.synchronize(SyncMode::Incremental).await?;
//! println!("uploaded {} of {} records", report.uploaded, report.fetched);
//! # Ok(())
//! # }
//! ```

/// Static per-vendor configuration
pub mod config;
/// Credential store for refreshable token pairs
pub mod credentials;
/// Vendor login cryptography (envelope codec, RSA password encryption)
pub mod crypto;
/// The sync engine composing one run end to end
pub mod engine;
/// Error taxonomy
pub mod errors;
/// Windowed measurement retrieval
pub mod fetch;
/// Shared HTTP client
pub mod http_client;
/// Shared data models
pub mod models;
/// Raw-to-canonical record normalization
pub mod normalize;
/// Destination sink and upload orchestration
pub mod upload;
/// Vendor adapter implementations
pub mod vendors;

pub use config::{AccountCredentials, AuthScheme, VendorProfile};
pub use credentials::{CredentialStore, StoredToken, TokenFile};
pub use engine::SyncEngine;
pub use errors::{SyncError, SyncResult};
pub use models::{BodyComposition, RawMeasurement, SyncMode, SyncReport, SyncWindow};
pub use upload::BodyCompositionSink;
pub use vendors::core::{RetrievalModel, Session, VendorAdapter};
