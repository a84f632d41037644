// ABOUTME: Scale vendor adapter implementations for the supported cloud APIs
// ABOUTME: Core adapter trait plus one module per login scheme variant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Vendor adapters.
//!
//! One module per supported scale cloud, each implementing
//! [`core::VendorAdapter`] over its own login scheme. Vendors are selected
//! by building the matching adapter from its profile at configuration time ;
//! never by branching on vendor names at call sites.

/// Core vendor adapter trait and session model
pub mod core;

/// Renpho Health: symmetric AES-ECB envelope scheme, latest-only retrieval
#[cfg(feature = "vendor-renpho")]
pub mod renpho;

/// QN Cloud (Yolanda): static-key RSA login, paginated retrieval
#[cfg(feature = "vendor-qnscale")]
pub mod qnscale;

/// Icomon: fetched-key RSA login, paginated retrieval
#[cfg(feature = "vendor-icomon")]
pub mod icomon;

/// Fitbit: OAuth token-refresh scheme, chunked weight-log retrieval
#[cfg(feature = "vendor-fitbit")]
pub mod fitbit;
