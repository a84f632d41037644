// ABOUTME: Icomon cloud adapter using RSA PKCS1v1.5 login with a server-fetched public key
// ABOUTME: Paginated history retrieval; device binding is mandatory for measurement access
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Icomon adapter.
//!
//! Identical login scheme to the static-key RSA vendors except the public
//! key is fetched from the vendor first. The key endpoint returns the
//! bare base64 body without PEM markers, so it is wrapped before import. A
//! failed key fetch is a transport error, distinct from a rejected login.
//!
//! Measurement access is keyed by a bound device profile; an account without
//! one cannot query history at all, so a missing binding fails the login
//! rather than falling back to the account id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{AccountCredentials, AuthScheme, VendorProfile};
use crate::crypto::{encrypt_password, ensure_pem};
use crate::errors::{SyncError, SyncResult};
use crate::http_client::shared_client;
use crate::models::{RawMeasurement, RawTimestamp};
use crate::vendors::core::{RetrievalModel, Session, VendorAdapter};

const VENDOR: &str = "icomon";
const API_BASE: &str = "https://apis.icomon.cn/v2";
const KEY_URL: &str = "https://apis.icomon.cn/v2/auth/public-key";
const PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyResponse {
    public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: Option<String>,
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Device {
    device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    #[serde(default)]
    records: Vec<HistoryRecord>,
}

/// One history row; `measureTime` is a textual date-time in the server's
/// clock.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    measure_time: Option<String>,
    weight: Option<f64>,
    fat_rate: Option<f64>,
    water_rate: Option<f64>,
    bone_mass: Option<f64>,
    muscle_mass: Option<f64>,
    visceral_fat: Option<f64>,
}

impl HistoryRecord {
    fn into_raw(self) -> RawMeasurement {
        RawMeasurement {
            timestamp: self
                .measure_time
                .map_or(RawTimestamp::Missing, RawTimestamp::Text),
            weight_kg: self.weight,
            body_fat_pct: self.fat_rate,
            hydration_pct: self.water_rate,
            bone_mass_kg: self.bone_mass,
            muscle_mass_kg: self.muscle_mass,
            visceral_fat: self.visceral_fat,
        }
    }
}

/// Icomon adapter over the fetched-key RSA login scheme.
#[derive(Debug)]
pub struct IcomonAdapter {
    profile: VendorProfile,
    credentials: AccountCredentials,
    client: Client,
}

impl IcomonAdapter {
    /// Default profile for the Icomon cloud.
    #[must_use]
    pub fn default_profile() -> VendorProfile {
        VendorProfile {
            vendor: VENDOR.to_owned(),
            api_base_url: API_BASE.to_owned(),
            auth: AuthScheme::RsaFetchedKey {
                key_url: KEY_URL.to_owned(),
            },
            clock_skew_secs: 0,
            page_size: PAGE_SIZE,
            watermark_param: "since".to_owned(),
            incremental_window_days: 7,
        }
    }

    /// Build an adapter with the default profile.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile's auth scheme is
    /// not the fetched-key RSA variant.
    pub fn new(credentials: AccountCredentials) -> SyncResult<Self> {
        Self::with_profile(Self::default_profile(), credentials)
    }

    /// Build an adapter from a custom profile.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile does not carry a
    /// fetched-key RSA scheme.
    pub fn with_profile(
        profile: VendorProfile,
        credentials: AccountCredentials,
    ) -> SyncResult<Self> {
        if !matches!(profile.auth, AuthScheme::RsaFetchedKey { .. }) {
            return Err(SyncError::configuration(
                VENDOR,
                "profile must use the fetched-key RSA scheme",
            ));
        }
        Ok(Self {
            profile,
            credentials,
            client: shared_client().clone(),
        })
    }

    /// Fetch the vendor's current login key. Failure here is a transport
    /// problem, not an authentication rejection.
    async fn fetch_public_key(&self) -> SyncResult<String> {
        let AuthScheme::RsaFetchedKey { key_url } = &self.profile.auth else {
            return Err(SyncError::configuration(VENDOR, "missing key endpoint"));
        };

        let response = self
            .client
            .get(key_url)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, format!("key fetch failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::transport(
                VENDOR,
                format!("key fetch returned status {status}"),
            ));
        }

        let parsed: PublicKeyResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, format!("key fetch failed: {e}")))?;
        let raw = parsed
            .public_key
            .ok_or_else(|| SyncError::transport(VENDOR, "key fetch returned no key"))?;

        // The endpoint returns the bare base64 body; the importer needs the
        // PEM envelope.
        Ok(ensure_pem(&raw))
    }
}

#[async_trait]
impl VendorAdapter for IcomonAdapter {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    fn profile(&self) -> &VendorProfile {
        &self.profile
    }

    fn retrieval(&self) -> RetrievalModel {
        RetrievalModel::Paginated
    }

    async fn authenticate(&self) -> SyncResult<Session> {
        debug!("fetching Icomon login key");
        let pem = self.fetch_public_key().await?;
        let sealed_password = encrypt_password(VENDOR, &pem, &self.credentials.password)?;

        let url = format!("{}/user/login", self.profile.api_base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "email": self.credentials.email,
                "password": sealed_password,
            }))
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::transport(
                VENDOR,
                format!("login returned status {status}"),
            ));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;
        let token = parsed.token.ok_or_else(|| {
            SyncError::authentication(VENDOR, "login response missing session token")
        })?;

        let mut session = Session {
            token,
            account_id: parsed.user_id,
            scale_profile_id: None,
            expires_at: None,
        };

        // History queries are keyed by a bound device; without one the
        // account has nothing to sync and the login is useless.
        let url = format!("{}/user/devices", self.profile.api_base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::transport(
                VENDOR,
                format!("devices returned status {status}"),
            ));
        }

        let devices: DevicesResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;
        let device = devices.devices.into_iter().next().ok_or_else(|| {
            SyncError::authentication(VENDOR, "account has no bound device profile")
        })?;
        session.scale_profile_id = Some(device.device_id);

        info!(
            account_id = ?session.account_id,
            device = ?session.scale_profile_id,
            "Icomon login successful"
        );
        Ok(session)
    }

    async fn fetch_page(
        &self,
        session: &Session,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<RawMeasurement>> {
        let url = format!("{}/measure/history", self.profile.api_base_url);
        let mut payload = serde_json::Map::new();
        payload.insert(
            self.profile.watermark_param.clone(),
            json!(since.timestamp()),
        );
        payload.insert("limit".to_owned(), json!(self.profile.page_size));
        if let Some(subject) = session.measurement_subject() {
            payload.insert("deviceId".to_owned(), json!(subject));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::transport(
                VENDOR,
                format!("history returned status {status}"),
            ));
        }

        let parsed: HistoryResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        debug!(batch = parsed.records.len(), "fetched history page");
        Ok(parsed
            .records
            .into_iter()
            .map(HistoryRecord::into_raw)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn history_row_maps_textual_measure_time() {
        let row: HistoryRecord = serde_json::from_value(json!({
            "measureTime": "2024-03-02 07:15:00",
            "weight": 68.9,
            "fatRate": 24.1,
            "muscleMass": 48.2,
        }))
        .unwrap();
        let raw = row.into_raw();
        assert_eq!(
            raw.timestamp,
            RawTimestamp::Text("2024-03-02 07:15:00".to_owned())
        );
        assert_eq!(raw.weight_kg, Some(68.9));
        assert_eq!(raw.muscle_mass_kg, Some(48.2));
        assert_eq!(raw.hydration_pct, None);
    }

    #[test]
    fn profile_mismatch_is_a_configuration_error() {
        let mut profile = IcomonAdapter::default_profile();
        profile.auth = AuthScheme::SymmetricEnvelope {
            key: "0123456789abcdef".to_owned(),
        };
        let err = IcomonAdapter::with_profile(
            profile,
            AccountCredentials {
                email: "a@b.c".to_owned(),
                password: "pw".to_owned(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }
}
