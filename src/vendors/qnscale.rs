// ABOUTME: QN Cloud (Yolanda) adapter using RSA PKCS1v1.5 login with a static embedded key
// ABOUTME: Paginated measurement retrieval keyed by the lastAt watermark, +8h server clock skew
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! QN Cloud adapter.
//!
//! The login endpoint expects the account password encrypted with a fixed
//! RSA public key shipped inside the vendor app, PKCS#1 v1.5 padded and
//! base64 encoded, alongside the plaintext email. Measurements are paged
//! with a `lastAt` watermark in epoch seconds.
//!
//! The vendor's servers stamp measurements in their own local zone, eight
//! hours ahead of the account's observed wall clock; the profile carries the
//! correction as a fixed skew.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{AccountCredentials, AuthScheme, VendorProfile};
use crate::crypto::encrypt_password;
use crate::errors::{SyncError, SyncResult};
use crate::http_client::shared_client;
use crate::models::{RawMeasurement, RawTimestamp};
use crate::vendors::core::{RetrievalModel, Session, VendorAdapter};

const VENDOR: &str = "qnscale";
const API_BASE: &str = "https://api.qnclouds.com/api/v1";
/// Server clocks run eight hours ahead of the measurements' true local time.
const CLOCK_SKEW_SECS: i64 = 8 * 3600;
const PAGE_SIZE: usize = 20;

/// RSA public key shipped inside the vendor app; the login endpoint only
/// accepts passwords encrypted against it.
const LOGIN_PUBLIC_KEY: &str = "-----BEGIN PUBLIC KEY-----
MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDdv/mSBOCsAznqrNqPLQtj64p4
KrHswi7QEWhvHHeQAm9zIU4Vmr9/99GS4FnPSQd4gJqBeyqMKPSDges9d5J2o94t
Bvw2gjLinQVy/MuTEzNQ8OefpN2HTnYTWzgAvCtxQlJrU5280Sb+l+OdYnFajtCm
lQYDuRtFnOrD8sRzOQIDAQAB
-----END PUBLIC KEY-----";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    token: Option<String>,
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ScaleUsersResponse {
    data: Option<ScaleUsersData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleUsersData {
    #[serde(default)]
    scale_users: Vec<ScaleUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleUser {
    scale_user_id: String,
}

#[derive(Debug, Deserialize)]
struct MeasurementsResponse {
    data: Option<MeasurementsData>,
}

#[derive(Debug, Deserialize)]
struct MeasurementsData {
    #[serde(default)]
    measurements: Vec<QnMeasurement>,
}

/// One measurement row; timestamps are epoch seconds in the server's clock.
#[derive(Debug, Deserialize)]
struct QnMeasurement {
    timestamp: Option<f64>,
    weight: Option<f64>,
    bodyfat: Option<f64>,
    water: Option<f64>,
    bone: Option<f64>,
    muscle: Option<f64>,
    visfat: Option<f64>,
}

impl QnMeasurement {
    fn into_raw(self) -> RawMeasurement {
        RawMeasurement {
            timestamp: self
                .timestamp
                .map_or(RawTimestamp::Missing, RawTimestamp::Numeric),
            weight_kg: self.weight,
            body_fat_pct: self.bodyfat,
            hydration_pct: self.water,
            bone_mass_kg: self.bone,
            muscle_mass_kg: self.muscle,
            visceral_fat: self.visfat,
        }
    }
}

/// QN Cloud adapter over the static-key RSA login scheme.
pub struct QnScaleAdapter {
    profile: VendorProfile,
    credentials: AccountCredentials,
    login_key_pem: String,
    client: Client,
}

impl QnScaleAdapter {
    /// Default profile for the QN Cloud API.
    #[must_use]
    pub fn default_profile() -> VendorProfile {
        VendorProfile {
            vendor: VENDOR.to_owned(),
            api_base_url: API_BASE.to_owned(),
            auth: AuthScheme::RsaStaticKey {
                public_key_pem: LOGIN_PUBLIC_KEY.to_owned(),
            },
            clock_skew_secs: CLOCK_SKEW_SECS,
            page_size: PAGE_SIZE,
            watermark_param: "lastAt".to_owned(),
            incremental_window_days: 3,
        }
    }

    /// Build an adapter with the default profile.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile's auth scheme is
    /// not the static-key RSA variant.
    pub fn new(credentials: AccountCredentials) -> SyncResult<Self> {
        Self::with_profile(Self::default_profile(), credentials)
    }

    /// Build an adapter from a custom profile.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile does not carry a
    /// static RSA key.
    pub fn with_profile(
        profile: VendorProfile,
        credentials: AccountCredentials,
    ) -> SyncResult<Self> {
        let AuthScheme::RsaStaticKey { public_key_pem } = &profile.auth else {
            return Err(SyncError::configuration(
                VENDOR,
                "profile must use the static-key RSA scheme",
            ));
        };
        let login_key_pem = public_key_pem.clone();
        Ok(Self {
            profile,
            credentials,
            login_key_pem,
            client: shared_client().clone(),
        })
    }

    /// Resolve the scale user the measurement endpoint should be keyed by.
    /// Accounts that never created one fall back to the account id.
    async fn resolve_scale_user(&self, session: &Session) -> SyncResult<Option<String>> {
        let url = format!("{}/scale-users", self.profile.api_base_url);
        let response = self
            .client
            .get(&url)
            .header("token", &session.token)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::transport(
                VENDOR,
                format!("scale-users returned status {status}"),
            ));
        }

        let parsed: ScaleUsersResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        Ok(parsed
            .data
            .and_then(|data| data.scale_users.into_iter().next())
            .map(|user| user.scale_user_id))
    }
}

#[async_trait]
impl VendorAdapter for QnScaleAdapter {
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
        debug!("logging in to QN Cloud");
        let sealed_password =
            encrypt_password(VENDOR, &self.login_key_pem, &self.credentials.password)?;

        let url = format!("{}/users/sign_in", self.profile.api_base_url);
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
                format!("sign_in returned status {status}"),
            ));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;
        let data = parsed
            .data
            .ok_or_else(|| SyncError::authentication(VENDOR, "login response missing data"))?;
        let token = data.token.ok_or_else(|| {
            SyncError::authentication(VENDOR, "login response missing session token")
        })?;

        let mut session = Session {
            token,
            account_id: data.user_id,
            scale_profile_id: None,
            expires_at: None,
        };

        match self.resolve_scale_user(&session).await? {
            Some(scale_user_id) => session.scale_profile_id = Some(scale_user_id),
            None => info!("no scale user on account, keying measurements by account id"),
        }

        info!(
            account_id = ?session.account_id,
            scale_user = ?session.scale_profile_id,
            "QN Cloud login successful"
        );
        Ok(session)
    }

    async fn fetch_page(
        &self,
        session: &Session,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<RawMeasurement>> {
        let url = format!("{}/measurements", self.profile.api_base_url);
        let watermark = since.timestamp().to_string();
        let limit = self.profile.page_size.to_string();

        let mut query: Vec<(&str, String)> = vec![
            (self.profile.watermark_param.as_str(), watermark),
            ("limit", limit),
        ];
        if let Some(subject) = session.measurement_subject() {
            query.push(("scaleUserId", subject));
        }

        let response = self
            .client
            .get(&url)
            .header("token", &session.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::transport(
                VENDOR,
                format!("measurements returned status {status}"),
            ));
        }

        let parsed: MeasurementsResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        let measurements = parsed
            .data
            .map_or_else(Vec::new, |data| data.measurements);
        debug!(batch = measurements.len(), "fetched measurement page");
        Ok(measurements
            .into_iter()
            .map(QnMeasurement::into_raw)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_carries_the_observed_skew() {
        let profile = QnScaleAdapter::default_profile();
        assert_eq!(profile.clock_skew_secs, 8 * 3600);
        assert_eq!(profile.watermark_param, "lastAt");
    }

    #[test]
    fn measurement_row_maps_to_raw() {
        let row: QnMeasurement = serde_json::from_value(json!({
            "timestamp": 1_700_000_000.0,
            "weight": 75.2,
            "bodyfat": 18.4,
            "visfat": 7.0,
        }))
        .unwrap();
        let raw = row.into_raw();
        assert_eq!(raw.timestamp, RawTimestamp::Numeric(1_700_000_000.0));
        assert_eq!(raw.weight_kg, Some(75.2));
        assert_eq!(raw.visceral_fat, Some(7.0));
        assert_eq!(raw.bone_mass_kg, None);
    }

    #[test]
    fn embedded_login_key_parses() {
        // The key is data, not code; a profile regression that corrupts it
        // should fail here rather than at the vendor.
        let sealed = encrypt_password(VENDOR, LOGIN_PUBLIC_KEY, "pw").unwrap();
        assert!(!sealed.is_empty());
    }
}
