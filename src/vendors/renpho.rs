// ABOUTME: Renpho Health cloud adapter using the symmetric AES-ECB envelope scheme
// ABOUTME: Latest-only retrieval via the daily summary endpoint with electrode payload selection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Renpho Health adapter.
//!
//! Every request body is JSON serialized, AES-128-ECB encrypted with the
//! app-embedded key, base64 encoded, and sent as `{"encryptData": …}`;
//! responses carry the same envelope on their `data` field next to a
//! `{code, msg}` pair. Code 101 is the observed success code.
//!
//! The daily summary endpoint returns the current day's latest measurement
//! regardless of the requested date, so retrieval is latest-only; the fetch
//! layer guards against stale answers to historical requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{AccountCredentials, AuthScheme, VendorProfile};
use crate::crypto::EnvelopeCipher;
use crate::errors::{SyncError, SyncResult};
use crate::http_client::shared_client;
use crate::models::{RawMeasurement, RawTimestamp};
use crate::vendors::core::{RetrievalModel, Session, VendorAdapter};

const VENDOR: &str = "renpho";
const API_BASE: &str = "https://cloud.renpho.com";
/// Cipher key shipped inside the official app; part of the wire contract.
const ENVELOPE_KEY: &str = "ed*wijdi$h6fe3ew";
const APP_VERSION: &str = "7.5.0";
const LOGIN_ENDPOINT: &str = "renpho-aggregation/user/login";
const DAILY_ENDPOINT: &str = "RenphoHealth/healthManage/dailyCalories";
/// Observed success code in envelope responses.
const SUCCESS_CODE: i64 = 101;
/// Scale models the login binds to; taken from the official app.
const DEVICE_TYPES: [&str; 7] = ["02D3", "02D5", "0B18", "0B38", "0B58", "0B78", "0BA6"];

/// Outer (unencrypted) response envelope.
#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    code: i64,
    msg: Option<String>,
    data: Option<String>,
}

/// Decrypted login payload.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: Option<String>,
    id: Option<i64>,
}

/// Decrypted daily summary: one of two mutually exclusive device payloads is
/// present depending on the electrode count of the scale that measured.
#[derive(Debug, Deserialize)]
struct DailySummary {
    #[serde(rename = "fourElectrodeWeight")]
    four_electrode: Option<ElectrodeMeasurement>,
    #[serde(rename = "eightElectrodeWeight")]
    eight_electrode: Option<ElectrodeMeasurement>,
}

/// Measurement fields shared by both electrode payloads. The API mixes key
/// casings; `localCreatedAt` has been observed as both epoch seconds and
/// epoch milliseconds.
#[derive(Debug, Deserialize)]
struct ElectrodeMeasurement {
    weight: Option<f64>,
    bodyfat: Option<f64>,
    water: Option<f64>,
    bone: Option<f64>,
    muscle: Option<f64>,
    visfat: Option<f64>,
    #[serde(rename = "localCreatedAt")]
    local_created_at: Option<Value>,
}

impl ElectrodeMeasurement {
    fn into_raw(self) -> RawMeasurement {
        let timestamp = match self.local_created_at {
            Some(Value::Number(n)) => n
                .as_f64()
                .map_or(RawTimestamp::Missing, RawTimestamp::Numeric),
            Some(Value::String(s)) => RawTimestamp::Text(s),
            _ => RawTimestamp::Missing,
        };
        RawMeasurement {
            timestamp,
            weight_kg: self.weight,
            body_fat_pct: self.bodyfat,
            hydration_pct: self.water,
            bone_mass_kg: self.bone,
            muscle_mass_kg: self.muscle,
            visceral_fat: self.visfat,
        }
    }
}

/// Renpho Health adapter over the symmetric envelope scheme.
#[derive(Debug)]
pub struct RenphoAdapter {
    profile: VendorProfile,
    credentials: AccountCredentials,
    cipher: EnvelopeCipher,
    client: Client,
}

impl RenphoAdapter {
    /// Default profile for the Renpho Health cloud.
    #[must_use]
    pub fn default_profile() -> VendorProfile {
        VendorProfile {
            vendor: VENDOR.to_owned(),
            api_base_url: API_BASE.to_owned(),
            auth: AuthScheme::SymmetricEnvelope {
                key: ENVELOPE_KEY.to_owned(),
            },
            clock_skew_secs: 0,
            // Latest-only endpoint; page size is nominal.
            page_size: 1,
            watermark_param: "data".to_owned(),
            incremental_window_days: 1,
        }
    }

    /// Build an adapter with the default profile.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile's auth scheme or
    /// key material is unusable.
    pub fn new(credentials: AccountCredentials) -> SyncResult<Self> {
        Self::with_profile(Self::default_profile(), credentials)
    }

    /// Build an adapter from a custom profile (testing, region overrides).
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile does not carry a
    /// symmetric envelope scheme with a valid key.
    pub fn with_profile(
        profile: VendorProfile,
        credentials: AccountCredentials,
    ) -> SyncResult<Self> {
        let AuthScheme::SymmetricEnvelope { key } = &profile.auth else {
            return Err(SyncError::configuration(
                VENDOR,
                "profile must use the symmetric envelope scheme",
            ));
        };
        let cipher = EnvelopeCipher::new(VENDOR, key)?;
        Ok(Self {
            profile,
            credentials,
            cipher,
            client: shared_client().clone(),
        })
    }

    /// POST an encrypted envelope and return the decrypted response payload.
    async fn api_call(
        &self,
        endpoint: &str,
        payload: &Value,
        session: Option<&Session>,
    ) -> SyncResult<Value> {
        let url = format!("{}/{endpoint}", self.profile.api_base_url);
        let body = json!({ "encryptData": self.cipher.encrypt(&payload.to_string()) });

        let mut request = self
            .client
            .post(&url)
            .header("language", "en")
            .header("appVersion", APP_VERSION)
            .header("platform", "android")
            .header("area", "US")
            .header("timeZone", "-6")
            .header("systemVersion", "16")
            .header("languageCode", "en")
            .header("userArea", "US")
            .json(&body);

        if let Some(session) = session {
            request = request.header("token", &session.token);
            if let Some(account_id) = session.account_id {
                request = request.header("userId", account_id.to_string());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::transport(
                VENDOR,
                format!("{endpoint} returned status {status}"),
            ));
        }

        let envelope: EnvelopeResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if envelope.code != SUCCESS_CODE {
            return Err(SyncError::authentication(
                VENDOR,
                envelope
                    .msg
                    .unwrap_or_else(|| format!("request failed with code {}", envelope.code)),
            ));
        }

        match envelope.data {
            Some(sealed) => {
                let plaintext = self.cipher.decrypt(&sealed)?;
                serde_json::from_str(&plaintext).map_err(|e| {
                    SyncError::decryption(VENDOR, format!("decrypted payload not JSON: {e}"))
                })
            }
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl VendorAdapter for RenphoAdapter {
    fn vendor(&self) -> &'static str {
        VENDOR
    }

    fn profile(&self) -> &VendorProfile {
        &self.profile
    }

    fn retrieval(&self) -> RetrievalModel {
        RetrievalModel::LatestOnly
    }

    async fn authenticate(&self) -> SyncResult<Session> {
        debug!("logging in to Renpho Health");
        let payload = json!({
            "questionnaire": {},
            "login": {
                "email": self.credentials.email,
                "password": self.credentials.password,
                "areaCode": "US",
                "appRevision": APP_VERSION,
                "cellphoneType": "scale-sync",
                "systemType": "11",
                "platform": "android",
            },
            "bindingList": { "deviceTypes": DEVICE_TYPES },
        });

        let decrypted = self.api_call(LOGIN_ENDPOINT, &payload, None).await?;
        let login: LoginResponse = serde_json::from_value(decrypted)
            .map_err(|e| SyncError::decryption(VENDOR, format!("login payload malformed: {e}")))?;

        let login = login
            .login
            .ok_or_else(|| SyncError::authentication(VENDOR, "login response missing login data"))?;
        let token = login.token.ok_or_else(|| {
            SyncError::authentication(VENDOR, "login response missing session token")
        })?;

        // No separate scale-profile endpoint on this API; measurement calls
        // are keyed by the account id.
        let session = Session {
            token,
            account_id: login.id,
            scale_profile_id: None,
            expires_at: None,
        };
        info!(account_id = ?session.account_id, "Renpho Health login successful");
        Ok(session)
    }

    async fn fetch_page(
        &self,
        session: &Session,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<RawMeasurement>> {
        let date = since.date_naive().format("%Y-%m-%d").to_string();
        debug!(%date, "fetching daily summary");

        let decrypted = self
            .api_call(DAILY_ENDPOINT, &json!({ "data": date }), Some(session))
            .await?;
        if decrypted.is_null() {
            return Ok(Vec::new());
        }

        let summary: DailySummary = serde_json::from_value(decrypted).map_err(|e| {
            SyncError::decryption(VENDOR, format!("daily summary malformed: {e}"))
        })?;

        // Exactly one electrode payload is populated per measurement.
        let measurement = summary.four_electrode.or(summary.eight_electrode);
        Ok(measurement
            .map(ElectrodeMeasurement::into_raw)
            .into_iter()
            .collect())
    }
}
