// ABOUTME: Fitbit adapter using a persisted OAuth token pair with transparent refresh
// ABOUTME: Retrieves Aria weight logs in date-range chunks driven by the shared watermark loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Fitbit adapter.
//!
//! Unlike the password-login vendors, the session here is an OAuth
//! access/refresh token pair loaded from the credential store; the
//! interactive authorization that minted it lives outside this crate. When
//! the API reports the access token expired, the adapter exchanges the
//! refresh token for a new pair, persists it through the store, and retries
//! the original call exactly once.
//!
//! The weight log endpoint accepts at most a month per query, so one
//! watermark "page" scans forward in 30-day chunks until it finds records or
//! reaches the present.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{AuthScheme, VendorProfile};
use crate::credentials::{CredentialStore, StoredToken};
use crate::errors::{SyncError, SyncResult};
use crate::http_client::shared_client;
use crate::models::{RawMeasurement, RawTimestamp};
use crate::vendors::core::{RetrievalModel, Session, VendorAdapter};

const VENDOR: &str = "fitbit";
const API_BASE: &str = "https://api.fitbit.com/1";
const TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
/// The weight log endpoint rejects ranges longer than a month.
const WEIGHT_RANGE_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WeightLogResponse {
    #[serde(default)]
    weight: Vec<WeightLog>,
}

/// One weight log entry; `date`/`time` are the account's local wall clock.
/// Weights are kilograms as long as no `Accept-Language` override is sent.
#[derive(Debug, Deserialize)]
struct WeightLog {
    date: String,
    time: Option<String>,
    weight: Option<f64>,
    fat: Option<f64>,
}

impl WeightLog {
    fn timestamp_text(&self) -> String {
        let time = self.time.as_deref().unwrap_or("00:00:00");
        format!("{} {time}", self.date)
    }

    fn into_raw(self) -> RawMeasurement {
        RawMeasurement {
            timestamp: RawTimestamp::Text(self.timestamp_text()),
            weight_kg: self.weight,
            body_fat_pct: self.fat,
            hydration_pct: None,
            bone_mass_kg: None,
            muscle_mass_kg: None,
            visceral_fat: None,
        }
    }
}

/// Fitbit adapter over the token-refresh scheme.
pub struct FitbitAdapter {
    profile: VendorProfile,
    store: Arc<dyn CredentialStore>,
    token: RwLock<Option<StoredToken>>,
    client: Client,
}

impl FitbitAdapter {
    /// Default profile for the Fitbit Web API.
    #[must_use]
    pub fn default_profile(client_id: String, client_secret: String) -> VendorProfile {
        VendorProfile {
            vendor: VENDOR.to_owned(),
            api_base_url: API_BASE.to_owned(),
            auth: AuthScheme::TokenRefresh {
                client_id,
                client_secret,
                token_url: TOKEN_URL.to_owned(),
            },
            clock_skew_secs: 0,
            // Chunked date-range retrieval: a page is whatever one chunk scan
            // yields, so only the empty batch ends the loop.
            page_size: 1,
            watermark_param: "afterDate".to_owned(),
            incremental_window_days: 7,
        }
    }

    /// Build an adapter reading its token pair from `store`.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the profile's auth scheme is
    /// not the token-refresh variant.
    pub fn new(profile: VendorProfile, store: Arc<dyn CredentialStore>) -> SyncResult<Self> {
        if !matches!(profile.auth, AuthScheme::TokenRefresh { .. }) {
            return Err(SyncError::configuration(
                VENDOR,
                "profile must use the token-refresh scheme",
            ));
        }
        Ok(Self {
            profile,
            store,
            token: RwLock::new(None),
            client: shared_client().clone(),
        })
    }

    fn oauth_config(&self) -> SyncResult<(&str, &str, &str)> {
        match &self.profile.auth {
            AuthScheme::TokenRefresh {
                client_id,
                client_secret,
                token_url,
            } => Ok((client_id, client_secret, token_url)),
            _ => Err(SyncError::configuration(VENDOR, "missing OAuth settings")),
        }
    }

    async fn current_access_token(&self) -> SyncResult<String> {
        let guard = self.token.read().await;
        guard
            .as_ref()
            .map(|token| token.access_token.clone())
            .ok_or_else(|| SyncError::authentication(VENDOR, "no token pair loaded"))
    }

    /// Exchange the refresh token for a new pair and persist it through the
    /// credential store before anything gets retried.
    async fn refresh_token(&self) -> SyncResult<()> {
        let (client_id, client_secret, token_url) = self.oauth_config()?;
        let refresh_token = {
            let guard = self.token.read().await;
            guard
                .as_ref()
                .map(|token| token.refresh_token.clone())
                .ok_or_else(|| SyncError::authentication(VENDOR, "no refresh token available"))?
        };

        info!("refreshing Fitbit access token");
        // Fitbit requires Basic auth on the token endpoint.
        let basic = BASE64_STANDARD.encode(format!("{client_id}:{client_secret}"));
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        let response = self
            .client
            .post(token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&params)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::authentication(
                VENDOR,
                format!("token refresh rejected with status {status}"),
            ));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        let refreshed = StoredToken {
            access_token: parsed.access_token,
            // Fitbit rotates refresh tokens; fall back to the old one if the
            // response omits it.
            refresh_token: parsed.refresh_token.unwrap_or(refresh_token),
            expires_at: parsed
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };

        self.store.save(&refreshed)?;
        *self.token.write().await = Some(refreshed);
        Ok(())
    }

    /// Authenticated GET with the expired-token retry. The retry happens at
    /// most once; a second rejection surfaces as an authentication failure.
    async fn api_get<T>(&self, endpoint: &str) -> SyncResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{endpoint}", self.profile.api_base_url);
        let access_token = self.current_access_token().await?;

        let response = self
            .client
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))?;

        let response = if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("access token rejected, refreshing and retrying once");
            self.refresh_token().await?;
            let retry_token = self.current_access_token().await?;
            let retried = self
                .client
                .get(&url)
                .bearer_auth(&retry_token)
                .send()
                .await
                .map_err(|e| SyncError::transport(VENDOR, e))?;
            if retried.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(SyncError::authentication(
                    VENDOR,
                    "access token rejected after refresh",
                ));
            }
            retried
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::transport(
                VENDOR,
                format!("{endpoint} returned status {status}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::transport(VENDOR, e))
    }

    fn parse_log_instant(log: &WeightLog) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&log.timestamp_text(), "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[async_trait]
impl VendorAdapter for FitbitAdapter {
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
        let stored = self.store.load()?;
        let needs_refresh = stored.needs_refresh(Utc::now());
        *self.token.write().await = Some(stored);

        if needs_refresh {
            self.refresh_token().await?;
        }

        let guard = self.token.read().await;
        let token = guard
            .as_ref()
            .ok_or_else(|| SyncError::authentication(VENDOR, "no token pair loaded"))?;

        debug!("Fitbit token pair ready");
        Ok(Session {
            token: token.access_token.clone(),
            account_id: None,
            scale_profile_id: None,
            expires_at: token.expires_at,
        })
    }

    async fn fetch_page(
        &self,
        _session: &Session,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<RawMeasurement>> {
        let now = Utc::now();
        let mut chunk_start = since;

        // Scan forward one 30-day chunk at a time until something turns up
        // or the scan reaches the present; an empty return ends the outer
        // watermark loop.
        while chunk_start < now {
            let chunk_end = (chunk_start + Duration::days(WEIGHT_RANGE_DAYS)).min(now);
            let endpoint = format!(
                "user/-/body/log/weight/date/{}/{}.json",
                chunk_start.date_naive().format("%Y-%m-%d"),
                chunk_end.date_naive().format("%Y-%m-%d"),
            );

            let response: WeightLogResponse = self.api_get(&endpoint).await?;
            let records: Vec<RawMeasurement> = response
                .weight
                .into_iter()
                .filter(|log| {
                    // Strictly newer than the watermark, so re-querying the
                    // boundary day never loops on the same record.
                    Self::parse_log_instant(log).is_none_or(|ts| ts > since)
                })
                .map(WeightLog::into_raw)
                .collect();

            if !records.is_empty() {
                debug!(batch = records.len(), "fetched weight log chunk");
                return Ok(records);
            }
            chunk_start = chunk_end;
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn weight_log_joins_date_and_time() {
        let log: WeightLog = serde_json::from_value(serde_json::json!({
            "date": "2024-01-15",
            "time": "08:31:12",
            "weight": 80.2,
            "fat": 21.0,
        }))
        .unwrap();
        assert_eq!(log.timestamp_text(), "2024-01-15 08:31:12");

        let raw = log.into_raw();
        assert_eq!(
            raw.timestamp,
            RawTimestamp::Text("2024-01-15 08:31:12".to_owned())
        );
        assert_eq!(raw.weight_kg, Some(80.2));
    }

    #[test]
    fn dateless_time_defaults_to_midnight() {
        let log: WeightLog = serde_json::from_value(serde_json::json!({
            "date": "2024-01-15",
            "weight": 80.2,
        }))
        .unwrap();
        assert_eq!(log.timestamp_text(), "2024-01-15 00:00:00");
    }
}
