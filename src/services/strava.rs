// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for OAuth and activity fetching.
//!
//! Handles:
//! - Authorization-code exchange and token refresh
//! - Paginated activity listing
//! - Rate limit backoff (429, honoring Retry-After)
//! - 401-triggered token refresh-and-retry

use crate::error::AppError;
use crate::models::{Activity, AthleteTokens};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request timeout for Strava API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Activities per page; Strava's maximum.
const PER_PAGE: u32 = 200;
/// Pause between pages. Strava allows 100 requests per 15 min; each request
/// fetches 200 activities so a small pause is plenty.
const PAGE_THROTTLE: Duration = Duration::from_millis(200);
/// Backoff to use when a 429 response carries no Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 15;
/// Give up after this many rate-limit retries on a single page.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Remote activity provider, the seam between the sync orchestrator and the
/// Strava API. The provider owns pagination, throttling, and token refresh;
/// `tokens()` exposes the (possibly rotated) credentials for persistence
/// after a round-trip.
#[async_trait]
pub trait ActivityProvider: Send {
    /// Fetch all activities starting after the given instant.
    async fn fetch_activities(
        &mut self,
        after: DateTime<Utc>,
    ) -> Result<Vec<StravaActivityData>, AppError>;

    /// Current credentials, which may have been rotated during a fetch.
    fn tokens(&self) -> &AthleteTokens;
}

/// Strava API client (stateless; tokens are passed per call).
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: "https://www.strava.com/api/v3".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Exchange an authorization code for tokens (OAuth callback).
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {e}")))?;

        Self::check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {e}")))?;

        Self::check_response_json(response).await
    }

    /// Fetch a single page of activities.
    async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivityData>, FetchError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Other(AppError::StravaApi(e.to_string())))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(FetchError::RateLimited { retry_after_secs });
        }
        if status.as_u16() == 401 {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Other(AppError::StravaApi(format!(
                "HTTP {status}: {body}"
            ))));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Other(AppError::StravaApi(format!("JSON parse error: {e}"))))
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(
                    AppError::STRAVA_TOKEN_ERROR.to_string(),
                ));
            }
            return Err(AppError::StravaApi(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {e}")))
    }
}

/// Page-level failure, internal to the session retry loop.
enum FetchError {
    RateLimited { retry_after_secs: u64 },
    Unauthorized,
    Other(AppError),
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaSession - a client bound to one athlete's tokens
// ─────────────────────────────────────────────────────────────────────────────

/// A Strava client holding one athlete's credentials.
///
/// Refreshes the access token proactively when it is about to expire, and
/// reactively (once) when Strava answers 401 anyway. Rotated tokens stay in
/// the session; the orchestrator persists them after the round-trip.
pub struct StravaSession {
    client: StravaClient,
    tokens: AthleteTokens,
}

impl StravaSession {
    pub fn new(client: StravaClient, tokens: AthleteTokens) -> Self {
        Self { client, tokens }
    }

    /// Refresh the access token, rotating the stored refresh token.
    async fn refresh(&mut self) -> Result<(), AppError> {
        let refreshed = self.client.refresh_token(&self.tokens.refresh_token).await?;
        self.tokens = AthleteTokens {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at: refreshed.expires_at,
        };
        tracing::info!("Strava access token refreshed");
        Ok(())
    }

    /// Refresh up front if the access token is expired or about to expire.
    async fn ensure_valid_token(&mut self) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        if now + TOKEN_REFRESH_MARGIN_SECS >= self.tokens.expires_at {
            tracing::info!("Access token expired or expiring, refreshing");
            self.refresh().await?;
        }
        Ok(())
    }

    /// Fetch one page, absorbing rate limits and a single 401 refresh.
    async fn fetch_page(
        &mut self,
        after: i64,
        page: u32,
    ) -> Result<Vec<StravaActivityData>, AppError> {
        let mut refreshed = false;
        let mut rate_limit_retries = 0;

        loop {
            let attempt = self
                .client
                .list_activities(&self.tokens.access_token, after, page, PER_PAGE)
                .await;

            match attempt {
                Ok(batch) => return Ok(batch),
                Err(FetchError::Unauthorized) if !refreshed => {
                    tracing::info!("Strava returned 401, refreshing token and retrying");
                    refreshed = true;
                    self.refresh().await?;
                }
                Err(FetchError::Unauthorized) => {
                    return Err(AppError::StravaApi(
                        AppError::STRAVA_TOKEN_ERROR.to_string(),
                    ));
                }
                Err(FetchError::RateLimited { retry_after_secs })
                    if rate_limit_retries < MAX_RATE_LIMIT_RETRIES =>
                {
                    rate_limit_retries += 1;
                    tracing::warn!(
                        retry_after_secs,
                        attempt = rate_limit_retries,
                        "Strava rate limit hit (429), backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                }
                Err(FetchError::RateLimited { .. }) => {
                    return Err(AppError::StravaApi(
                        AppError::STRAVA_RATE_LIMIT.to_string(),
                    ));
                }
                Err(FetchError::Other(e)) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ActivityProvider for StravaSession {
    async fn fetch_activities(
        &mut self,
        after: DateTime<Utc>,
    ) -> Result<Vec<StravaActivityData>, AppError> {
        self.ensure_valid_token().await?;

        let after_ts = after.timestamp();
        let mut all = Vec::new();
        let mut page = 1u32;

        loop {
            let batch = self.fetch_page(after_ts, page).await?;
            if batch.is_empty() {
                break;
            }
            tracing::debug!(page, count = batch.len(), "Fetched activity page");
            all.extend(batch);
            page += 1;
            tokio::time::sleep(PAGE_THROTTLE).await;
        }

        Ok(all)
    }

    fn tokens(&self) -> &AthleteTokens {
        &self.tokens
    }
}

// ─── Wire Types ──────────────────────────────────────────────────

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaAthlete {
    pub id: i64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

/// Summary activity from the list endpoint.
///
/// Promoted fields become columns; everything else Strava sends rides along
/// in `extra` and ends up in the stored `raw_data` payload (including
/// `start_latlng`/`end_latlng`, which the geofence classifier reads back).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaActivityData {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Legacy type tag ("Run"); `sport_type` supersedes it
    #[serde(default, rename = "type")]
    pub activity_type: String,
    #[serde(default)]
    pub sport_type: Option<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: i64,
    #[serde(default)]
    pub elapsed_time: i64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub max_speed: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StravaActivityData {
    /// Sport tag, preferring the newer `sport_type` field.
    pub fn sport(&self) -> &str {
        self.sport_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.activity_type)
    }

    /// Map the wire record to a storable activity row, preserving the full
    /// original record as the opaque payload.
    pub fn to_activity(&self, athlete_id: i64) -> Result<Activity, AppError> {
        let raw_data = serde_json::to_string(self)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Activity serialization: {e}")))?;

        Ok(Activity {
            activity_id: self.id,
            athlete_id,
            name: self.name.clone(),
            sport_type: self.sport().to_string(),
            start_date: self.start_date.clone(),
            distance: self.distance,
            moving_time: self.moving_time,
            elapsed_time: self.elapsed_time,
            total_elevation_gain: self.total_elevation_gain,
            average_speed: self.average_speed,
            max_speed: self.max_speed,
            raw_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> StravaActivityData {
        serde_json::from_value(json!({
            "id": 101,
            "name": "Morning Run",
            "type": "Run",
            "sport_type": "Run",
            "start_date": "2025-10-10T06:30:00Z",
            "distance": 5012.3,
            "moving_time": 1500,
            "elapsed_time": 1550,
            "total_elevation_gain": 42.0,
            "average_speed": 3.34,
            "max_speed": 4.8,
            "start_latlng": [50.0971, 14.4622],
            "end_latlng": [50.0973, 14.4625],
            "kudos_count": 3
        }))
        .expect("valid record")
    }

    #[test]
    fn test_unpromoted_fields_survive_in_raw_data() {
        let record = sample_record();
        let activity = record.to_activity(42).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&activity.raw_data).unwrap();
        assert_eq!(raw["start_latlng"], json!([50.0971, 14.4622]));
        assert_eq!(raw["kudos_count"], json!(3));
        assert_eq!(raw["id"], json!(101));
    }

    #[test]
    fn test_to_activity_promotes_columns() {
        let activity = sample_record().to_activity(42).unwrap();
        assert_eq!(activity.activity_id, 101);
        assert_eq!(activity.athlete_id, 42);
        assert_eq!(activity.sport_type, "Run");
        assert_eq!(activity.start_date, "2025-10-10T06:30:00Z");
        assert_eq!(activity.distance, 5012.3);
    }

    #[test]
    fn test_sport_falls_back_to_legacy_type() {
        let record: StravaActivityData = serde_json::from_value(json!({
            "id": 7,
            "type": "Run"
        }))
        .expect("valid record");
        assert_eq!(record.sport(), "Run");
    }

    #[test]
    fn test_record_without_gps_deserializes() {
        let record: StravaActivityData = serde_json::from_value(json!({
            "id": 8,
            "name": "Treadmill",
            "sport_type": "Run",
            "start_latlng": [],
            "end_latlng": []
        }))
        .expect("valid record");
        let activity = record.to_activity(1).unwrap();
        let raw = activity.raw_json().unwrap();
        assert_eq!(raw["start_latlng"], json!([]));
    }
}
