// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental activity sync.
//!
//! The planner decides whether a sync is due and from which point to resume
//! fetching; the orchestrator runs one linear sync attempt and reports the
//! outcome as a value. Sync failures never propagate as errors — a failed
//! sync must not break the login or dashboard that triggered it.

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::services::strava::{ActivityProvider, StravaClient, StravaSession};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Skip syncing if the last sync is younger than this. Throttles remote API
/// calls to at most once per hour per athlete no matter how often the user
/// triggers sync.
pub const SYNC_MAX_AGE_HOURS: i64 = 1;

/// Re-fetch window behind the latest stored activity. Strava may still be
/// processing very recent activities; the overlap catches late-arriving
/// records and the id de-dup drops the repeats.
pub const SYNC_OVERLAP_DAYS: i64 = 1;

/// How far back the first sync reaches. Bounds first-sync cost against the
/// paginated remote API.
pub const FIRST_SYNC_BACKFILL_DAYS: i64 = 180;

/// Whether a sync is due, given the athlete's last recorded sync.
pub fn sync_due(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_sync {
        None => true,
        Some(last) => now.signed_duration_since(last) > Duration::hours(SYNC_MAX_AGE_HOURS),
    }
}

/// The timestamp to resume fetching from.
pub fn window_start(
    latest_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match latest_activity {
        Some(latest) => latest - Duration::days(SYNC_OVERLAP_DAYS),
        None => now - Duration::days(FIRST_SYNC_BACKFILL_DAYS),
    }
}

/// Outcome of one sync attempt. Failures are carried in `error`, never
/// raised to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub athlete_id: i64,
    pub synced: bool,
    pub new_activities: u64,
    pub total_activities: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: Option<String>,
}

impl SyncResult {
    fn failure(athlete_id: i64, error: String) -> Self {
        Self {
            athlete_id,
            synced: false,
            new_activities: 0,
            total_activities: 0,
            message: None,
            error: Some(error),
        }
    }
}

/// Coordinates token load, remote fetch, deduplicated persistence, and
/// result reporting for one athlete at a time.
#[derive(Clone)]
pub struct SyncService {
    db: Database,
    strava_client_id: String,
    strava_client_secret: String,
}

impl SyncService {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            db,
            strava_client_id: config.strava_client_id.clone(),
            strava_client_secret: config.strava_client_secret.clone(),
        }
    }

    /// Whether a sync would run for this athlete if triggered now.
    pub async fn should_sync(&self, athlete_id: i64) -> Result<bool, AppError> {
        let last_sync = self.db.get_athlete_last_sync(athlete_id).await?;
        Ok(sync_due(last_sync, Utc::now()))
    }

    /// The timestamp a sync for this athlete would fetch from.
    pub async fn sync_window_start(&self, athlete_id: i64) -> Result<DateTime<Utc>, AppError> {
        let latest = self.db.latest_activity_start(athlete_id).await?;
        Ok(window_start(latest, Utc::now()))
    }

    /// Run one sync attempt for an athlete against the given provider.
    ///
    /// The dominant fast path is "data is fresh": the provider is not
    /// touched at all. Every failure is folded into the result.
    pub async fn sync_athlete(
        &self,
        athlete_id: i64,
        provider: &mut dyn ActivityProvider,
    ) -> SyncResult {
        match self.try_sync(athlete_id, provider).await {
            Ok(result) => result,
            Err(e) => {
                if e.is_strava_token_error() {
                    tracing::warn!(
                        athlete_id,
                        "Sync failed: stored tokens rejected, athlete must re-authenticate"
                    );
                } else {
                    tracing::warn!(athlete_id, error = %e, "Sync failed");
                }
                SyncResult::failure(athlete_id, e.to_string())
            }
        }
    }

    async fn try_sync(
        &self,
        athlete_id: i64,
        provider: &mut dyn ActivityProvider,
    ) -> Result<SyncResult, AppError> {
        if !self.should_sync(athlete_id).await? {
            let total = self.db.count_activities(athlete_id).await?;
            return Ok(SyncResult {
                athlete_id,
                synced: false,
                new_activities: 0,
                total_activities: total,
                message: Some("Sync not needed - data is fresh".to_string()),
                error: None,
            });
        }

        let sync_from = self.sync_window_start(athlete_id).await?;
        tracing::info!(athlete_id, sync_from = %sync_from, "Syncing activities");

        let fetched = provider.fetch_activities(sync_from).await?;

        // Persist tokens immediately after the round-trip: the provider may
        // have rotated the refresh token even when zero activities came
        // back, and a later persistence failure must not lose the rotation.
        self.db.set_tokens(athlete_id, provider.tokens()).await?;

        let rows = fetched
            .iter()
            .map(|record| record.to_activity(athlete_id))
            .collect::<Result<Vec<_>, _>>()?;

        let new_count = self.db.save_activities(athlete_id, &rows).await?;
        let total = self.db.count_activities(athlete_id).await?;

        tracing::info!(athlete_id, new_count, total, "Sync complete");

        Ok(SyncResult {
            athlete_id,
            synced: true,
            new_activities: new_count,
            total_activities: total,
            message: Some(format!("Successfully synced {new_count} new activities")),
            error: None,
        })
    }

    /// Sync using previously persisted tokens (manual trigger or scheduled
    /// job, no live OAuth session). Fails fast with a distinct error when
    /// the athlete has never authenticated.
    pub async fn sync_with_stored_tokens(&self, athlete_id: i64) -> SyncResult {
        let tokens = match self.db.get_tokens(athlete_id).await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                return SyncResult::failure(athlete_id, AppError::NO_STORED_TOKENS.to_string())
            }
            Err(e) => return SyncResult::failure(athlete_id, e.to_string()),
        };

        let client = StravaClient::new(
            self.strava_client_id.clone(),
            self.strava_client_secret.clone(),
        );
        let mut session = StravaSession::new(client, tokens);

        self.sync_athlete(athlete_id, &mut session).await
    }
}
