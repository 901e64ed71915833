// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{AnnotatedActivity, AthleteSummary, Discount};
use crate::services::SyncResult;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default and maximum page sizes for activity listings.
const DEFAULT_ACTIVITY_LIMIT: i64 = 100;
const MAX_ACTIVITY_LIMIT: i64 = 500;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/summary", get(get_summary))
        .route("/api/activities", get(get_activities))
        .route("/api/activities.csv", get(download_activities_csv))
        .route("/api/sync", post(trigger_sync))
        .route("/api/discount", get(get_discount))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct UserResponse {
    pub athlete_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: String,
    pub total_activities: i64,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let athlete = state.db.get_athlete(user.athlete_id).await?.ok_or_else(|| {
        crate::error::AppError::NotFound(format!("Athlete {} not found", user.athlete_id))
    })?;

    Ok(Json(UserResponse {
        athlete_id: athlete.athlete_id,
        first_name: athlete.first_name,
        last_name: athlete.last_name,
        created_at: athlete.created_at,
        total_activities: athlete.total_activities,
    }))
}

// ─── Summary ─────────────────────────────────────────────────

/// Dashboard summary: totals over matching activities plus sync status.
async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AthleteSummary>> {
    let stats = state.filter_service.athlete_stats(user.athlete_id).await?;
    let last_sync = state.db.get_athlete_last_sync(user.athlete_id).await?;
    let needs_sync = state.sync_service.should_sync(user.athlete_id).await?;

    let now = Utc::now();
    let sync_age_hours = last_sync
        .map(|last| now.signed_duration_since(last).num_seconds() as f64 / 3600.0);

    Ok(Json(AthleteSummary {
        athlete_id: user.athlete_id,
        stats,
        last_sync: last_sync.map(crate::time_utils::format_utc_rfc3339),
        needs_sync,
        sync_age_hours,
    }))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Filter by sport type (e.g. "Run")
    sport_type: Option<String>,
    /// Maximum number of activities to return
    limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<AnnotatedActivity>,
    pub count: usize,
}

/// Get the user's activities, newest first, annotated with their geofence
/// verdicts.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);

    tracing::debug!(
        athlete_id = user.athlete_id,
        sport_type = ?params.sport_type,
        limit,
        "Fetching activities"
    );

    let activities = state
        .filter_service
        .annotated_activities(user.athlete_id, params.sport_type.as_deref(), Some(limit))
        .await?;

    Ok(Json(ActivitiesResponse {
        count: activities.len(),
        activities,
    }))
}

// ─── CSV Export ──────────────────────────────────────────────

const CSV_HEADER: &str = "activity_id,name,sport_type,start_date,distance,moving_time,\
     elapsed_time,total_elevation_gain,average_speed,max_speed\n";

/// Export the user's stored activities as CSV.
async fn download_activities_csv(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let activities = state.db.get_activities(user.athlete_id, None, None).await?;

    let mut body = String::from(CSV_HEADER);
    for a in &activities {
        body.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            a.activity_id,
            csv_field(&a.name),
            csv_field(&a.sport_type),
            csv_field(&a.start_date),
            a.distance,
            a.moving_time,
            a.elapsed_time,
            a.total_elevation_gain,
            a.average_speed,
            a.max_speed,
        ));
    }

    let disposition = format!(
        "attachment; filename=\"activities_{}.csv\"",
        user.athlete_id
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Quote a CSV field if it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ─── Manual Sync ─────────────────────────────────────────────

/// Manually trigger a sync for the logged-in athlete using stored tokens.
///
/// The result is always 200 with the outcome inside; sync failures are
/// values, not HTTP errors.
async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<SyncResult> {
    let result = state
        .sync_service
        .sync_with_stored_tokens(user.athlete_id)
        .await;
    Json(result)
}

// ─── Discount Eligibility ────────────────────────────────────

#[derive(Serialize)]
pub struct DiscountResponse {
    pub eligible: bool,
    /// Matching activities within the lookback window
    pub matching_activities: i64,
    pub threshold: i64,
    pub window_days: i64,
    /// Discount codes; empty until the threshold is met
    pub discounts: Vec<Discount>,
}

/// Discount eligibility: enough matching activities within the configured
/// lookback window unlock the club's discount codes.
async fn get_discount(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DiscountResponse>> {
    let window_days = state.db.activity_filter_days().await?;
    let threshold = state.db.discount_threshold().await?;

    let cutoff = Utc::now() - Duration::days(window_days);
    let matching = state
        .filter_service
        .matching_count_since(user.athlete_id, cutoff)
        .await?;

    let eligible = matching >= threshold;
    let discounts = if eligible {
        state.db.get_all_discounts().await?
    } else {
        vec![]
    };

    Ok(Json(DiscountResponse {
        eligible,
        matching_activities: matching,
        threshold,
        window_days,
        discounts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_plain() {
        assert_eq!(csv_field("Morning Run"), "Morning Run");
    }

    #[test]
    fn test_csv_field_with_comma() {
        assert_eq!(csv_field("Run, easy"), "\"Run, easy\"");
    }

    #[test]
    fn test_csv_field_with_quotes() {
        assert_eq!(csv_field("the \"long\" one"), "\"the \"\"long\"\" one\"");
    }

    #[test]
    fn test_csv_field_with_newline() {
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
    }
}
