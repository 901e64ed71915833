// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: athletes overview, settings, date filters, discounts.
//!
//! All handlers are gated on the athlete-id whitelist from config; the auth
//! middleware has already established who is calling.

use crate::error::{AppError, Result};
use crate::middleware::auth::{ensure_admin, AuthUser};
use crate::models::{Athlete, DateLocationFilter, Discount, LocationSettings};
use crate::time_utils::parse_timestamp;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/athletes", get(list_athletes))
        .route("/api/admin/settings", get(get_settings).put(update_settings))
        .route(
            "/api/admin/date-filters",
            get(list_date_filters).post(add_date_filter),
        )
        .route(
            "/api/admin/date-filters/{date}",
            delete(delete_date_filter),
        )
        .route(
            "/api/admin/discounts",
            get(list_discounts).post(add_discount),
        )
        .route("/api/admin/discounts/{id}", delete(delete_discount))
}

// ─── Athletes Overview ───────────────────────────────────────

/// Athlete row plus a coarse sync-status tag for the admin dashboard.
#[derive(Serialize)]
pub struct AthleteOverview {
    #[serde(flatten)]
    pub athlete: Athlete,
    pub sync_status: String,
}

/// Tag how stale an athlete's data is.
fn sync_status(last_sync: Option<&str>) -> &'static str {
    let Some(raw) = last_sync else {
        return "never";
    };
    let Some(sync_time) = parse_timestamp(raw) else {
        return "unknown";
    };

    let hours_ago = Utc::now().signed_duration_since(sync_time).num_hours();
    if hours_ago < 24 {
        "recent"
    } else if hours_ago < 168 {
        // one week
        "old"
    } else {
        "very_old"
    }
}

/// All athletes with sync status, most recently synced first.
async fn list_athletes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AthleteOverview>>> {
    ensure_admin(&state.config, user.athlete_id)?;

    let athletes = state.db.get_all_athletes().await?;
    let overview = athletes
        .into_iter()
        .map(|athlete| {
            let status = sync_status(athlete.last_sync.as_deref()).to_string();
            AthleteOverview {
                athlete,
                sync_status: status,
            }
        })
        .collect();

    Ok(Json(overview))
}

// ─── Settings ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SettingsResponse {
    pub location: LocationSettings,
    pub activity_filter_days: i64,
    pub discount_threshold_activities: i64,
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SettingsResponse>> {
    ensure_admin(&state.config, user.athlete_id)?;
    settings_response(&state).await.map(Json)
}

#[derive(Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.1, max = 50.0))]
    pub radius_km: f64,
    #[validate(range(min = 1, max = 365))]
    pub activity_filter_days: i64,
    #[validate(range(min = 1, max = 100))]
    pub discount_threshold_activities: i64,
}

/// Update the default geofence and tunables.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>> {
    ensure_admin(&state.config, user.athlete_id)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .db
        .update_location_settings(payload.latitude, payload.longitude, Some(payload.radius_km))
        .await?;
    state
        .db
        .update_activity_filter_days(payload.activity_filter_days)
        .await?;
    state
        .db
        .update_discount_threshold(payload.discount_threshold_activities)
        .await?;

    tracing::info!(
        admin = user.athlete_id,
        latitude = payload.latitude,
        longitude = payload.longitude,
        radius_km = payload.radius_km,
        "Settings updated"
    );

    settings_response(&state).await.map(Json)
}

async fn settings_response(state: &Arc<AppState>) -> Result<SettingsResponse> {
    Ok(SettingsResponse {
        location: state.db.location_settings().await?,
        activity_filter_days: state.db.activity_filter_days().await?,
        discount_threshold_activities: state.db.discount_threshold().await?,
    })
}

// ─── Date Location Filters ───────────────────────────────────

async fn list_date_filters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<DateLocationFilter>>> {
    ensure_admin(&state.config, user.athlete_id)?;
    Ok(Json(state.db.get_all_date_filters().await?))
}

fn default_radius_km() -> f64 {
    1.0
}

#[derive(Deserialize, Validate)]
pub struct AddDateFilterRequest {
    pub filter_date: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    #[validate(range(min = 0.1, max = 50.0))]
    pub radius_km: f64,
    pub description: Option<String>,
}

/// Add or replace the geofence override for a date.
async fn add_date_filter(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddDateFilterRequest>,
) -> Result<Json<DateLocationFilter>> {
    ensure_admin(&state.config, user.athlete_id)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Overrides are keyed by calendar date; reject anything else up front
    if NaiveDate::parse_from_str(&payload.filter_date, "%Y-%m-%d").is_err() {
        return Err(AppError::BadRequest(
            "filter_date must be formatted YYYY-MM-DD".to_string(),
        ));
    }

    state
        .db
        .upsert_date_filter(
            &payload.filter_date,
            payload.latitude,
            payload.longitude,
            payload.radius_km,
            payload.description.as_deref(),
        )
        .await?;

    tracing::info!(
        admin = user.athlete_id,
        filter_date = %payload.filter_date,
        "Date filter stored"
    );

    let stored = state
        .db
        .get_date_filter(&payload.filter_date)
        .await?
        .ok_or_else(|| {
            AppError::Database("Date filter missing immediately after upsert".to_string())
        })?;
    Ok(Json(stored))
}

async fn delete_date_filter(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(date): Path<String>,
) -> Result<Json<serde_json::Value>> {
    ensure_admin(&state.config, user.athlete_id)?;
    state.db.delete_date_filter(&date).await?;
    Ok(Json(serde_json::json!({ "deleted": date })))
}

// ─── Discounts ───────────────────────────────────────────────

async fn list_discounts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Discount>>> {
    ensure_admin(&state.config, user.athlete_id)?;
    Ok(Json(state.db.get_all_discounts().await?))
}

#[derive(Deserialize, Validate)]
pub struct AddDiscountRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub code: String,
}

async fn add_discount(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddDiscountRequest>,
) -> Result<Json<Vec<Discount>>> {
    ensure_admin(&state.config, user.athlete_id)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .db
        .add_discount(&payload.title, payload.description.as_deref(), &payload.code)
        .await?;

    Ok(Json(state.db.get_all_discounts().await?))
}

async fn delete_discount(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    ensure_admin(&state.config, user.athlete_id)?;
    state.db.delete_discount(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_tags() {
        assert_eq!(sync_status(None), "never");
        assert_eq!(sync_status(Some("garbage")), "unknown");

        let recent = crate::time_utils::format_utc_rfc3339(Utc::now() - chrono::Duration::hours(2));
        assert_eq!(sync_status(Some(&recent)), "recent");

        let old = crate::time_utils::format_utc_rfc3339(Utc::now() - chrono::Duration::hours(48));
        assert_eq!(sync_status(Some(&old)), "old");

        let very_old =
            crate::time_utils::format_utc_rfc3339(Utc::now() - chrono::Duration::days(30));
        assert_eq!(sync_status(Some(&very_old)), "very_old");
    }
}
