// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use runclub_tracker::config::Config;
use runclub_tracker::db::Database;
use runclub_tracker::middleware::auth::create_jwt;
use runclub_tracker::models::Activity;
use runclub_tracker::routes::create_router;
use runclub_tracker::services::{LocationFilterService, SyncService};
use runclub_tracker::AppState;
use std::sync::Arc;
use tempfile::TempDir;

/// Open a fresh file-backed SQLite database in a temp dir.
///
/// Keep the TempDir alive for the duration of the test - dropping it
/// deletes the database file out from under the pool.
#[allow(dead_code)]
pub async fn test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("test.db");
    let url = format!("sqlite:{}", path.display());
    let db = Database::connect(&url).await.expect("Failed to open test db");
    (db, dir)
}

/// Create shared app state over a fresh test database.
#[allow(dead_code)]
pub async fn test_state_with(config: Config) -> (Arc<AppState>, TempDir) {
    let (db, dir) = test_db().await;
    let sync_service = SyncService::new(db.clone(), &config);
    let filter_service = LocationFilterService::new(db.clone());
    let state = Arc::new(AppState {
        config,
        db,
        sync_service,
        filter_service,
    });
    (state, dir)
}

/// Create a test app (router + state) with default test config.
#[allow(dead_code)]
pub async fn test_app() -> (axum::Router, Arc<AppState>, TempDir) {
    test_app_with(Config::default()).await
}

/// Create a test app with a custom config.
#[allow(dead_code)]
pub async fn test_app_with(config: Config) -> (axum::Router, Arc<AppState>, TempDir) {
    let (state, dir) = test_state_with(config).await;
    let router = create_router(state.clone());
    (router, state, dir)
}

/// Bearer header value for an athlete session.
#[allow(dead_code)]
pub fn bearer(athlete_id: i64, config: &Config) -> String {
    let jwt = create_jwt(athlete_id, &config.secret_key).expect("Failed to create JWT");
    format!("Bearer {jwt}")
}

/// Build a storable activity row whose raw payload carries GPS endpoints.
/// Pass None for an indoor/trainer activity (Strava sends empty arrays).
#[allow(dead_code)]
pub fn gps_activity(
    activity_id: i64,
    athlete_id: i64,
    start_date: &str,
    sport_type: &str,
    start_latlng: Option<[f64; 2]>,
    end_latlng: Option<[f64; 2]>,
) -> Activity {
    let to_json = |coords: Option<[f64; 2]>| match coords {
        Some(c) => serde_json::json!([c[0], c[1]]),
        None => serde_json::json!([]),
    };

    let raw = serde_json::json!({
        "id": activity_id,
        "name": format!("Activity {activity_id}"),
        "sport_type": sport_type,
        "start_date": start_date,
        "distance": 5000.0,
        "moving_time": 1500,
        "start_latlng": to_json(start_latlng),
        "end_latlng": to_json(end_latlng),
        "kudos_count": 2,
        "athlete_count": 1
    });

    Activity {
        activity_id,
        athlete_id,
        name: format!("Activity {activity_id}"),
        sport_type: sport_type.to_string(),
        start_date: start_date.to_string(),
        distance: 5000.0,
        moving_time: 1500,
        elapsed_time: 1550,
        total_elevation_gain: 40.0,
        average_speed: 3.3,
        max_speed: 4.9,
        raw_data: raw.to_string(),
    }
}
