// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end API tests through the full router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{bearer, gps_activity, test_app, test_app_with};
use runclub_tracker::config::Config;
use tower::ServiceExt; // for oneshot

/// ~20 m from the seeded default geofence center (Prague).
const NEAR_PRAGUE: [f64; 2] = [50.0976, 14.4623];
const LONDON: [f64; 2] = [51.507222, -0.1275];

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn as_json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).expect("response should be JSON")
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _state, _dir) = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_auth() {
    let (app, _state, _dir) = test_app().await;
    let (status, _) = send(&app, "GET", "/api/summary", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/summary", Some("Bearer garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_end_to_end() {
    let (app, state, _dir) = test_app().await;
    let auth = bearer(111, &state.config);

    state.db.upsert_athlete(111, Some("Jo"), None).await.unwrap();

    // One run at the club, one in London
    let at_club = gps_activity(
        1,
        111,
        "2025-10-10T08:00:00Z",
        "Run",
        Some(NEAR_PRAGUE),
        Some(NEAR_PRAGUE),
    );
    state.db.save_activities(111, &[at_club]).await.unwrap();

    let (status, body) = send(&app, "GET", "/api/summary", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let summary = as_json(&body);
    assert_eq!(summary["stats"]["total_activities"], 1);
    assert_eq!(summary["needs_sync"], false);

    let in_london = gps_activity(
        2,
        111,
        "2025-10-11T08:00:00Z",
        "Run",
        Some(LONDON),
        Some(LONDON),
    );
    state.db.save_activities(111, &[in_london]).await.unwrap();

    let (status, body) = send(&app, "GET", "/api/activities", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let response = as_json(&body);
    assert_eq!(response["count"], 2);

    let activities = response["activities"].as_array().unwrap();
    // Newest first
    assert_eq!(activities[0]["activity_id"], 2);
    assert_eq!(activities[0]["matches_location_filter"], false);
    let start_distance = activities[0]["filter_info"]["start_distance_km"]
        .as_f64()
        .unwrap();
    assert!(start_distance > 1000.0, "London is far from the club");

    assert_eq!(activities[1]["activity_id"], 1);
    assert_eq!(activities[1]["matches_location_filter"], true);

    // The London run does not change the matching totals
    let (_, body) = send(&app, "GET", "/api/summary", Some(&auth), None).await;
    assert_eq!(as_json(&body)["stats"]["total_activities"], 1);
}

#[tokio::test]
async fn test_activities_sport_type_filter() {
    let (app, state, _dir) = test_app().await;
    let auth = bearer(5, &state.config);
    state.db.upsert_athlete(5, None, None).await.unwrap();

    let run = gps_activity(10, 5, "2025-10-10T08:00:00Z", "Run", None, None);
    let ride = gps_activity(11, 5, "2025-10-11T08:00:00Z", "Ride", None, None);
    state.db.save_activities(5, &[run, ride]).await.unwrap();

    let (status, body) = send(
        &app,
        "GET",
        "/api/activities?sport_type=Run",
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let response = as_json(&body);
    assert_eq!(response["count"], 1);
    assert_eq!(response["activities"][0]["sport_type"], "Run");
}

#[tokio::test]
async fn test_csv_export() {
    let (app, state, _dir) = test_app().await;
    let auth = bearer(7, &state.config);
    state.db.upsert_athlete(7, None, None).await.unwrap();
    let activity = gps_activity(20, 7, "2025-10-10T08:00:00Z", "Run", None, None);
    state.db.save_activities(7, &[activity]).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/activities.csv")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("activities_7.csv"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("activity_id,name,sport_type"));
    assert!(lines.next().unwrap().starts_with("20,Activity 20,Run"));
}

#[tokio::test]
async fn test_sync_endpoint_reports_missing_tokens() {
    let (app, state, _dir) = test_app().await;
    let auth = bearer(9, &state.config);
    state.db.upsert_athlete(9, None, None).await.unwrap();

    let (status, body) = send(&app, "POST", "/api/sync", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK, "sync failures are values, not 5xx");
    let result = as_json(&body);
    assert_eq!(result["synced"], false);
    assert_eq!(result["error"], "No stored tokens found for athlete");
}

// ─── Admin ───────────────────────────────────────────────────

fn admin_config() -> Config {
    Config {
        admin_athlete_ids: vec![42],
        ..Config::default()
    }
}

#[tokio::test]
async fn test_admin_forbidden_for_non_admin() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let auth = bearer(1, &state.config); // not on the whitelist

    let (status, _) = send(&app, "GET", "/api/admin/settings", Some(&auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_settings_round_trip() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let auth = bearer(42, &state.config);

    let (status, body) = send(&app, "GET", "/api/admin/settings", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let settings = as_json(&body);
    assert_eq!(settings["location"]["filter_radius_km"], 1.0);
    assert_eq!(settings["activity_filter_days"], 90);
    assert_eq!(settings["discount_threshold_activities"], 5);

    let update = serde_json::json!({
        "latitude": 49.2,
        "longitude": 16.6,
        "radius_km": 2.0,
        "activity_filter_days": 30,
        "discount_threshold_activities": 3
    });
    let (status, body) = send(&app, "PUT", "/api/admin/settings", Some(&auth), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    let updated = as_json(&body);
    assert_eq!(updated["location"]["target_latitude"], 49.2);
    assert_eq!(updated["location"]["filter_radius_km"], 2.0);
    assert_eq!(updated["activity_filter_days"], 30);
}

#[tokio::test]
async fn test_admin_settings_validation() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let auth = bearer(42, &state.config);

    let update = serde_json::json!({
        "latitude": 200.0,
        "longitude": 16.6,
        "radius_km": 2.0,
        "activity_filter_days": 30,
        "discount_threshold_activities": 3
    });
    let (status, _) = send(&app, "PUT", "/api/admin/settings", Some(&auth), Some(update)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_date_filter_crud() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let auth = bearer(42, &state.config);

    let add = serde_json::json!({
        "filter_date": "2025-10-10",
        "latitude": 48.8584,
        "longitude": 2.2945,
        "radius_km": 2.5,
        "description": "Paris meetup"
    });
    let (status, body) = send(&app, "POST", "/api/admin/date-filters", Some(&auth), Some(add)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["filter_date"], "2025-10-10");

    let (status, body) = send(&app, "GET", "/api/admin/date-filters", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body).as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "DELETE",
        "/api/admin/date-filters/2025-10-10",
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/admin/date-filters", Some(&auth), None).await;
    assert!(as_json(&body).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_date_filter_rejects_bad_date() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let auth = bearer(42, &state.config);

    let add = serde_json::json!({
        "filter_date": "10/10/2025",
        "latitude": 48.8584,
        "longitude": 2.2945
    });
    let (status, _) = send(&app, "POST", "/api/admin/date-filters", Some(&auth), Some(add)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_athletes_overview() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let auth = bearer(42, &state.config);

    state.db.upsert_athlete(1, Some("Jo"), Some("Novak")).await.unwrap();
    state.db.upsert_athlete(2, None, None).await.unwrap();
    let activity = gps_activity(50, 1, "2025-10-10T08:00:00Z", "Run", None, None);
    state.db.save_activities(1, &[activity]).await.unwrap();

    let (status, body) = send(&app, "GET", "/api/admin/athletes", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let athletes = as_json(&body);
    let athletes = athletes.as_array().unwrap();
    assert_eq!(athletes.len(), 2);

    // Athlete 1 synced just now, athlete 2 never
    let synced = athletes
        .iter()
        .find(|a| a["athlete_id"] == 1)
        .unwrap();
    assert_eq!(synced["sync_status"], "recent");
    assert_eq!(synced["total_activities"], 1);

    let never = athletes
        .iter()
        .find(|a| a["athlete_id"] == 2)
        .unwrap();
    assert_eq!(never["sync_status"], "never");
}

// ─── Discounts ───────────────────────────────────────────────

#[tokio::test]
async fn test_discount_eligibility_threshold() {
    let (app, state, _dir) = test_app_with(admin_config()).await;
    let admin = bearer(42, &state.config);
    let auth = bearer(8, &state.config);

    state.db.upsert_athlete(8, None, None).await.unwrap();
    state
        .db
        .add_discount("10% off shoes", None, "CLUB10")
        .await
        .unwrap();
    // Lower the bar so two runs suffice
    state.db.update_discount_threshold(2).await.unwrap();

    // Not eligible with no activities
    let (status, body) = send(&app, "GET", "/api/discount", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let response = as_json(&body);
    assert_eq!(response["eligible"], false);
    assert!(response["discounts"].as_array().unwrap().is_empty());

    // Two recent matching runs at the club
    let today = runclub_tracker::time_utils::format_utc_rfc3339(chrono::Utc::now());
    let yesterday = runclub_tracker::time_utils::format_utc_rfc3339(
        chrono::Utc::now() - chrono::Duration::days(1),
    );
    let run1 = gps_activity(30, 8, &today, "Run", Some(NEAR_PRAGUE), Some(NEAR_PRAGUE));
    let run2 = gps_activity(31, 8, &yesterday, "Run", Some(NEAR_PRAGUE), Some(NEAR_PRAGUE));
    state.db.save_activities(8, &[run1, run2]).await.unwrap();

    let (_, body) = send(&app, "GET", "/api/discount", Some(&auth), None).await;
    let response = as_json(&body);
    assert_eq!(response["eligible"], true);
    assert_eq!(response["matching_activities"], 2);
    assert_eq!(response["discounts"][0]["code"], "CLUB10");

    // Admin can see and manage the discount list
    let (status, body) = send(&app, "GET", "/api/admin/discounts", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body).as_array().unwrap().len(), 1);
}
