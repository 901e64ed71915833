// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity model for storage and API.

use crate::models::filter::FilterInfo;
use serde::{Deserialize, Serialize};

/// Stored activity row.
///
/// `activity_id` is the provider-assigned ID and the de-duplication key:
/// inserting an ID that already exists is a no-op. Rows are immutable once
/// stored and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    /// Strava activity ID (primary key, globally unique across athletes)
    pub activity_id: i64,
    /// Owning Strava athlete ID
    pub athlete_id: i64,
    /// Activity name/title
    pub name: String,
    /// Sport type (Run, Ride, Hike, etc.)
    pub sport_type: String,
    /// Start date/time (ISO 8601, provider's convention)
    pub start_date: String,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: i64,
    /// Elapsed time in seconds
    pub elapsed_time: i64,
    /// Total elevation gain in meters
    pub total_elevation_gain: f64,
    /// Average speed in m/s
    pub average_speed: f64,
    /// Max speed in m/s
    pub max_speed: f64,
    /// Full original Strava record as JSON (holds fields not promoted to
    /// columns, e.g. start/end GPS coordinates)
    pub raw_data: String,
}

impl Activity {
    /// Parse the opaque payload back into JSON. Returns None for rows whose
    /// payload is missing or corrupt rather than failing the whole listing.
    pub fn raw_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.raw_data).ok()
    }
}

/// Activity annotated with geofence match status for display and export.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedActivity {
    pub activity_id: i64,
    pub athlete_id: i64,
    pub name: String,
    pub sport_type: String,
    pub start_date: String,
    pub distance: f64,
    pub moving_time: i64,
    /// Start coordinate as [lat, lon], if the activity has GPS data
    pub start_latlng: Option<[f64; 2]>,
    /// End coordinate as [lat, lon]
    pub end_latlng: Option<[f64; 2]>,
    pub athlete_count: Option<i64>,
    pub photo_count: Option<i64>,
    pub kudos_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub pr_count: Option<i64>,
    /// Whether both endpoints fall within the resolved geofence
    pub matches_location_filter: bool,
    /// Audit detail for the verdict; None when the activity has no usable
    /// coordinates (indoor/trainer sessions)
    pub filter_info: Option<FilterInfo>,
}

/// Extract a [lat, lon] pair from a raw Strava coordinate value.
///
/// Strava sends `start_latlng`/`end_latlng` as two-element arrays; anything
/// else (missing, empty, wrong arity, non-numeric) yields None.
pub fn extract_latlng(value: Option<&serde_json::Value>) -> Option<[f64; 2]> {
    let arr = value?.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    Some([arr[0].as_f64()?, arr[1].as_f64()?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_latlng_valid() {
        let v = json!([50.09, 14.46]);
        assert_eq!(extract_latlng(Some(&v)), Some([50.09, 14.46]));
    }

    #[test]
    fn test_extract_latlng_empty_array() {
        // Strava sends [] for activities without GPS
        let v = json!([]);
        assert_eq!(extract_latlng(Some(&v)), None);
    }

    #[test]
    fn test_extract_latlng_wrong_arity() {
        let v = json!([50.09]);
        assert_eq!(extract_latlng(Some(&v)), None);
        let v = json!([50.09, 14.46, 300.0]);
        assert_eq!(extract_latlng(Some(&v)), None);
    }

    #[test]
    fn test_extract_latlng_missing_or_null() {
        assert_eq!(extract_latlng(None), None);
        let v = json!(null);
        assert_eq!(extract_latlng(Some(&v)), None);
    }
}
