// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence resolution and activity classification.
//!
//! An activity "matches" when BOTH its start and end points fall within the
//! resolved geofence radius - the activity happened at the location, it did
//! not merely pass through. Which geofence applies is resolved per activity
//! date: a date-specific override wins over the default.

use crate::db::Database;
use crate::error::AppError;
use crate::geo::distance_km;
use crate::models::activity::extract_latlng;
use crate::models::{
    Activity, AnnotatedActivity, AthleteStats, FilterInfo, FilterSource, ResolvedFilter,
};
use chrono::{DateTime, Utc};

/// Classify one activity's endpoints against a resolved geofence.
///
/// Activities without a complete pair of coordinates (indoor/trainer
/// sessions) are never considered present at the location and carry no
/// filter info. With valid coordinates, `FilterInfo` is returned whether or
/// not the activity matches - it is audit detail for the user.
pub fn classify(
    start_latlng: Option<[f64; 2]>,
    end_latlng: Option<[f64; 2]>,
    filter: &ResolvedFilter,
) -> (bool, Option<FilterInfo>) {
    let (Some(start), Some(end)) = (start_latlng, end_latlng) else {
        return (false, None);
    };

    let start_distance = distance_km(
        start[0],
        start[1],
        filter.target_latitude,
        filter.target_longitude,
    );
    let end_distance = distance_km(
        end[0],
        end[1],
        filter.target_latitude,
        filter.target_longitude,
    );

    let matches = start_distance <= filter.radius_km && end_distance <= filter.radius_km;

    let info = FilterInfo {
        target_location: [filter.target_latitude, filter.target_longitude],
        radius_km: filter.radius_km,
        source: filter.source,
        filter_date: filter.filter_date.clone(),
        start_distance_km: round2(start_distance),
        end_distance_km: round2(end_distance),
    };

    (matches, Some(info))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Resolves geofences and annotates stored activities for display.
#[derive(Clone)]
pub struct LocationFilterService {
    db: Database,
}

impl LocationFilterService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve which geofence applies to an activity starting at the given
    /// timestamp: the override keyed to its calendar date if one exists,
    /// otherwise the default.
    pub async fn resolve_for_date(&self, start_date: &str) -> Result<ResolvedFilter, AppError> {
        // Calendar date is the first 10 chars of the ISO-8601 timestamp
        let activity_date = start_date.get(..10).unwrap_or(start_date);

        if let Some(override_filter) = self.db.get_date_filter(activity_date).await? {
            return Ok(ResolvedFilter {
                target_latitude: override_filter.target_latitude,
                target_longitude: override_filter.target_longitude,
                radius_km: override_filter.radius_km,
                source: FilterSource::DateSpecific,
                filter_date: Some(activity_date.to_string()),
            });
        }

        let defaults = self.db.location_settings().await?;
        Ok(ResolvedFilter {
            target_latitude: defaults.target_latitude,
            target_longitude: defaults.target_longitude,
            radius_km: defaults.filter_radius_km,
            source: FilterSource::Default,
            filter_date: None,
        })
    }

    /// Annotate one stored activity with its geofence verdict and the
    /// display fields promoted out of the raw payload.
    pub async fn annotate(&self, activity: &Activity) -> Result<AnnotatedActivity, AppError> {
        let raw = activity.raw_json();
        if raw.is_none() {
            tracing::warn!(
                activity_id = activity.activity_id,
                "Could not parse raw_data, annotating without GPS fields"
            );
        }

        let get = |key: &str| raw.as_ref().and_then(|v| v.get(key).cloned());
        let count = |key: &str| get(key).and_then(|v| v.as_i64());

        let start_latlng = extract_latlng(raw.as_ref().and_then(|v| v.get("start_latlng")));
        let end_latlng = extract_latlng(raw.as_ref().and_then(|v| v.get("end_latlng")));

        let mut annotated = AnnotatedActivity {
            activity_id: activity.activity_id,
            athlete_id: activity.athlete_id,
            name: activity.name.clone(),
            sport_type: activity.sport_type.clone(),
            start_date: activity.start_date.clone(),
            distance: activity.distance,
            moving_time: activity.moving_time,
            start_latlng,
            end_latlng,
            athlete_count: count("athlete_count"),
            photo_count: count("photo_count"),
            kudos_count: count("kudos_count"),
            comment_count: count("comment_count"),
            pr_count: count("pr_count"),
            matches_location_filter: false,
            filter_info: None,
        };

        // Skip the settings lookup entirely for coordinate-less activities
        if start_latlng.is_some() && end_latlng.is_some() {
            let filter = self.resolve_for_date(&activity.start_date).await?;
            let (matches, info) = classify(start_latlng, end_latlng, &filter);
            annotated.matches_location_filter = matches;
            annotated.filter_info = info;
        }

        Ok(annotated)
    }

    /// Stored activities for an athlete, newest first, annotated with their
    /// geofence verdicts.
    pub async fn annotated_activities(
        &self,
        athlete_id: i64,
        sport_type: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<AnnotatedActivity>, AppError> {
        let activities = self.db.get_activities(athlete_id, sport_type, limit).await?;

        let mut annotated = Vec::with_capacity(activities.len());
        for activity in &activities {
            annotated.push(self.annotate(activity).await?);
        }
        Ok(annotated)
    }

    /// Summary totals over the activities matching the location filter.
    pub async fn athlete_stats(&self, athlete_id: i64) -> Result<AthleteStats, AppError> {
        let annotated = self.annotated_activities(athlete_id, None, None).await?;

        let mut stats = AthleteStats::default();
        for activity in annotated
            .iter()
            .filter(|a| a.matches_location_filter)
        {
            stats.total_activities += 1;
            stats.total_distance += activity.distance;
            stats.total_moving_time += activity.moving_time;
        }
        Ok(stats)
    }

    /// Number of matching activities starting at or after the cutoff.
    /// Used for discount eligibility.
    pub async fn matching_count_since(
        &self,
        athlete_id: i64,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let annotated = self.annotated_activities(athlete_id, None, None).await?;

        let count = annotated
            .iter()
            .filter(|a| a.matches_location_filter)
            .filter(|a| {
                crate::time_utils::parse_timestamp(&a.start_date)
                    .is_some_and(|start| start >= cutoff)
            })
            .count();
        Ok(count as i64)
    }
}
