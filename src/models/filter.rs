// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence (location filter) models.
//!
//! A geofence is a (center, radius) pair. Exactly one default geofence
//! exists; date-specific overrides replace it for activities on that date.

use serde::{Deserialize, Serialize};

/// The default geofence plus its radius, read from the settings store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSettings {
    pub target_latitude: f64,
    pub target_longitude: f64,
    pub filter_radius_km: f64,
}

/// A date-specific geofence override. At most one exists per calendar date
/// (upsert on the unique date key).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DateLocationFilter {
    /// Calendar date this override applies to (`YYYY-MM-DD`)
    pub filter_date: String,
    pub target_latitude: f64,
    pub target_longitude: f64,
    pub radius_km: f64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Which geofence a resolution produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterSource {
    Default,
    DateSpecific,
}

/// The geofence that applies to one activity, after date resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFilter {
    pub target_latitude: f64,
    pub target_longitude: f64,
    pub radius_km: f64,
    pub source: FilterSource,
    /// Set only when a date-specific override was used
    pub filter_date: Option<String>,
}

/// Audit/debug detail attached to a classified activity. Shown to the end
/// user; not used in further logic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterInfo {
    /// Filter center as [lat, lon]
    pub target_location: [f64; 2],
    pub radius_km: f64,
    pub source: FilterSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_date: Option<String>,
    /// Distance from activity start to center, rounded to 2 decimal places
    pub start_distance_km: f64,
    /// Distance from activity end to center, rounded to 2 decimal places
    pub end_distance_km: f64,
}
