// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Athlete summary aggregates for the dashboard.

use serde::Serialize;

/// Totals over the activities matching the location filter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AthleteStats {
    pub total_activities: i64,
    /// Total distance in meters
    pub total_distance: f64,
    /// Total moving time in seconds
    pub total_moving_time: i64,
}

/// Per-athlete dashboard summary: filtered totals plus sync status.
#[derive(Debug, Clone, Serialize)]
pub struct AthleteSummary {
    pub athlete_id: i64,
    pub stats: AthleteStats,
    /// Last successful sync (RFC3339), None before the first sync
    pub last_sync: Option<String>,
    /// Whether a sync would run if triggered now
    pub needs_sync: bool,
    /// Hours since the last sync, None before the first sync
    pub sync_age_hours: Option<f64>,
}
