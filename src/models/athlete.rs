//! Athlete model for storage and API.

use serde::{Deserialize, Serialize};

/// Athlete row, created on first successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Athlete {
    /// Strava athlete ID (primary key)
    pub athlete_id: i64,
    /// First name (may be absent if not shared)
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// When the athlete first connected (RFC3339)
    pub created_at: String,
    /// Last successful activity sync (RFC3339), None before the first sync
    pub last_sync: Option<String>,
    /// Cached count of stored activities, updated on every sync
    pub total_activities: i64,
}

/// An athlete's OAuth tokens.
///
/// Replaced whole-row whenever Strava rotates the refresh token; losing a
/// rotation would strand the athlete, so these are persisted after every
/// successful remote round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AthleteTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry as Unix epoch seconds
    pub expires_at: i64,
}
