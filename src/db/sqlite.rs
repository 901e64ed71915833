// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Athletes (profile + sync bookkeeping)
//! - Tokens (OAuth tokens, rotated in place)
//! - Activities (synced Strava activities, insert-or-ignore on activity id)
//! - Settings (default geofence + tunables, key/value)
//! - Date location filters (per-date geofence overrides)
//! - Discounts (club rewards)

use crate::error::AppError;
use crate::models::{Activity, Athlete, AthleteTokens, DateLocationFilter, Discount, LocationSettings};
use crate::time_utils::{format_utc_rfc3339, parse_timestamp};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Default geofence center (club location) seeded at migration.
const DEFAULT_TARGET_LATITUDE: &str = "50.097416";
const DEFAULT_TARGET_LONGITUDE: &str = "14.462274";
const DEFAULT_FILTER_RADIUS_KM: &str = "1.0";
/// Days of activity history counted toward stats and discount eligibility.
const DEFAULT_ACTIVITY_FILTER_DAYS: &str = "90";
/// Matching activities required before discount codes unlock.
const DEFAULT_DISCOUNT_THRESHOLD: &str = "5";

const ACTIVITY_COLUMNS: &str = "activity_id, athlete_id, name, sport_type, start_date, \
     distance, moving_time, elapsed_time, total_elevation_gain, \
     average_speed, max_speed, raw_data";

/// SQLite database client.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_string()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!(url = database_url, "Connected to SQLite");
        Ok(db)
    }

    /// Create tables and seed default settings.
    async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS athletes (
                athlete_id INTEGER PRIMARY KEY,
                first_name TEXT,
                last_name TEXT,
                created_at TEXT NOT NULL,
                last_sync TEXT,
                total_activities INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                athlete_id INTEGER PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (athlete_id) REFERENCES athletes (athlete_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                activity_id INTEGER PRIMARY KEY,
                athlete_id INTEGER NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                sport_type TEXT NOT NULL DEFAULT '',
                start_date TEXT NOT NULL DEFAULT '',
                distance REAL NOT NULL DEFAULT 0,
                moving_time INTEGER NOT NULL DEFAULT 0,
                elapsed_time INTEGER NOT NULL DEFAULT 0,
                total_elevation_gain REAL NOT NULL DEFAULT 0,
                average_speed REAL NOT NULL DEFAULT 0,
                max_speed REAL NOT NULL DEFAULT 0,
                raw_data TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                FOREIGN KEY (athlete_id) REFERENCES athletes (athlete_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_athlete_activities \
             ON activities (athlete_id, start_date)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings (key, value, description) VALUES
                (?1, ?2, 'Default target location latitude for activity filtering'),
                (?3, ?4, 'Default target location longitude for activity filtering'),
                (?5, ?6, 'Default radius in kilometers for location filtering'),
                (?7, ?8, 'Number of days of activity history to include in statistics'),
                (?9, ?10, 'Minimum number of activities required to access discount features')
            "#,
        )
        .bind("target_latitude")
        .bind(DEFAULT_TARGET_LATITUDE)
        .bind("target_longitude")
        .bind(DEFAULT_TARGET_LONGITUDE)
        .bind("filter_radius_km")
        .bind(DEFAULT_FILTER_RADIUS_KM)
        .bind("activity_filter_days")
        .bind(DEFAULT_ACTIVITY_FILTER_DAYS)
        .bind("discount_threshold_activities")
        .bind(DEFAULT_DISCOUNT_THRESHOLD)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS date_location_filters (
                filter_date TEXT PRIMARY KEY,
                target_latitude REAL NOT NULL,
                target_longitude REAL NOT NULL,
                radius_km REAL NOT NULL DEFAULT 1.0,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS discounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                code TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ─── Athlete Operations ──────────────────────────────────────

    /// Create or update an athlete profile.
    ///
    /// Does NOT touch `last_sync`; only a completed sync advances it,
    /// otherwise a login would mark freshly-connected athletes as synced
    /// and starve the first sync.
    pub async fn upsert_athlete(
        &self,
        athlete_id: i64,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<(), AppError> {
        let now = format_utc_rfc3339(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO athletes (athlete_id, first_name, last_name, created_at, total_activities)
            VALUES (?1, ?2, ?3, ?4, 0)
            ON CONFLICT(athlete_id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name
            "#,
        )
        .bind(athlete_id)
        .bind(first_name)
        .bind(last_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an athlete by Strava ID.
    pub async fn get_athlete(&self, athlete_id: i64) -> Result<Option<Athlete>, AppError> {
        let athlete = sqlx::query_as::<_, Athlete>(
            "SELECT athlete_id, first_name, last_name, created_at, last_sync, total_activities \
             FROM athletes WHERE athlete_id = ?1",
        )
        .bind(athlete_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(athlete)
    }

    /// All athletes, most recently synced first (for the admin view).
    pub async fn get_all_athletes(&self) -> Result<Vec<Athlete>, AppError> {
        let athletes = sqlx::query_as::<_, Athlete>(
            "SELECT athlete_id, first_name, last_name, created_at, last_sync, total_activities \
             FROM athletes ORDER BY last_sync DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(athletes)
    }

    /// The athlete's last successful sync time, if any.
    pub async fn get_athlete_last_sync(
        &self,
        athlete_id: i64,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let raw = sqlx::query_scalar::<_, Option<String>>(
            "SELECT last_sync FROM athletes WHERE athlete_id = ?1",
        )
        .bind(athlete_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(raw.flatten().as_deref().and_then(parse_timestamp))
    }

    /// Overwrite an athlete's last-sync timestamp. Used by tests to pin
    /// sync freshness; production code only advances it via `save_activities`.
    pub async fn set_last_sync(&self, athlete_id: i64, last_sync: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE athletes SET last_sync = ?2 WHERE athlete_id = ?1")
            .bind(athlete_id)
            .bind(last_sync)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Save activities, skipping any whose ID is already stored.
    ///
    /// The conditional insert is a single atomic statement per row
    /// (`ON CONFLICT DO NOTHING`), so concurrent syncs for the same athlete
    /// cannot double-insert. Also stamps the athlete's `last_sync` and
    /// refreshes the cached `total_activities` count.
    ///
    /// Returns the number of newly inserted rows.
    pub async fn save_activities(
        &self,
        athlete_id: i64,
        activities: &[Activity],
    ) -> Result<u64, AppError> {
        let now = format_utc_rfc3339(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut saved: u64 = 0;

        for activity in activities {
            let result = sqlx::query(
                r#"
                INSERT INTO activities (
                    activity_id, athlete_id, name, sport_type, start_date,
                    distance, moving_time, elapsed_time, total_elevation_gain,
                    average_speed, max_speed, raw_data, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(activity_id) DO NOTHING
                "#,
            )
            .bind(activity.activity_id)
            .bind(athlete_id)
            .bind(&activity.name)
            .bind(&activity.sport_type)
            .bind(&activity.start_date)
            .bind(activity.distance)
            .bind(activity.moving_time)
            .bind(activity.elapsed_time)
            .bind(activity.total_elevation_gain)
            .bind(activity.average_speed)
            .bind(activity.max_speed)
            .bind(&activity.raw_data)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            saved += result.rows_affected();
        }

        sqlx::query(
            r#"
            UPDATE athletes
            SET total_activities = (SELECT COUNT(*) FROM activities WHERE athlete_id = ?1),
                last_sync = ?2
            WHERE athlete_id = ?1
            "#,
        )
        .bind(athlete_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    /// Start time of the athlete's most recent stored activity.
    pub async fn latest_activity_start(
        &self,
        athlete_id: i64,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let raw = sqlx::query_scalar::<_, String>(
            "SELECT start_date FROM activities WHERE athlete_id = ?1 \
             ORDER BY start_date DESC LIMIT 1",
        )
        .bind(athlete_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }

    /// Activities for an athlete, newest first, optionally filtered by
    /// sport type and bounded by a limit.
    pub async fn get_activities(
        &self,
        athlete_id: i64,
        sport_type: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Activity>, AppError> {
        let mut sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE athlete_id = ?");
        if sport_type.is_some() {
            sql.push_str(" AND sport_type = ?");
        }
        sql.push_str(" ORDER BY start_date DESC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, Activity>(&sql).bind(athlete_id);
        if let Some(sport) = sport_type {
            query = query.bind(sport);
        }
        if let Some(n) = limit {
            query = query.bind(n);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Total number of stored activities for an athlete.
    pub async fn count_activities(&self, athlete_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activities WHERE athlete_id = ?1",
        )
        .bind(athlete_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get stored OAuth tokens for an athlete.
    pub async fn get_tokens(&self, athlete_id: i64) -> Result<Option<AthleteTokens>, AppError> {
        let tokens = sqlx::query_as::<_, AthleteTokens>(
            "SELECT access_token, refresh_token, expires_at FROM tokens WHERE athlete_id = ?1",
        )
        .bind(athlete_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tokens)
    }

    /// Store OAuth tokens, replacing any previous row. Called after every
    /// successful remote round-trip so a refresh-token rotation is never lost.
    pub async fn set_tokens(
        &self,
        athlete_id: i64,
        tokens: &AthleteTokens,
    ) -> Result<(), AppError> {
        let now = format_utc_rfc3339(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO tokens (athlete_id, access_token, refresh_token, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(athlete_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(athlete_id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Settings Operations ─────────────────────────────────────

    /// Get a setting value by key.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Set a setting value by key.
    pub async fn set_setting(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        let now = format_utc_rfc3339(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, description, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                description = COALESCE(excluded.description, settings.description),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current default geofence settings.
    pub async fn location_settings(&self) -> Result<LocationSettings, AppError> {
        Ok(LocationSettings {
            target_latitude: self
                .setting_as_f64("target_latitude", DEFAULT_TARGET_LATITUDE)
                .await?,
            target_longitude: self
                .setting_as_f64("target_longitude", DEFAULT_TARGET_LONGITUDE)
                .await?,
            filter_radius_km: self
                .setting_as_f64("filter_radius_km", DEFAULT_FILTER_RADIUS_KM)
                .await?,
        })
    }

    /// Update the default geofence. Radius is optional so the center can be
    /// moved without re-stating it.
    pub async fn update_location_settings(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> Result<(), AppError> {
        self.set_setting("target_latitude", &latitude.to_string(), None)
            .await?;
        self.set_setting("target_longitude", &longitude.to_string(), None)
            .await?;
        if let Some(radius) = radius_km {
            self.set_setting("filter_radius_km", &radius.to_string(), None)
                .await?;
        }
        Ok(())
    }

    /// Days of activity history counted toward stats and discounts.
    pub async fn activity_filter_days(&self) -> Result<i64, AppError> {
        self.setting_as_i64("activity_filter_days", DEFAULT_ACTIVITY_FILTER_DAYS)
            .await
    }

    pub async fn update_activity_filter_days(&self, days: i64) -> Result<(), AppError> {
        self.set_setting("activity_filter_days", &days.to_string(), None)
            .await
    }

    /// Matching activities required before discount codes unlock.
    pub async fn discount_threshold(&self) -> Result<i64, AppError> {
        self.setting_as_i64(
            "discount_threshold_activities",
            DEFAULT_DISCOUNT_THRESHOLD,
        )
        .await
    }

    pub async fn update_discount_threshold(&self, threshold: i64) -> Result<(), AppError> {
        self.set_setting(
            "discount_threshold_activities",
            &threshold.to_string(),
            None,
        )
        .await
    }

    async fn setting_as_f64(&self, key: &str, default: &str) -> Result<f64, AppError> {
        let raw = self.get_setting(key).await?;
        raw.as_deref()
            .unwrap_or(default)
            .parse::<f64>()
            .map_err(|e| AppError::Database(format!("Corrupt setting {key}: {e}")))
    }

    async fn setting_as_i64(&self, key: &str, default: &str) -> Result<i64, AppError> {
        let raw = self.get_setting(key).await?;
        raw.as_deref()
            .unwrap_or(default)
            .parse::<i64>()
            .map_err(|e| AppError::Database(format!("Corrupt setting {key}: {e}")))
    }

    // ─── Date Location Filter Operations ─────────────────────────

    /// Add or replace the geofence override for a date (upsert on the
    /// unique date key, so at most one override exists per date).
    pub async fn upsert_date_filter(
        &self,
        filter_date: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        let now = format_utc_rfc3339(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO date_location_filters
                (filter_date, target_latitude, target_longitude, radius_km, description,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(filter_date) DO UPDATE SET
                target_latitude = excluded.target_latitude,
                target_longitude = excluded.target_longitude,
                radius_km = excluded.radius_km,
                description = excluded.description,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(filter_date)
        .bind(latitude)
        .bind(longitude)
        .bind(radius_km)
        .bind(description)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Geofence override for an exact calendar date, if one exists.
    pub async fn get_date_filter(
        &self,
        filter_date: &str,
    ) -> Result<Option<DateLocationFilter>, AppError> {
        let filter = sqlx::query_as::<_, DateLocationFilter>(
            "SELECT filter_date, target_latitude, target_longitude, radius_km, description, \
             created_at, updated_at \
             FROM date_location_filters WHERE filter_date = ?1",
        )
        .bind(filter_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(filter)
    }

    /// All date filters, newest date first.
    pub async fn get_all_date_filters(&self) -> Result<Vec<DateLocationFilter>, AppError> {
        let filters = sqlx::query_as::<_, DateLocationFilter>(
            "SELECT filter_date, target_latitude, target_longitude, radius_km, description, \
             created_at, updated_at \
             FROM date_location_filters ORDER BY filter_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(filters)
    }

    /// Delete the override for a date. Deleting a date with no override is
    /// a no-op.
    pub async fn delete_date_filter(&self, filter_date: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM date_location_filters WHERE filter_date = ?1")
            .bind(filter_date)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Discount Operations ─────────────────────────────────────

    /// All discounts, newest first.
    pub async fn get_all_discounts(&self) -> Result<Vec<Discount>, AppError> {
        let discounts = sqlx::query_as::<_, Discount>(
            "SELECT id, title, description, code, created_at FROM discounts ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(discounts)
    }

    pub async fn add_discount(
        &self,
        title: &str,
        description: Option<&str>,
        code: &str,
    ) -> Result<(), AppError> {
        let now = format_utc_rfc3339(Utc::now());
        sqlx::query(
            "INSERT INTO discounts (title, description, code, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(title)
        .bind(description)
        .bind(code)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_discount(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM discounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
