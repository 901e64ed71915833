// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runclub-Tracker: count your runs at the club spot
//!
//! This crate provides the backend API for syncing Strava activities into a
//! local store and classifying them against a geofenced club location.

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{LocationFilterService, SyncService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub sync_service: SyncService,
    pub filter_service: LocationFilterService,
}
