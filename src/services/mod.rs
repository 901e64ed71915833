// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod filter;
pub mod strava;
pub mod sync;

pub use filter::LocationFilterService;
pub use strava::{ActivityProvider, StravaClient, StravaSession};
pub use sync::{SyncResult, SyncService};
