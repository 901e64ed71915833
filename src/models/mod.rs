// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod athlete;
pub mod discount;
pub mod filter;
pub mod stats;

pub use activity::{Activity, AnnotatedActivity};
pub use athlete::{Athlete, AthleteTokens};
pub use discount::Discount;
pub use filter::{DateLocationFilter, FilterInfo, FilterSource, LocationSettings, ResolvedFilter};
pub use stats::{AthleteStats, AthleteSummary};
