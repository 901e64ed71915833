//! Discount model for the club rewards feature.

use serde::{Deserialize, Serialize};

/// A discount code offered to athletes who log enough activities at the
/// club location within the configured lookback window.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Discount {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub code: String,
    pub created_at: String,
}
