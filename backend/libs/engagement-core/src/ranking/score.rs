//! Time-decayed popularity score
//!
//! score = favorites * 1 + comments * 2 + 1000 / (age_hours + 2)^1.2

use chrono::{DateTime, Utc};

use crate::model::VideoStats;

pub const FAVORITE_WEIGHT: f64 = 1.0;
pub const COMMENT_WEIGHT: f64 = 2.0;
pub const FRESHNESS_NUMERATOR: f64 = 1000.0;
pub const AGE_OFFSET_HOURS: f64 = 2.0;
pub const DECAY_EXPONENT: f64 = 1.2;

pub fn score(favorite_count: i64, comment_count: i64, age_hours: f64) -> f64 {
    let age = if age_hours > 0.0 { age_hours } else { 0.0 };
    favorite_count as f64 * FAVORITE_WEIGHT
        + comment_count as f64 * COMMENT_WEIGHT
        + FRESHNESS_NUMERATOR / (age + AGE_OFFSET_HOURS).powf(DECAY_EXPONENT)
}

/// Hours between creation and `now`, floored at zero for clock skew.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - created_at).num_milliseconds();
    (millis as f64 / 3_600_000.0).max(0.0)
}

pub fn score_at(stats: &VideoStats, now: DateTime<Utc>) -> f64 {
    score(
        stats.favorite_count,
        stats.comment_count,
        age_hours(stats.created_at, now),
    )
}
