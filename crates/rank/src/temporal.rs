//! Exponential temporal decay.

use chrono::{DateTime, Utc};

/// Score applied to a record with no usable capture time.
pub const NEUTRAL_TEMPORAL_SCORE: f64 = 0.5;

/// Default half-life in days: a month-old session scores ~0.37 of a fresh
/// one.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 30.0;

/// Temporal decay score in [0, 1]: `exp(-age_days / half_life_days)`.
///
/// A missing capture time scores the neutral 0.5 so undated records are
/// neither buried nor boosted. Clock skew that puts a record in the
/// future clamps to 1.0.
pub fn temporal_score(
    captured_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let Some(captured) = captured_at else {
        return NEUTRAL_TEMPORAL_SCORE;
    };
    if half_life_days <= 0.0 {
        return NEUTRAL_TEMPORAL_SCORE;
    }

    let age_days = (now - captured).num_seconds() as f64 / 86_400.0;
    (-age_days / half_life_days).exp().clamp(0.0, 1.0)
}
