// src/scoring/decay.rs
//! Recency decay: `max(floor, exp(-age_hours / half_life_hours))`.

use chrono::{DateTime, Utc};

use crate::config::DecayConfig;

/// Hours between publication and `now`; future timestamps count as fresh.
pub fn age_hours(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - published_at).num_milliseconds() as f64 / 1000.0;
    (secs / 3600.0).max(0.0)
}

/// Decay factor in `(0, 1]`.
pub fn decay_factor(age_hours: f64, cfg: &DecayConfig) -> f64 {
    if !age_hours.is_finite() {
        return cfg.floor;
    }
    let raw = (-age_hours.max(0.0) / cfg.half_life_hours).exp();
    raw.clamp(cfg.floor, 1.0)
}
