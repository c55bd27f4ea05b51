// src/scoring/engagement.rs
//! Engagement normalizer: raw counters → bounded, log-scaled 0–100 component.

use crate::config::EngagementConfig;
use crate::item::Engagement;

/// Weighted sum of interaction counters.
pub fn weighted_engagement(e: &Engagement, cfg: &EngagementConfig) -> f64 {
    e.likes as f64 * cfg.like_weight
        + e.reposts as f64 * cfg.repost_weight
        + e.replies as f64 * cfg.reply_weight
        + e.views as f64 * cfg.view_weight
}

/// `100 · ln(1+x) / ln(1+saturation)` where `x` is the weighted sum, or the
/// per-audience ratio when a follower count is known.
pub fn engagement_component(
    e: &Engagement,
    follower_count: Option<u64>,
    cfg: &EngagementConfig,
) -> f64 {
    let weighted = weighted_engagement(e, cfg);
    let x = match follower_count {
        Some(f) if f > 0 => weighted / f as f64 * cfg.audience_scale,
        _ => weighted,
    };
    if !x.is_finite() || x <= 0.0 {
        return 0.0;
    }
    let denom = cfg.saturation.ln_1p().max(f64::EPSILON);
    (100.0 * x.ln_1p() / denom).clamp(0.0, 100.0)
}
