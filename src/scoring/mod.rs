// src/scoring/mod.rs
//! Heuristic score composition.
//!
//! heuristic = clamp(engagement · source_weight · decay + sentiment_adjustment, 0, 100)
//!
//! All stage functions are pure; "now" is always passed in by the caller.

pub mod decay;
pub mod engagement;

use crate::config::{EngineConfig, SentimentConfig};

pub use decay::{age_hours, decay_factor};
pub use engagement::{engagement_component, weighted_engagement};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Per-item stage outputs feeding the heuristic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreInputs {
    /// 0..=100
    pub engagement: f64,
    /// 0..=2
    pub source_weight: f64,
    /// (0, 1]
    pub decay_factor: f64,
    /// -1..=1
    pub sentiment: f64,
}

impl ScoreInputs {
    /// Safe constructor with clamping.
    pub fn new(engagement: f64, source_weight: f64, decay_factor: f64, sentiment: f64) -> Self {
        fn finite_or(x: f64, d: f64) -> f64 {
            if x.is_finite() {
                x
            } else {
                d
            }
        }
        Self {
            engagement: finite_or(engagement, 0.0).clamp(SCORE_MIN, SCORE_MAX),
            source_weight: finite_or(source_weight, 1.0).clamp(0.0, 2.0),
            decay_factor: finite_or(decay_factor, 1.0).clamp(f64::MIN_POSITIVE, 1.0),
            sentiment: finite_or(sentiment, 0.0).clamp(-1.0, 1.0),
        }
    }
}

/// Bonus above the upper threshold, penalty below the lower one, zero in between.
pub fn sentiment_adjustment(sentiment: f64, cfg: &SentimentConfig) -> f64 {
    if sentiment > cfg.upper_threshold {
        cfg.positive_bonus * sentiment.min(1.0)
    } else if sentiment < cfg.lower_threshold {
        cfg.negative_penalty * sentiment.max(-1.0)
    } else {
        0.0
    }
}

/// Heuristic baseline before model refinements and acceleration.
pub fn heuristic_score(inputs: &ScoreInputs, cfg: &EngineConfig) -> f64 {
    let base = inputs.engagement * inputs.source_weight * inputs.decay_factor;
    clamp_score(base + sentiment_adjustment(inputs.sentiment, &cfg.sentiment))
}

/// Clamp into [0, 100]; non-finite values collapse to 0.
pub fn clamp_score(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(SCORE_MIN, SCORE_MAX)
    } else {
        SCORE_MIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_band_leaves_score_unchanged() {
        let cfg = EngineConfig::default();
        let a = heuristic_score(&ScoreInputs::new(40.0, 1.0, 0.5, 0.0), &cfg);
        let b = heuristic_score(&ScoreInputs::new(40.0, 1.0, 0.5, 0.3), &cfg);
        assert_eq!(a, 20.0);
        assert_eq!(a, b);
    }

    #[test]
    fn sentiment_bonus_and_penalty_are_bounded() {
        let cfg = EngineConfig::default();
        let base = heuristic_score(&ScoreInputs::new(50.0, 1.0, 1.0, 0.0), &cfg);
        let pos = heuristic_score(&ScoreInputs::new(50.0, 1.0, 1.0, 0.9), &cfg);
        let neg = heuristic_score(&ScoreInputs::new(50.0, 1.0, 1.0, -0.9), &cfg);
        assert!(pos > base && pos - base <= cfg.sentiment.positive_bonus);
        assert!(neg < base && base - neg <= cfg.sentiment.negative_penalty);
    }

    #[test]
    fn composite_is_clamped() {
        let cfg = EngineConfig::default();
        assert_eq!(
            heuristic_score(&ScoreInputs::new(100.0, 2.0, 1.0, 1.0), &cfg),
            SCORE_MAX
        );
        assert_eq!(
            heuristic_score(&ScoreInputs::new(0.0, 1.0, 1.0, -1.0), &cfg),
            SCORE_MIN
        );
    }

    #[test]
    fn inputs_reject_non_finite() {
        let i = ScoreInputs::new(f64::NAN, f64::INFINITY, f64::NAN, f64::NAN);
        assert_eq!(i.engagement, 0.0);
        assert_eq!(i.source_weight, 1.0);
        assert_eq!(i.decay_factor, 1.0);
        assert_eq!(i.sentiment, 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }
}
