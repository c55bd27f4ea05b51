// src/source_weights.rs
//! # Source Weights
//!
//! Maps a canonical source tag (e.g. "twitter", "reddit", "news") to a
//! multiplier on the engagement component, in the range `[0.0, 2.0]`.
//! Alternative spellings ("x", "tg", "rss") are resolved when items are
//! decoded, so lookups here only ever see canonical tags.
//!
//! - Case-insensitive lookup with normalization of punctuation and dashes,
//!   on both the configured keys and the queried tag.
//! - Fallback order: exact match → normalized match → default.
//!
//! Every source weighs 1.0 unless configured, so the baseline score is not
//! skewed by where an item came from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MAX_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceWeights {
    /// Weight when no entry matches.
    pub default_weight: f64,
    /// Explicit weights for canonical source tags.
    pub weights: HashMap<String, f64>,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            default_weight: 1.0,
            weights: HashMap::new(),
        }
    }
}

impl SourceWeights {
    /// Weight for a source tag.
    pub fn weight_for(&self, source: &str) -> f64 {
        if let Some(&w) = self.weights.get(source) {
            return clamp_weight(w);
        }

        let s = normalize(source);
        if let Some((_, &w)) = self.weights.iter().find(|(k, _)| normalize(k) == s) {
            return clamp_weight(w);
        }

        clamp_weight(self.default_weight)
    }
}

/// Lowercase, replace separators with spaces, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp_weight(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, MAX_WEIGHT)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SourceWeights {
        let mut c = SourceWeights::default();
        c.weights.insert("twitter".into(), 1.2);
        c.weights.insert("news".into(), 0.8);
        c
    }

    #[test]
    fn unconfigured_sources_are_neutral() {
        let c = SourceWeights::default();
        assert_eq!(c.weight_for("reddit"), 1.0);
        assert_eq!(c.weight_for("anything"), 1.0);
    }

    #[test]
    fn decoded_aliases_pick_up_canonical_weight() {
        use crate::item::ContentItem;

        let c = cfg();
        let it: ContentItem = serde_json::from_str(r#"{"id":"a","source":"rss"}"#).unwrap();
        assert!((c.weight_for(it.source.as_str()) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let mut c = cfg();
        c.weights.insert("Crypto_News".into(), 1.5);
        assert!((c.weight_for("  TWITTER ") - 1.2).abs() < 1e-9);
        assert!((c.weight_for("crypto news") - 1.5).abs() < 1e-9);
    }

    #[test]
    fn weights_are_clamped() {
        let mut c = cfg();
        c.weights.insert("telegram".into(), 9.0);
        c.weights.insert("crypto".into(), -1.0);
        assert_eq!(c.weight_for("telegram"), MAX_WEIGHT);
        assert_eq!(c.weight_for("crypto"), 0.0);
    }
}
