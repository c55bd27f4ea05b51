// src/dedup/similarity.rs
//! Pluggable similarity over canonical text, in [0.0, 1.0].

use std::collections::HashSet;

use crate::config::{DedupConfig, SimilarityKind};
use crate::text::tokens;

pub trait SimilarityStrategy: Send + Sync {
    /// Similarity of two canonical texts. Empty input is never similar.
    fn similarity(&self, a: &str, b: &str) -> f64;
    fn name(&self) -> &'static str;
}

/// 1.0 for identical canonical text, else 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl SimilarityStrategy for ExactMatch {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if !a.is_empty() && a == b {
            1.0
        } else {
            0.0
        }
    }
    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Jaccard index of word shingles (k consecutive tokens).
///
/// Tolerant to added words (hashtags, "RT", short commentary) since one extra
/// token only adds a few shingles to the union.
#[derive(Debug, Clone, Copy)]
pub struct ShingleJaccard {
    pub shingle_size: usize,
}

impl Default for ShingleJaccard {
    fn default() -> Self {
        Self { shingle_size: 1 }
    }
}

impl ShingleJaccard {
    fn shingles<'a>(&self, text: &'a str) -> HashSet<Vec<&'a str>> {
        let toks = tokens(text);
        let k = self.shingle_size.max(1);
        if toks.is_empty() {
            return HashSet::new();
        }
        if toks.len() <= k {
            return HashSet::from([toks]);
        }
        toks.windows(k).map(|w| w.to_vec()).collect()
    }
}

impl SimilarityStrategy for ShingleJaccard {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let sa = self.shingles(a);
        let sb = self.shingles(b);
        if sa.is_empty() || sb.is_empty() {
            return 0.0;
        }
        let inter = sa.intersection(&sb).count();
        let union = sa.len() + sb.len() - inter;
        inter as f64 / union as f64
    }
    fn name(&self) -> &'static str {
        "jaccard"
    }
}

/// Character-level normalized Levenshtein similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl SimilarityStrategy for NormalizedLevenshtein {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        strsim::normalized_levenshtein(a, b)
    }
    fn name(&self) -> &'static str {
        "levenshtein"
    }
}

pub fn strategy_from_config(cfg: &DedupConfig) -> Box<dyn SimilarityStrategy> {
    match cfg.strategy {
        SimilarityKind::Exact => Box::new(ExactMatch),
        SimilarityKind::Jaccard => Box::new(ShingleJaccard {
            shingle_size: cfg.shingle_size,
        }),
        SimilarityKind::Levenshtein => Box::new(NormalizedLevenshtein),
    }
}
