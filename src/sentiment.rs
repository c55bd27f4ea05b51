// src/sentiment.rs
//! Lexicon-based sentiment with negation handling.
//!
//! Token valences (-4..=4) are summed, with the sign inverted when a negator
//! appears in the previous 1..=3 tokens, then squashed into a compound score
//! `s / sqrt(s² + ALPHA)` in (-1, 1).

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::{collections::HashMap, fs, path::Path, sync::Arc};

use crate::config::SentimentConfig;

/// Normalization constant of the compound squash.
const ALPHA: f64 = 15.0;

static EMBEDDED_LEXICON: Lazy<Option<Arc<HashMap<String, i32>>>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    match serde_json::from_str::<HashMap<String, i32>>(raw) {
        Ok(map) => Some(Arc::new(map)),
        Err(e) => {
            tracing::error!(target: "sentiment", error = %e, "embedded lexicon is invalid");
            None
        }
    }
});

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SentimentError {
    #[error("sentiment lexicon unavailable")]
    LexiconUnavailable,
    #[error("sentiment produced a non-finite value")]
    NonFinite,
}

#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: Option<Arc<HashMap<String, i32>>>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    /// Analyzer backed by the embedded lexicon.
    pub fn new() -> Self {
        Self {
            lexicon: EMBEDDED_LEXICON.clone(),
        }
    }

    pub fn with_lexicon(lexicon: HashMap<String, i32>) -> Self {
        let lexicon = lexicon
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self {
            lexicon: Some(Arc::new(lexicon)),
        }
    }

    pub fn from_lexicon_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading lexicon {}", path.display()))?;
        let map: HashMap<String, i32> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing lexicon {}", path.display()))?;
        Ok(Self::with_lexicon(map))
    }

    /// External lexicon if configured and loadable, embedded one otherwise.
    pub fn from_config(cfg: &SentimentConfig) -> Self {
        match cfg.lexicon_path.as_deref() {
            Some(path) => Self::from_lexicon_file(path).unwrap_or_else(|e| {
                tracing::warn!(
                    target: "sentiment",
                    error = %format!("{e:#}"),
                    "external lexicon not loaded, using embedded lexicon"
                );
                Self::new()
            }),
            None => Self::new(),
        }
    }

    #[inline]
    fn word_score(lexicon: &HashMap<String, i32>, w: &str) -> i32 {
        *lexicon.get(w).unwrap_or(&0)
    }

    /// Returns (raw valence sum, token count).
    pub fn score_text(&self, text: &str) -> Result<(i32, usize), SentimentError> {
        let lexicon = self
            .lexicon
            .as_deref()
            .ok_or(SentimentError::LexiconUnavailable)?;
        // Collected because negation looks backwards.
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = Self::word_score(lexicon, tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score = score.saturating_add(if negated { -base } else { base });
        }

        Ok((score, tokens.len()))
    }

    /// Compound score in [-1, 1], or why it could not be computed.
    pub fn try_compound(&self, text: &str) -> Result<f64, SentimentError> {
        let (sum, _) = self.score_text(text)?;
        let s = sum as f64;
        let compound = s / (s * s + ALPHA).sqrt();
        if compound.is_finite() {
            Ok(compound.clamp(-1.0, 1.0))
        } else {
            Err(SentimentError::NonFinite)
        }
    }

    /// Compound score; any failure is neutral (0.0).
    pub fn compound(&self, text: &str) -> f64 {
        self.try_compound(text).unwrap_or_else(|e| {
            tracing::warn!(target: "sentiment", error = %e, "sentiment degraded to neutral");
            0.0
        })
    }
}

/// Word tokens (alphanumerics and apostrophes, lowercased) plus standalone
/// pictographs so emoji can carry valence.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in s.chars() {
        if ch.is_alphanumeric() || ch == '\'' {
            cur.extend(ch.to_lowercase());
            continue;
        }
        if !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
        if !ch.is_whitespace() && !ch.is_ascii() && !is_joiner(ch) {
            out.push(ch.to_string());
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out.into_iter()
        .map(|t| t.trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
}

/// Zero-width joiners and variation selectors glue emoji sequences together.
fn is_joiner(ch: char) -> bool {
    matches!(ch, '\u{200d}' | '\u{fe0e}' | '\u{fe0f}')
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
    )
}
