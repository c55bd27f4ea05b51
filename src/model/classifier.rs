// src/model/classifier.rs
//! Bag-of-words logistic classifier over canonical text tokens.
//!
//! Artifact (JSON):
//! ```json
//! { "version": "2024-06", "intercept": -1.2, "bigrams": false,
//!   "weights": { "airdrop": 0.8, "sol": 0.4, "breaking news": 0.6 } }
//! ```
//! Features are binary token presence; `P = sigmoid(intercept + Σ weight[token])`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{collections::BTreeSet, collections::HashMap, fs, path::Path};

use super::InferenceError;
use crate::text::{canonicalize, tokens};

#[derive(Debug, Clone, Deserialize)]
pub struct TextClassifier {
    #[serde(default)]
    pub version: Option<String>,
    pub intercept: f64,
    pub weights: HashMap<String, f64>,
    /// Also look up adjacent token pairs ("a b").
    #[serde(default)]
    pub bigrams: bool,
}

impl TextClassifier {
    /// Unvalidated constructor for programmatic use.
    pub fn new(intercept: f64, weights: HashMap<String, f64>) -> Self {
        Self {
            version: None,
            intercept,
            weights,
            bigrams: false,
        }
    }

    /// Read and validate an artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading classifier {}", path.display()))?;
        let mut c: TextClassifier = serde_json::from_str(&raw)
            .with_context(|| format!("parsing classifier {}", path.display()))?;
        if !c.intercept.is_finite() {
            bail!("classifier intercept is not finite");
        }
        if let Some((k, _)) = c.weights.iter().find(|(_, w)| !w.is_finite()) {
            bail!("classifier weight for {k:?} is not finite");
        }
        // Terms are matched against canonical text.
        c.weights = c
            .weights
            .into_iter()
            .map(|(k, v)| (canonicalize(&k), v))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Ok(c)
    }

    pub fn term_count(&self) -> usize {
        self.weights.len()
    }

    /// Probability in [0, 1] that the text is viral-grade content.
    pub fn predict_proba(&self, text: &str) -> Result<f64, InferenceError> {
        let canonical = canonicalize(text);
        let toks = tokens(&canonical);

        let mut terms: BTreeSet<String> = toks.iter().map(|t| t.to_string()).collect();
        if self.bigrams {
            for pair in toks.windows(2) {
                terms.insert(format!("{} {}", pair[0], pair[1]));
            }
        }

        let mut z = self.intercept;
        for t in &terms {
            if let Some(w) = self.weights.get(t) {
                z += w;
            }
        }
        if z.is_nan() {
            return Err(InferenceError::NonFinite);
        }
        let p = sigmoid(z);
        if p.is_finite() {
            Ok(p.clamp(0.0, 1.0))
        } else {
            Err(InferenceError::NonFinite)
        }
    }
}

/// Numerically stable logistic function.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
