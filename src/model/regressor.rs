// src/model/regressor.rs
//! Linear regressor estimating an overall 0–100 score from a small feature vector.
//!
//! Artifact (JSON):
//! ```json
//! { "intercept": 5.0, "log_counts": true,
//!   "coefficients": { "likes": 2.1, "reposts": 3.4, "replies": 1.0, "views": 0.2,
//!                     "text_length": 0.01, "ticker_count": 1.5, "sentiment": 4.0 } }
//! ```
//! Unknown feature names are rejected at load time.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use super::{InferenceError, ModelInput};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureCoefficients {
    pub likes: f64,
    pub reposts: f64,
    pub replies: f64,
    pub views: f64,
    pub text_length: f64,
    pub ticker_count: f64,
    pub sentiment: f64,
}

impl FeatureCoefficients {
    fn as_array(&self) -> [f64; 7] {
        [
            self.likes,
            self.reposts,
            self.replies,
            self.views,
            self.text_length,
            self.ticker_count,
            self.sentiment,
        ]
    }
}

/// Raw model features of one item.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureVector {
    pub likes: f64,
    pub reposts: f64,
    pub replies: f64,
    pub views: f64,
    pub text_length: f64,
    pub ticker_count: f64,
    pub sentiment: f64,
}

impl FeatureVector {
    pub fn from_input(input: &ModelInput<'_>) -> Self {
        let e = &input.item.engagement;
        Self {
            likes: e.likes as f64,
            reposts: e.reposts as f64,
            replies: e.replies as f64,
            views: e.views as f64,
            text_length: input.item.text.chars().count() as f64,
            ticker_count: input.tickers.len() as f64,
            sentiment: input.sentiment,
        }
    }

    fn as_array(&self, log_counts: bool) -> [f64; 7] {
        let c = |x: f64| if log_counts { x.max(0.0).ln_1p() } else { x };
        [
            c(self.likes),
            c(self.reposts),
            c(self.replies),
            c(self.views),
            self.text_length,
            self.ticker_count,
            self.sentiment,
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearRegressor {
    pub intercept: f64,
    #[serde(default)]
    pub coefficients: FeatureCoefficients,
    /// Use ln(1+count) for the four engagement counters.
    #[serde(default)]
    pub log_counts: bool,
}

impl LinearRegressor {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading regressor {}", path.display()))?;
        let r: LinearRegressor = serde_json::from_str(&raw)
            .with_context(|| format!("parsing regressor {}", path.display()))?;
        if !r.intercept.is_finite() || r.coefficients.as_array().iter().any(|c| !c.is_finite()) {
            bail!("regressor parameters must be finite");
        }
        Ok(r)
    }

    /// Estimated score, clamped to [0, 100].
    pub fn predict(&self, x: &FeatureVector) -> Result<f64, InferenceError> {
        let y = self.intercept
            + self
                .coefficients
                .as_array()
                .iter()
                .zip(x.as_array(self.log_counts))
                .map(|(c, v)| c * v)
                .sum::<f64>();
        if y.is_finite() {
            Ok(y.clamp(0.0, 100.0))
        } else {
            Err(InferenceError::NonFinite)
        }
    }
}
