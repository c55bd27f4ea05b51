// src/model/mod.rs
//! Optional model refinements layered on top of the heuristic score.
//!
//! `ScoreModel` is the capability the engine calls once per item. The chain is
//! built once at startup by [`build_score_model`]:
//!
//! ```text
//! HeuristicOnly → ClassifierBlend (if classifier loaded) → RegressorBlend (if regressor loaded)
//! ```
//!
//! Missing or broken artifacts simply leave a link out of the chain. A failing
//! link at inference time passes its input through for that item only.

pub mod classifier;
pub mod regressor;

use std::sync::Arc;

use crate::config::ModelConfig;
use crate::item::ContentItem;
use crate::scoring::clamp_score;
use crate::telemetry::{record_degradation, Stage};

pub use classifier::TextClassifier;
pub use regressor::{FeatureVector, LinearRegressor};

/// Why a model could not produce a value for one item.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("model produced a non-finite value")]
    NonFinite,
}

/// What a model may look at for one item.
#[derive(Debug, Clone, Copy)]
pub struct ModelInput<'a> {
    pub item: &'a ContentItem,
    pub tickers: &'a [String],
    pub sentiment: f64,
}

pub trait ScoreModel: Send + Sync {
    /// Refine a heuristic score in [0, 100]; must return a value in [0, 100].
    fn refine(&self, input: &ModelInput<'_>, heuristic: f64) -> f64;
    /// Chain description for diagnostics, e.g. "heuristic+classifier".
    fn describe(&self) -> String;
}

/// Convenient alias used by callers.
pub type DynScoreModel = Arc<dyn ScoreModel>;

/// Pure heuristic: returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOnly;

impl ScoreModel for HeuristicOnly {
    fn refine(&self, _input: &ModelInput<'_>, heuristic: f64) -> f64 {
        clamp_score(heuristic)
    }
    fn describe(&self) -> String {
        "heuristic".to_string()
    }
}

/// Blends classifier probability (scaled to 0–100) with the inner score.
pub struct ClassifierBlend {
    inner: Box<dyn ScoreModel>,
    classifier: Arc<TextClassifier>,
    classifier_weight: f64,
    heuristic_weight: f64,
}

impl ClassifierBlend {
    pub fn new(
        inner: Box<dyn ScoreModel>,
        classifier: Arc<TextClassifier>,
        classifier_weight: f64,
        heuristic_weight: f64,
    ) -> Self {
        Self {
            inner,
            classifier,
            classifier_weight: classifier_weight.max(0.0),
            heuristic_weight: heuristic_weight.max(0.0),
        }
    }
}

impl ScoreModel for ClassifierBlend {
    fn refine(&self, input: &ModelInput<'_>, heuristic: f64) -> f64 {
        let base = self.inner.refine(input, heuristic);
        let denom = self.classifier_weight + self.heuristic_weight;
        if denom <= 0.0 {
            return base;
        }
        match self.classifier.predict_proba(&input.item.text) {
            Ok(p) => clamp_score(
                (self.classifier_weight * p * 100.0 + self.heuristic_weight * base) / denom,
            ),
            Err(e) => {
                record_degradation(&input.item.id, Stage::Classifier, &e);
                base
            }
        }
    }
    fn describe(&self) -> String {
        format!("{}+classifier", self.inner.describe())
    }
}

/// Moves the inner score towards the regressor estimate by `weight`.
pub struct RegressorBlend {
    inner: Box<dyn ScoreModel>,
    regressor: Arc<LinearRegressor>,
    weight: f64,
}

impl RegressorBlend {
    pub fn new(inner: Box<dyn ScoreModel>, regressor: Arc<LinearRegressor>, weight: f64) -> Self {
        Self {
            inner,
            regressor,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

impl ScoreModel for RegressorBlend {
    fn refine(&self, input: &ModelInput<'_>, heuristic: f64) -> f64 {
        let base = self.inner.refine(input, heuristic);
        let features = FeatureVector::from_input(input);
        match self.regressor.predict(&features) {
            Ok(r) => clamp_score((1.0 - self.weight) * base + self.weight * r),
            Err(e) => {
                record_degradation(&input.item.id, Stage::Regressor, &e);
                base
            }
        }
    }
    fn describe(&self) -> String {
        format!("{}+regressor", self.inner.describe())
    }
}

/// Factory: load configured artifacts and build the chain once.
///
/// * No paths configured → heuristic only.
/// * A path that fails to load is logged and skipped; startup continues.
pub fn build_score_model(cfg: &ModelConfig) -> DynScoreModel {
    let mut chain: Box<dyn ScoreModel> = Box::new(HeuristicOnly);

    if let Some(path) = cfg.classifier_path.as_deref() {
        match TextClassifier::load(path) {
            Ok(c) => {
                tracing::info!(target: "model", path = %path.display(), terms = c.term_count(), "classifier loaded");
                chain = Box::new(ClassifierBlend::new(
                    chain,
                    Arc::new(c),
                    cfg.classifier_weight,
                    cfg.heuristic_weight,
                ));
            }
            Err(e) => {
                tracing::warn!(target: "model", error = %format!("{e:#}"), "classifier unavailable, heuristic-only");
            }
        }
    }

    if let Some(path) = cfg.regressor_path.as_deref() {
        match LinearRegressor::load(path) {
            Ok(r) => {
                tracing::info!(target: "model", path = %path.display(), "regressor loaded");
                chain = Box::new(RegressorBlend::new(chain, Arc::new(r), cfg.regressor_weight));
            }
            Err(e) => {
                tracing::warn!(target: "model", error = %format!("{e:#}"), "regressor unavailable, skipping");
            }
        }
    }

    tracing::info!(target: "model", chain = %chain.describe(), "score model ready");
    Arc::from(chain)
}
