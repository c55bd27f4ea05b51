// src/config.rs
//! # Engine Configuration
//!
//! Every tunable of the scoring pipeline lives here. Nothing is hardwired:
//! all sections deserialize with defaults, so a partial file only overrides
//! what it names.
//!
//! Lookup order for `load_default()`:
//! 1) `$VIRALITY_CONFIG_PATH` (must exist)
//! 2) `config/virality.toml`
//! 3) `config/virality.json`
//! 4) built-in defaults
//!
//! TOML shape (all keys optional):
//! ```toml
//! [engagement]
//! repost_weight = 3.0
//! [decay]
//! half_life_hours = 24.0
//! [acceleration]
//! sub_window_secs = 600
//! [dedup]
//! strategy = "jaccard"
//! threshold = 0.6
//! ```

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::source_weights::SourceWeights;

pub const ENV_CONFIG_PATH: &str = "VIRALITY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH_TOML: &str = "config/virality.toml";
pub const DEFAULT_CONFIG_PATH_JSON: &str = "config/virality.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engagement: EngagementConfig,
    pub decay: DecayConfig,
    pub sentiment: SentimentConfig,
    pub model: ModelConfig,
    pub acceleration: AccelerationConfig,
    pub dedup: DedupConfig,
    pub tickers: TickerConfig,
    pub source_weights: SourceWeights,
}

/// Sub-weights of the engagement sum and the log-scaling constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub like_weight: f64,
    /// Reposts carry the most evidence of spread.
    pub repost_weight: f64,
    pub reply_weight: f64,
    pub view_weight: f64,
    /// Multiplier applied to `weighted / followers` (per-thousand by default).
    pub audience_scale: f64,
    /// Weighted engagement that maps to a component of 100.
    pub saturation: f64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            like_weight: 1.0,
            repost_weight: 3.0,
            reply_weight: 1.5,
            view_weight: 0.0,
            audience_scale: 1000.0,
            saturation: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub half_life_hours: f64,
    /// Lower bound of the decay factor, must be in (0, 1].
    pub floor: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 24.0,
            floor: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub upper_threshold: f64,
    pub lower_threshold: f64,
    /// Max points added for compound sentiment of +1.0.
    pub positive_bonus: f64,
    /// Max points removed for compound sentiment of -1.0.
    pub negative_penalty: f64,
    /// Optional JSON lexicon (word -> integer valence) replacing the embedded one.
    pub lexicon_path: Option<PathBuf>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            upper_threshold: 0.5,
            lower_threshold: -0.5,
            positive_bonus: 5.0,
            negative_penalty: 5.0,
            lexicon_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub classifier_path: Option<PathBuf>,
    pub regressor_path: Option<PathBuf>,
    pub classifier_weight: f64,
    pub heuristic_weight: f64,
    /// Share of the regressor output in `(1 - w) * current + w * regression`.
    pub regressor_weight: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classifier_path: None,
            regressor_path: None,
            classifier_weight: 0.3,
            heuristic_weight: 0.7,
            regressor_weight: 0.2,
        }
    }
}

/// Longest accepted sub-window (one week).
pub const MAX_SUB_WINDOW_SECS: u64 = 7 * 24 * 3600;
/// Longest accepted mention retention (four weeks).
pub const MAX_RETENTION_SECS: u64 = 4 * MAX_SUB_WINDOW_SECS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationConfig {
    /// How long mentions are kept per ticker.
    pub retention_secs: u64,
    /// Length of the "recent" and "previous" sub-windows.
    pub sub_window_secs: u64,
    /// recent / max(previous, 1) at or above this marks a ticker buzzing.
    pub ratio_threshold: f64,
    pub min_recent_mentions: usize,
    pub base_boost: f64,
    pub max_boost: f64,
}

impl Default for AccelerationConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sub_window_secs: 600,
            ratio_threshold: 3.0,
            min_recent_mentions: 5,
            base_boost: 8.0,
            max_boost: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityKind {
    Exact,
    Jaccard,
    Levenshtein,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub strategy: SimilarityKind,
    /// Similarity in [0.0, 1.0] at or above which items share a cluster.
    pub threshold: f64,
    /// Word shingle length for the Jaccard strategy.
    pub shingle_size: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            strategy: SimilarityKind::Jaccard,
            threshold: 0.6,
            shingle_size: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    /// Uppercase symbols recognized without a leading `$`.
    pub known_symbols: Vec<String>,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            known_symbols: ["BTC", "ETH", "SOL", "XRP", "DOGE", "ADA", "BNB", "AVAX", "PEPE"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Replace nonsensical values with defaults so scoring invariants hold.
    pub fn sanitized(mut self) -> Self {
        let e = EngagementConfig::default();
        let eg = &mut self.engagement;
        non_negative(&mut eg.like_weight, e.like_weight);
        non_negative(&mut eg.repost_weight, e.repost_weight);
        non_negative(&mut eg.reply_weight, e.reply_weight);
        non_negative(&mut eg.view_weight, e.view_weight);
        positive(&mut eg.audience_scale, e.audience_scale);
        positive(&mut eg.saturation, e.saturation);

        let d = DecayConfig::default();
        positive(&mut self.decay.half_life_hours, d.half_life_hours);
        if !(self.decay.floor > 0.0 && self.decay.floor <= 1.0) {
            self.decay.floor = d.floor;
        }

        let s = &mut self.sentiment;
        s.upper_threshold = s.upper_threshold.clamp(-1.0, 1.0);
        s.lower_threshold = s.lower_threshold.clamp(-1.0, 1.0);
        if s.lower_threshold > s.upper_threshold {
            // swap to keep a valid neutral band
            std::mem::swap(&mut s.lower_threshold, &mut s.upper_threshold);
        }
        non_negative(&mut s.positive_bonus, 0.0);
        non_negative(&mut s.negative_penalty, 0.0);

        let m = ModelConfig::default();
        non_negative(&mut self.model.classifier_weight, m.classifier_weight);
        non_negative(&mut self.model.heuristic_weight, m.heuristic_weight);
        if self.model.classifier_weight + self.model.heuristic_weight <= 0.0 {
            self.model.classifier_weight = m.classifier_weight;
            self.model.heuristic_weight = m.heuristic_weight;
        }
        if !self.model.regressor_weight.is_finite() {
            self.model.regressor_weight = m.regressor_weight;
        }
        self.model.regressor_weight = self.model.regressor_weight.clamp(0.0, 1.0);

        let a = &mut self.acceleration;
        a.sub_window_secs = a.sub_window_secs.clamp(1, MAX_SUB_WINDOW_SECS);
        a.retention_secs = a
            .retention_secs
            .min(MAX_RETENTION_SECS)
            .max(a.sub_window_secs.saturating_mul(2));
        if !(a.ratio_threshold.is_finite() && a.ratio_threshold > 0.0) {
            a.ratio_threshold = AccelerationConfig::default().ratio_threshold;
        }
        non_negative(&mut a.base_boost, 0.0);
        non_negative(&mut a.max_boost, 0.0);

        if !self.dedup.threshold.is_finite() {
            self.dedup.threshold = DedupConfig::default().threshold;
        }
        self.dedup.threshold = self.dedup.threshold.clamp(0.0, 1.0);
        self.dedup.shingle_size = self.dedup.shingle_size.max(1);

        self.tickers.known_symbols = self
            .tickers
            .known_symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        self
    }
}

fn non_negative(v: &mut f64, fallback: f64) {
    if !(v.is_finite() && *v >= 0.0) {
        *v = fallback;
    }
}

fn positive(v: &mut f64, fallback: f64) {
    if !(v.is_finite() && *v > 0.0) {
        *v = fallback;
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading engine config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing engine config {}", path.display()))
}

/// Load configuration using env var + fallbacks (see module docs).
pub fn load_default() -> Result<EngineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_CONFIG_PATH_TOML);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_CONFIG_PATH_JSON);
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(EngineConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<EngineConfig> {
    let cfg = match hint_ext {
        "json" => serde_json::from_str::<EngineConfig>(s)?,
        "toml" => toml::from_str::<EngineConfig>(s)?,
        // Unknown extension: JSON first, then TOML.
        _ => match serde_json::from_str::<EngineConfig>(s) {
            Ok(c) => c,
            Err(_) => toml::from_str::<EngineConfig>(s)
                .map_err(|e| anyhow!("unsupported config format: {e}"))?,
        },
    };
    Ok(cfg.sanitized())
}

/// Hot-reload wrapper: re-reads the config file when its mtime changes.
///
/// A broken file keeps the last good config in place.
#[derive(Debug)]
pub struct HotReloadConfig {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: EngineConfig,
    last_modified: Option<SystemTime>,
}

impl HotReloadConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(State {
                config: EngineConfig::default(),
                last_modified: None,
            }),
        }
    }

    /// Get the latest config, reloading if the file changed.
    pub fn current(&self) -> EngineConfig {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            // Missing file: keep whatever we have.
            Err(_) => return self.inner.read().config.clone(),
        };

        if self.inner.read().last_modified == Some(mtime) {
            return self.inner.read().config.clone();
        }

        let mut guard = self.inner.write();
        // Double-check in case another reader reloaded first.
        if guard.last_modified != Some(mtime) {
            match load_from(&self.path) {
                Ok(cfg) => {
                    tracing::info!(target: "config", path = %self.path.display(), "engine config reloaded");
                    guard.config = cfg;
                }
                Err(e) => {
                    tracing::warn!(target: "config", error = %format!("{e:#}"), "config reload failed, keeping previous");
                }
            }
            guard.last_modified = Some(mtime);
        }
        guard.config.clone()
    }
}
