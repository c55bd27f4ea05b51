// src/telemetry.rs
//! Metrics and degradation logging shared by all stages.
//!
//! Series are always emitted through the `metrics` facade; only the binary
//! installs a Prometheus recorder, so library users pay nothing unless they
//! install one themselves.

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::fmt;

pub const ITEMS_SCORED: &str = "scoring_items_total";
pub const DEGRADATIONS: &str = "scoring_degradations_total";
pub const BATCH_MS: &str = "scoring_batch_ms";
pub const ACCELERATION_BOOSTS: &str = "acceleration_boosts_total";
pub const TRACKED_TICKERS: &str = "acceleration_tracked_tickers";
pub const EXACT_DUPLICATES: &str = "dedup_exact_merged_total";
pub const CLUSTERS: &str = "dedup_clusters";

/// Pipeline stage where a local failure was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Timestamp,
    Sentiment,
    Classifier,
    Regressor,
    Dedup,
    Worker,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Timestamp => "timestamp",
            Stage::Sentiment => "sentiment",
            Stage::Classifier => "classifier",
            Stage::Regressor => "regressor",
            Stage::Dedup => "dedup",
            Stage::Worker => "worker",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-time metrics registration (so series show up on scrape).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(ITEMS_SCORED, "Items that went through a scoring pass.");
        describe_counter!(
            DEGRADATIONS,
            "Local failures absorbed by falling back to a safe default, by stage."
        );
        describe_histogram!(BATCH_MS, "Batch scoring time in milliseconds.");
        describe_counter!(ACCELERATION_BOOSTS, "Items boosted by a buzzing ticker.");
        describe_gauge!(TRACKED_TICKERS, "Tickers with retained mentions.");
        describe_counter!(EXACT_DUPLICATES, "Items merged into an exact-duplicate representative.");
        describe_gauge!(CLUSTERS, "Clusters known to the clusterer.");
    });
}

/// Log and count a degradation. Never fails, never panics.
pub fn record_degradation(item_id: &str, stage: Stage, detail: &dyn fmt::Display) {
    tracing::warn!(
        target: "scoring",
        item_id,
        stage = stage.as_str(),
        detail = %detail,
        "degraded to fallback"
    );
    counter!(DEGRADATIONS, "stage" => stage.as_str()).increment(1);
}

/// Install a process-wide Prometheus recorder.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    Ok(handle)
}
