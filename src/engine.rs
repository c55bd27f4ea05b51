// src/engine.rs
//! # Virality Engine
//! Orchestrates the scoring stages for single items and batches.
//!
//! Per item (pure, parallelizable):
//! tickers + sentiment → engagement × source weight × decay + sentiment
//! adjustment → model refinement.
//!
//! Per batch (serial): items are fed to the [`AccelerationContext`] in
//! chronological order (published_at, then id) and receive the boost of their
//! strongest buzzing ticker. The final score is clamped to [0, 100].
//!
//! Clustering is a separate step ([`Clusterer::assign`]) so callers can keep a
//! clusterer across batches.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use std::{sync::Arc, time::Instant};

use crate::acceleration::AccelerationContext;
use crate::config::EngineConfig;
use crate::dedup::Clusterer;
use crate::item::{ContentItem, ScoreBreakdown, ScoredItem};
use crate::model::{build_score_model, DynScoreModel, HeuristicOnly, ModelInput, ScoreModel};
use crate::scoring::{
    age_hours, clamp_score, decay_factor, engagement_component, heuristic_score,
    sentiment_adjustment, ScoreInputs,
};
use crate::sentiment::SentimentAnalyzer;
use crate::telemetry::{
    ensure_metrics_described, record_degradation, Stage, ACCELERATION_BOOSTS, BATCH_MS,
    ITEMS_SCORED, TRACKED_TICKERS,
};
use crate::tickers::TickerExtractor;

pub struct ViralityEngine {
    config: EngineConfig,
    sentiment: SentimentAnalyzer,
    tickers: TickerExtractor,
    model: DynScoreModel,
}

impl ViralityEngine {
    /// Build the engine; configured model artifacts are loaded here, once.
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let model = build_score_model(&config.model);
        Self::with_model(config, model)
    }

    /// Engine with an already-built model chain.
    pub fn with_model(config: EngineConfig, model: DynScoreModel) -> Self {
        ensure_metrics_described();
        let config = config.sanitized();
        Self {
            sentiment: SentimentAnalyzer::from_config(&config.sentiment),
            tickers: TickerExtractor::new(&config.tickers.known_symbols),
            model,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_description(&self) -> String {
        self.model.describe()
    }

    /// Fresh acceleration context using this engine's windows.
    pub fn acceleration_context(&self) -> AccelerationContext {
        AccelerationContext::new(self.config.acceleration.clone())
    }

    pub fn clusterer(&self) -> Clusterer {
        Clusterer::new(&self.config.dedup)
    }

    /// Score one item, feeding its tickers into `ctx`.
    pub fn score_item(
        &self,
        item: &ContentItem,
        now: DateTime<Utc>,
        ctx: &AccelerationContext,
    ) -> ScoredItem {
        let mut scored = self.prescore(item, now);
        self.accelerate(&mut scored, now, ctx);
        counter!(ITEMS_SCORED).increment(1);
        scored
    }

    /// Score a batch; output order matches input order.
    pub fn score_batch(
        &self,
        items: &[ContentItem],
        now: DateTime<Utc>,
        ctx: &AccelerationContext,
    ) -> Vec<ScoredItem> {
        let started = Instant::now();
        let mut scored: Vec<ScoredItem> = items.iter().map(|it| self.prescore(it, now)).collect();
        self.accelerate_batch(&mut scored, now, ctx);
        self.finish_batch(scored.len(), started, ctx);
        scored
    }

    /// Like [`score_batch`](Self::score_batch), with the per-item stages spread
    /// over blocking tasks. Produces the same result for the same input.
    pub async fn score_batch_concurrent(
        self: Arc<Self>,
        items: Vec<ContentItem>,
        now: DateTime<Utc>,
        ctx: &AccelerationContext,
    ) -> Vec<ScoredItem> {
        let started = Instant::now();
        let total = items.len();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let chunk = total.div_ceil(workers).max(1);

        let items = Arc::new(items);
        let mut handles = Vec::with_capacity(workers);
        let mut start = 0;
        while start < total {
            let end = (start + chunk).min(total);
            let engine = Arc::clone(&self);
            let shared = Arc::clone(&items);
            let task = tokio::task::spawn_blocking(move || {
                shared[start..end]
                    .iter()
                    .map(|it| engine.prescore(it, now))
                    .collect::<Vec<_>>()
            });
            handles.push((start..end, task));
            start = end;
        }

        let mut scored = Vec::with_capacity(total);
        for (range, task) in handles {
            match task.await {
                Ok(part) => scored.extend(part),
                Err(e) => {
                    tracing::error!(
                        target: "scoring",
                        error = %e,
                        items = range.len(),
                        "scoring worker failed, rescoring chunk heuristic-only"
                    );
                    for it in &items[range] {
                        record_degradation(&it.id, Stage::Worker, &e);
                        scored.push(self.prescore_with(it, now, &HeuristicOnly));
                    }
                }
            }
        }

        self.accelerate_batch(&mut scored, now, ctx);
        self.finish_batch(scored.len(), started, ctx);
        scored
    }

    /// All per-item stages; no shared state touched.
    fn prescore(&self, item: &ContentItem, now: DateTime<Utc>) -> ScoredItem {
        self.prescore_with(item, now, self.model.as_ref())
    }

    fn prescore_with(
        &self,
        item: &ContentItem,
        now: DateTime<Utc>,
        model: &dyn ScoreModel,
    ) -> ScoredItem {
        let published = match item.published_at {
            Some(t) => t,
            None => {
                record_degradation(&item.id, Stage::Timestamp, &"missing published_at, using now");
                now
            }
        };

        let tickers = self.tickers.extract(&item.text);
        let sentiment = match self.sentiment.try_compound(&item.text) {
            Ok(s) => s,
            Err(e) => {
                record_degradation(&item.id, Stage::Sentiment, &e);
                0.0
            }
        };

        let inputs = ScoreInputs::new(
            engagement_component(&item.engagement, item.follower_count, &self.config.engagement),
            self.config.source_weights.weight_for(item.source.as_str()),
            decay_factor(age_hours(published, now), &self.config.decay),
            sentiment,
        );
        let heuristic = heuristic_score(&inputs, &self.config);
        let model_adjusted = clamp_score(model.refine(
            &ModelInput {
                item,
                tickers: &tickers,
                sentiment: inputs.sentiment,
            },
            heuristic,
        ));

        ScoredItem {
            item: item.clone(),
            sentiment_score: inputs.sentiment,
            tickers,
            score: model_adjusted,
            cluster_id: None,
            duplicate_of: None,
            breakdown: ScoreBreakdown {
                engagement: inputs.engagement,
                source_weight: inputs.source_weight,
                decay_factor: inputs.decay_factor,
                sentiment_adjustment: sentiment_adjustment(inputs.sentiment, &self.config.sentiment),
                heuristic,
                model_adjusted,
                acceleration_boost: 0.0,
                buzzing_tickers: Vec::new(),
            },
        }
    }

    fn accelerate(&self, scored: &mut ScoredItem, now: DateTime<Utc>, ctx: &AccelerationContext) {
        let at = scored.effective_published_at(now);
        let (boost, buzzing) = ctx.observe_and_boost(&scored.item.id, &scored.tickers, at);
        if boost > 0.0 {
            counter!(ACCELERATION_BOOSTS).increment(1);
            tracing::debug!(
                target: "acceleration",
                item_id = %scored.item.id,
                boost,
                tickers = ?buzzing,
                "buzz boost applied"
            );
        }
        scored.breakdown.acceleration_boost = boost;
        scored.breakdown.buzzing_tickers = buzzing;
        scored.score = clamp_score(scored.breakdown.model_adjusted + boost);
    }

    /// Feed the acceleration context in (published_at, id) order.
    fn accelerate_batch(
        &self,
        scored: &mut [ScoredItem],
        now: DateTime<Utc>,
        ctx: &AccelerationContext,
    ) {
        let mut order: Vec<usize> = (0..scored.len()).collect();
        order.sort_by(|&a, &b| {
            let (x, y) = (&scored[a], &scored[b]);
            x.effective_published_at(now)
                .cmp(&y.effective_published_at(now))
                .then_with(|| x.item.id.cmp(&y.item.id))
        });
        for i in order {
            self.accelerate(&mut scored[i], now, ctx);
        }
    }

    fn finish_batch(&self, n: usize, started: Instant, ctx: &AccelerationContext) {
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!(ITEMS_SCORED).increment(n as u64);
        histogram!(BATCH_MS).record(ms);
        gauge!(TRACKED_TICKERS).set(ctx.tracked_tickers() as f64);
        tracing::info!(target: "scoring", items = n, elapsed_ms = ms, "batch scored");
    }
}
