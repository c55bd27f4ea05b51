// src/acceleration.rs
//! # Acceleration / Buzz Detector
//! Per-ticker sliding windows of mention timestamps.
//!
//! Acceleration at `t` compares mentions in the recent sub-window `(t-sub, t]`
//! with the previous one `(t-2·sub, t-sub]`. A ticker is *buzzing* when
//! `recent / max(previous, 1) >= ratio_threshold` and `recent >= min_recent_mentions`.
//!
//! This is the only shared mutable state of the engine. It lives in an explicit
//! context object (one per pipeline / test), never in a global.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use crate::config::AccelerationConfig;

/// Thread-safe per-ticker mention windows.
#[derive(Debug)]
pub struct AccelerationContext {
    inner: Mutex<Inner>,
    cfg: AccelerationConfig,
}

#[derive(Debug, Default)]
struct Inner {
    windows: HashMap<String, TickerMentionWindow>,
    /// Item id → (mention time, tickers) of its current mentions.
    items: HashMap<String, (i64, Vec<String>)>,
    /// Newest mention seen; everything before `latest - retention` is dropped.
    latest: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
struct Mention {
    ts: i64,
    item_id: Option<String>,
}

/// Mentions of one ticker (unix millis), ordered by time.
#[derive(Debug, Default)]
struct TickerMentionWindow {
    buf: VecDeque<Mention>,
}

impl TickerMentionWindow {
    fn insert(&mut self, mention: Mention) {
        let idx = self.buf.partition_point(|m| m.ts <= mention.ts);
        self.buf.insert(idx, mention);
    }

    fn remove_item(&mut self, ts: i64, item_id: &str) {
        let lo = self.buf.partition_point(|m| m.ts < ts);
        let hi = self.buf.partition_point(|m| m.ts <= ts);
        if let Some(pos) = (lo..hi).find(|&i| self.buf[i].item_id.as_deref() == Some(item_id)) {
            self.buf.remove(pos);
        }
    }

    fn prune_before(&mut self, cutoff: i64) {
        while self.buf.front().is_some_and(|m| m.ts < cutoff) {
            self.buf.pop_front();
        }
    }

    /// Mentions in `(from, to]`.
    fn count_between(&self, from: i64, to: i64) -> usize {
        let hi = self.buf.partition_point(|m| m.ts <= to);
        let lo = self.buf.partition_point(|m| m.ts <= from);
        hi.saturating_sub(lo)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acceleration {
    pub ticker: String,
    pub recent: usize,
    pub previous: usize,
    pub ratio: f64,
    pub buzzing: bool,
}

impl Inner {
    fn insert(&mut self, ticker: &str, mention: Mention) {
        self.latest = Some(self.latest.map_or(mention.ts, |l| l.max(mention.ts)));
        self.windows
            .entry(ticker.to_string())
            .or_default()
            .insert(mention);
    }

    /// Take back everything previously recorded for `item_id`.
    fn forget_item(&mut self, item_id: &str) {
        let Some((ts, tickers)) = self.items.remove(item_id) else {
            return;
        };
        for t in &tickers {
            if let Some(w) = self.windows.get_mut(t) {
                w.remove_item(ts, item_id);
                if w.buf.is_empty() {
                    self.windows.remove(t);
                }
            }
        }
    }

    /// Drop mentions older than `horizon - retention_ms` and empty windows.
    fn prune(&mut self, horizon: i64, retention_ms: i64) {
        let cutoff = horizon.saturating_sub(retention_ms);
        self.windows.retain(|_, w| {
            w.prune_before(cutoff);
            !w.buf.is_empty()
        });
        self.items.retain(|_, (ts, _)| *ts >= cutoff);
    }
}

impl AccelerationContext {
    pub fn new(cfg: AccelerationConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            cfg,
        }
    }

    pub fn config(&self) -> &AccelerationConfig {
        &self.cfg
    }

    fn retention_ms(&self) -> i64 {
        i64::try_from(self.cfg.retention_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    fn sub_ms(&self) -> i64 {
        i64::try_from(self.cfg.sub_window_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    /// Record one anonymous mention of `ticker` at `at`.
    pub fn record(&self, ticker: &str, at: DateTime<Utc>) {
        let retention = self.retention_ms();
        let mut inner = self.inner.lock();
        inner.insert(
            ticker,
            Mention {
                ts: at.timestamp_millis(),
                item_id: None,
            },
        );
        if let Some(latest) = inner.latest {
            inner.prune(latest, retention);
        }
    }

    /// Acceleration of `ticker` as seen at `at`.
    pub fn acceleration(&self, ticker: &str, at: DateTime<Utc>) -> Acceleration {
        let inner = self.inner.lock();
        self.evaluate(&inner, ticker, at.timestamp_millis())
    }

    fn evaluate(&self, inner: &Inner, ticker: &str, at_ms: i64) -> Acceleration {
        let sub = self.sub_ms();
        let mid = at_ms.saturating_sub(sub);
        let (recent, previous) = match inner.windows.get(ticker) {
            Some(w) => (
                w.count_between(mid, at_ms),
                w.count_between(mid.saturating_sub(sub), mid),
            ),
            None => (0, 0),
        };
        let ratio = recent as f64 / previous.max(1) as f64;
        let buzzing =
            recent >= self.cfg.min_recent_mentions && ratio >= self.cfg.ratio_threshold;
        Acceleration {
            ticker: ticker.to_string(),
            recent,
            previous,
            ratio,
            buzzing,
        }
    }

    /// Capped boost for one buzzing ticker (0 when not buzzing).
    pub fn boost_for(&self, acc: &Acceleration) -> f64 {
        if !acc.buzzing {
            return 0.0;
        }
        (self.cfg.base_boost * acc.ratio / self.cfg.ratio_threshold).min(self.cfg.max_boost)
    }

    /// Record an item's mentions at its publication time, then return the
    /// largest boost among its buzzing tickers and the buzzing tickers themselves.
    ///
    /// Mentions are keyed by `item_id`: observing the same item again replaces
    /// its previous mentions, so re-scoring never inflates a ticker's counts.
    /// Runs under one lock so concurrent callers cannot interleave between
    /// recording and evaluation.
    pub fn observe_and_boost(
        &self,
        item_id: &str,
        tickers: &[String],
        at: DateTime<Utc>,
    ) -> (f64, Vec<String>) {
        let at_ms = at.timestamp_millis();
        let retention = self.retention_ms();
        let mut inner = self.inner.lock();

        inner.forget_item(item_id);
        if tickers.is_empty() {
            return (0.0, Vec::new());
        }
        for t in tickers {
            inner.insert(
                t,
                Mention {
                    ts: at_ms,
                    item_id: Some(item_id.to_string()),
                },
            );
        }
        inner
            .items
            .insert(item_id.to_string(), (at_ms, tickers.to_vec()));
        if let Some(latest) = inner.latest {
            inner.prune(latest, retention);
        }

        let mut boost = 0.0f64;
        let mut buzzing = Vec::new();
        for t in tickers {
            let acc = self.evaluate(&inner, t, at_ms);
            if acc.buzzing {
                boost = boost.max(self.boost_for(&acc));
                buzzing.push(acc.ticker);
            }
        }
        (boost, buzzing)
    }

    /// Drop mentions past retention as seen at `now` (or at the newest
    /// mention, if later) and forget tickers left without mentions.
    pub fn prune(&self, now: DateTime<Utc>) {
        let retention = self.retention_ms();
        let mut inner = self.inner.lock();
        let horizon = inner
            .latest
            .map_or(now.timestamp_millis(), |l| l.max(now.timestamp_millis()));
        inner.prune(horizon, retention);
    }

    /// All currently buzzing tickers at `at`, strongest first.
    pub fn buzzing_tickers(&self, at: DateTime<Utc>) -> Vec<Acceleration> {
        self.prune(at);
        let inner = self.inner.lock();
        let at_ms = at.timestamp_millis();
        let mut out: Vec<Acceleration> = inner
            .windows
            .keys()
            .map(|t| self.evaluate(&inner, t, at_ms))
            .filter(|a| a.buzzing)
            .collect();
        out.sort_by(|a, b| {
            b.ratio
                .total_cmp(&a.ratio)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        out
    }

    /// Number of tickers with at least one retained mention.
    pub fn tracked_tickers(&self) -> usize {
        self.inner.lock().windows.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.windows.clear();
        inner.items.clear();
        inner.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ctx() -> AccelerationContext {
        AccelerationContext::new(AccelerationConfig::default())
    }

    #[test]
    fn sol_spike_is_buzzing() {
        let c = ctx();
        let now = t0();
        for i in 0..2 {
            c.record("SOL", now - Duration::minutes(15) + Duration::seconds(i));
        }
        for i in 0..20 {
            c.record("SOL", now - Duration::seconds(30 * i));
        }
        let acc = c.acceleration("SOL", now);
        assert_eq!(acc.recent, 20);
        assert_eq!(acc.previous, 2);
        assert!(acc.buzzing);
        assert!(c.boost_for(&acc) > 0.0);
        assert!(c.boost_for(&acc) <= c.config().max_boost);
    }

    #[test]
    fn steady_mentions_are_not_buzzing() {
        let c = ctx();
        let now = t0();
        for i in 0..20 {
            c.record("ETH", now - Duration::minutes(i));
        }
        let acc = c.acceleration("ETH", now);
        assert!(!acc.buzzing, "{acc:?}");
    }

    #[test]
    fn too_few_mentions_never_buzz() {
        let c = ctx();
        let now = t0();
        for _ in 0..3 {
            c.record("PEPE", now);
        }
        let acc = c.acceleration("PEPE", now);
        assert_eq!(acc.previous, 0);
        assert!(!acc.buzzing);
    }

    #[test]
    fn out_of_order_records_are_kept_sorted() {
        let c = ctx();
        let now = t0();
        c.record("BTC", now);
        c.record("BTC", now - Duration::minutes(12));
        c.record("BTC", now - Duration::minutes(1));
        let acc = c.acceleration("BTC", now);
        assert_eq!(acc.recent, 2);
        assert_eq!(acc.previous, 1);
    }

    #[test]
    fn old_mentions_are_pruned_past_retention() {
        let c = ctx();
        let now = t0();
        c.record("DOGE", now - Duration::hours(5));
        c.record("DOGE", now);
        let acc = c.acceleration("DOGE", now - Duration::hours(5));
        assert_eq!(acc.recent, 0);
    }

    #[test]
    fn observe_and_boost_uses_strongest_ticker_once() {
        let c = ctx();
        let now = t0();
        for i in 0..30 {
            c.record("SOL", now - Duration::seconds(10 * i));
        }
        for i in 0..10 {
            c.record("BONK", now - Duration::seconds(10 * i));
        }
        let (boost, buzzing) = c.observe_and_boost("post-1", &["BONK".into(), "SOL".into()], now);
        assert_eq!(buzzing, vec!["BONK".to_string(), "SOL".to_string()]);
        assert_eq!(boost, c.config().max_boost);

        let (none, hits) = c.observe_and_boost("post-2", &[], now);
        assert_eq!(none, 0.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn buzzing_snapshot_is_sorted_by_ratio() {
        let c = ctx();
        let now = t0();
        for i in 0..6 {
            c.record("AAA", now - Duration::seconds(i));
        }
        for i in 0..12 {
            c.record("BBB", now - Duration::seconds(i));
        }
        let snap = c.buzzing_tickers(now);
        let names: Vec<_> = snap.iter().map(|a| a.ticker.as_str()).collect();
        assert_eq!(names, vec!["BBB", "AAA"]);
        assert_eq!(c.tracked_tickers(), 2);
        c.clear();
        assert!(c.buzzing_tickers(now).is_empty());
    }

    #[test]
    fn reobserving_an_item_replaces_its_mentions() {
        let c = ctx();
        let now = t0();
        let tickers = vec!["SOL".to_string()];
        let first = c.observe_and_boost("solo", &tickers, now);
        for _ in 0..10 {
            assert_eq!(c.observe_and_boost("solo", &tickers, now), first);
        }
        let acc = c.acceleration("SOL", now);
        assert_eq!(acc.recent, 1);
        assert!(!acc.buzzing);
    }

    #[test]
    fn reobserving_with_new_time_or_tickers_moves_the_mention() {
        let c = ctx();
        let now = t0();
        c.observe_and_boost("a", &["SOL".into(), "ETH".into()], now - Duration::minutes(15));
        c.observe_and_boost("a", &["SOL".into()], now);
        let sol = c.acceleration("SOL", now);
        assert_eq!((sol.recent, sol.previous), (1, 0));
        assert_eq!(c.acceleration("ETH", now).recent, 0);
        assert_eq!(c.tracked_tickers(), 1);

        c.observe_and_boost("a", &[], now);
        assert_eq!(c.tracked_tickers(), 0);
    }

    #[test]
    fn quiet_tickers_are_forgotten_after_retention() {
        let c = ctx();
        let now = t0();
        let stale = now - Duration::hours(3) - Duration::minutes(1);
        c.observe_and_boost("old", &["DOGE".into()], stale);
        c.observe_and_boost("fresh", &["SOL".into()], now - Duration::hours(2));
        assert_eq!(c.tracked_tickers(), 1);

        c.record("ETH", now - Duration::minutes(30));
        c.prune(now + Duration::hours(2));
        assert_eq!(c.tracked_tickers(), 0);
        assert!(c.buzzing_tickers(now).is_empty());
    }

    #[test]
    fn huge_windows_do_not_overflow() {
        let c = AccelerationContext::new(AccelerationConfig {
            retention_secs: u64::MAX,
            sub_window_secs: u64::MAX,
            ..AccelerationConfig::default()
        });
        let now = t0();
        c.record("SOL", now);
        let acc = c.acceleration("SOL", now);
        assert_eq!(acc.recent, 1);
        c.prune(now);
        assert_eq!(c.tracked_tickers(), 1);
    }
}
