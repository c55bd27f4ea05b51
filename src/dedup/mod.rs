// src/dedup/mod.rs
//! # Deduplication and clustering
//!
//! Two layers over canonical text:
//! - **Exact duplicates**: items sharing a fingerprint (source, external id and
//!   canonical text) form a group. The member with the highest raw engagement
//!   is the representative (ties: smallest id); the others get `duplicate_of`.
//!   Nothing is dropped.
//! - **Near duplicates**: a new item joins the cluster holding its most similar
//!   member if that similarity reaches the threshold, otherwise it founds a new
//!   cluster.
//!
//! The clusterer remembers every assignment. Items seen before never move, so
//! re-running a batch or feeding new batches keeps cluster ids stable. New items
//! are placed in (published_at, id) order, which makes the result independent
//! of input order.

pub mod similarity;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use crate::config::DedupConfig;
use crate::item::{ScoredItem, Source};
use crate::telemetry::{record_degradation, Stage, CLUSTERS, EXACT_DUPLICATES};
use crate::text::canonicalize;

pub use similarity::{
    strategy_from_config, ExactMatch, NormalizedLevenshtein, ShingleJaccard, SimilarityStrategy,
};

/// Snapshot of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: String,
    /// Highest-scoring member when the cluster was formed.
    pub representative: String,
    /// Member item ids, sorted.
    pub members: Vec<String>,
    /// Max score over members, as of the latest pass.
    pub score: f64,
}

#[derive(Debug, Clone)]
struct MemberState {
    canonical: String,
    /// None for items with empty canonical text; those are always unique.
    fingerprint: Option<String>,
    raw_total: u64,
    score: f64,
    cluster_id: String,
}

#[derive(Debug, Clone, Default)]
struct ClusterState {
    representative: String,
    members: Vec<String>,
}

pub struct Clusterer {
    strategy: Box<dyn SimilarityStrategy>,
    threshold: f64,
    clusters: BTreeMap<String, ClusterState>,
    members: HashMap<String, MemberState>,
    fingerprints: HashMap<String, Vec<String>>,
}

impl Clusterer {
    pub fn new(cfg: &DedupConfig) -> Self {
        Self::with_strategy(strategy_from_config(cfg), cfg.threshold)
    }

    pub fn with_strategy(strategy: Box<dyn SimilarityStrategy>, threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DedupConfig::default().threshold
        };
        Self {
            strategy,
            threshold,
            clusters: BTreeMap::new(),
            members: HashMap::new(),
            fingerprints: HashMap::new(),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster id of a known item.
    pub fn cluster_of(&self, item_id: &str) -> Option<&str> {
        self.members.get(item_id).map(|m| m.cluster_id.as_str())
    }

    /// Assign `cluster_id` and `duplicate_of` on every item of the batch.
    ///
    /// Known items keep their cluster; their score and engagement are refreshed.
    pub fn assign(&mut self, items: &mut [ScoredItem]) {
        let mut fresh: Vec<usize> = Vec::new();
        for (i, it) in items.iter().enumerate() {
            match self.members.get_mut(&it.item.id) {
                Some(m) => {
                    m.score = it.score;
                    m.raw_total = it.item.engagement.raw_total();
                }
                None => fresh.push(i),
            }
        }
        fresh.sort_by(|&a, &b| {
            let (x, y) = (&items[a].item, &items[b].item);
            x.published_at
                .cmp(&y.published_at)
                .then_with(|| x.id.cmp(&y.id))
        });

        let mut formed: Vec<String> = Vec::new();
        for idx in fresh {
            let it = &items[idx];
            // Same id twice in one batch: the later copy only refreshes counters.
            if let Some(m) = self.members.get_mut(&it.item.id) {
                m.score = it.score;
                m.raw_total = it.item.engagement.raw_total();
                continue;
            }

            let canonical = canonicalize(&it.item.text);
            let fingerprint = (!canonical.is_empty()).then(|| {
                fingerprint(it.item.source, it.item.external_id.as_deref(), &canonical)
            });

            let cluster_id = match &fingerprint {
                None => {
                    record_degradation(&it.item.id, Stage::Dedup, &"empty canonical text");
                    self.open_cluster(&it.item.id, &mut formed)
                }
                Some(fp) => match self.fingerprint_cluster(fp) {
                    Some(cid) => cid,
                    None => match self.best_match(&canonical) {
                        Some(cid) => cid,
                        None => self.open_cluster(&it.item.id, &mut formed),
                    },
                },
            };

            if let Some(fp) = &fingerprint {
                self.fingerprints
                    .entry(fp.clone())
                    .or_default()
                    .push(it.item.id.clone());
            }
            if let Some(c) = self.clusters.get_mut(&cluster_id) {
                let pos = c.members.binary_search(&it.item.id).unwrap_or_else(|p| p);
                c.members.insert(pos, it.item.id.clone());
            }
            self.members.insert(
                it.item.id.clone(),
                MemberState {
                    canonical,
                    fingerprint,
                    raw_total: it.item.engagement.raw_total(),
                    score: it.score,
                    cluster_id,
                },
            );
        }

        // Representatives are fixed once, at the end of the pass that formed the cluster.
        for cid in &formed {
            let rep = self.clusters.get(cid).and_then(|c| {
                c.members
                    .iter()
                    .filter_map(|id| self.members.get(id).map(|m| (id, m.score)))
                    .max_by(|(ia, sa), (ib, sb)| sa.total_cmp(sb).then_with(|| ib.cmp(ia)))
                    .map(|(id, _)| id.clone())
            });
            if let (Some(rep), Some(c)) = (rep, self.clusters.get_mut(cid)) {
                c.representative = rep;
            }
        }

        let mut merged = 0u64;
        for it in items.iter_mut() {
            let Some(m) = self.members.get(&it.item.id) else {
                continue;
            };
            it.cluster_id = Some(m.cluster_id.clone());
            it.duplicate_of = m
                .fingerprint
                .as_ref()
                .and_then(|fp| self.exact_representative(fp))
                .filter(|rep| *rep != it.item.id);
            if it.duplicate_of.is_some() {
                merged += 1;
            }
        }

        metrics::counter!(EXACT_DUPLICATES).increment(merged);
        metrics::gauge!(CLUSTERS).set(self.clusters.len() as f64);
        tracing::debug!(
            target: "dedup",
            batch = items.len(),
            formed = formed.len(),
            merged,
            clusters = self.clusters.len(),
            "dedup pass done"
        );
    }

    /// All clusters, highest score first (ties: id).
    pub fn clusters(&self) -> Vec<Cluster> {
        let mut out: Vec<Cluster> = self
            .clusters
            .keys()
            .filter_map(|id| self.cluster(id))
            .collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn cluster(&self, id: &str) -> Option<Cluster> {
        let c = self.clusters.get(id)?;
        let score = c
            .members
            .iter()
            .filter_map(|m| self.members.get(m))
            .map(|m| m.score)
            .fold(0.0_f64, f64::max);
        Some(Cluster {
            id: id.to_string(),
            representative: c.representative.clone(),
            members: c.members.clone(),
            score,
        })
    }

    fn fingerprint_cluster(&self, fp: &str) -> Option<String> {
        let first = self.fingerprints.get(fp)?.first()?;
        self.members.get(first).map(|m| m.cluster_id.clone())
    }

    /// Cluster of the most similar known member at or above the threshold.
    fn best_match(&self, canonical: &str) -> Option<String> {
        let mut best: Option<(f64, &str)> = None;
        for m in self.members.values() {
            if m.fingerprint.is_none() {
                continue;
            }
            let sim = self.strategy.similarity(canonical, &m.canonical);
            if sim < self.threshold || sim <= 0.0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((bs, bc)) => sim > bs || (sim == bs && m.cluster_id.as_str() < bc),
            };
            if better {
                best = Some((sim, m.cluster_id.as_str()));
            }
        }
        best.map(|(_, cid)| cid.to_string())
    }

    fn exact_representative(&self, fp: &str) -> Option<String> {
        self.fingerprints
            .get(fp)?
            .iter()
            .filter_map(|id| self.members.get(id).map(|m| (id, m.raw_total)))
            .max_by(|(ia, ra), (ib, rb)| ra.cmp(rb).then_with(|| ib.cmp(ia)))
            .map(|(id, _)| id.clone())
    }

    fn open_cluster(&mut self, founder: &str, formed: &mut Vec<String>) -> String {
        let base = format!("c-{}", short_hash(founder));
        let mut id = base.clone();
        let mut n = 2;
        while self.clusters.contains_key(&id) {
            id = format!("{base}-{n}");
            n += 1;
        }
        self.clusters.insert(
            id.clone(),
            ClusterState {
                representative: founder.to_string(),
                members: Vec::new(),
            },
        );
        formed.push(id.clone());
        id
    }
}

/// Exact-duplicate key: SHA-256 over source, external id and canonical text.
pub fn fingerprint(source: Source, external_id: Option<&str>, canonical: &str) -> String {
    let mut h = Sha256::new();
    h.update(source.as_str().as_bytes());
    h.update([0u8]);
    h.update(external_id.unwrap_or_default().as_bytes());
    h.update([0u8]);
    h.update(canonical.as_bytes());
    hex(&h.finalize())
}

fn short_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex(&digest[..6])
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
