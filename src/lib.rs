// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod acceleration;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod item;
pub mod model;
pub mod scoring;
pub mod sentiment;
pub mod source_weights;
pub mod telemetry;
pub mod text;
pub mod tickers;

// ---- Re-exports for stable public API ----
pub use crate::acceleration::{Acceleration, AccelerationContext};
pub use crate::config::EngineConfig;
pub use crate::dedup::{Cluster, Clusterer};
pub use crate::engine::ViralityEngine;
pub use crate::item::{
    items_from_values, ContentItem, Engagement, ScoreBreakdown, ScoredItem, Source,
};
