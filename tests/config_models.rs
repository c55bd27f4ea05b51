// tests/config_models.rs
use std::fs;

use chrono::{TimeZone, Utc};
use serial_test::serial;
use virality_engine::config::{self, SimilarityKind, ENV_CONFIG_PATH};
use virality_engine::{ContentItem, Source, ViralityEngine};

fn write_artifacts(dir: &std::path::Path) -> (String, String) {
    let c = dir.join("classifier.json");
    let r = dir.join("regressor.json");
    fs::write(
        &c,
        r#"{"version":"t1","intercept":-2.0,"weights":{"airdrop":4.0,"sol":1.0}}"#,
    )
    .unwrap();
    fs::write(
        &r,
        r#"{"intercept":20.0,"log_counts":true,"coefficients":{"likes":2.0,"reposts":3.0,"ticker_count":2.0}}"#,
    )
    .unwrap();
    (
        c.display().to_string().replace('\\', "/"),
        r.display().to_string().replace('\\', "/"),
    )
}

#[test]
#[serial]
fn toml_config_from_env_wires_models_and_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let (classifier, regressor) = write_artifacts(dir.path());
    let cfg_path = dir.path().join("virality.toml");
    fs::write(
        &cfg_path,
        format!(
            r#"
[model]
classifier_path = "{classifier}"
regressor_path = "{regressor}"
classifier_weight = 0.5
heuristic_weight = 0.5

[dedup]
strategy = "levenshtein"
threshold = 0.8

[source_weights.weights]
news = 1.5
"#
        ),
    )
    .unwrap();

    std::env::set_var(ENV_CONFIG_PATH, &cfg_path);
    let cfg = config::load_default().unwrap();
    std::env::remove_var(ENV_CONFIG_PATH);

    assert_eq!(cfg.dedup.strategy, SimilarityKind::Levenshtein);
    assert_eq!(cfg.source_weights.weight_for("NEWS"), 1.5);

    let engine = ViralityEngine::new(cfg);
    assert_eq!(engine.model_description(), "heuristic+classifier+regressor");
    assert_eq!(engine.clusterer().strategy_name(), "levenshtein");

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let ctx = engine.acceleration_context();
    let hot = ContentItem::new("hot", Source::Crypto, "$SOL airdrop is live")
        .with_engagement(100, 10, 10)
        .published_at(now);
    let cold = ContentItem::new("cold", Source::Crypto, "weekly newsletter")
        .with_engagement(100, 10, 10)
        .published_at(now);
    let h = engine.score_item(&hot, now, &ctx);
    let c = engine.score_item(&cold, now, &ctx);

    for s in [&h, &c] {
        assert!((0.0..=100.0).contains(&s.score));
        assert_ne!(s.breakdown.model_adjusted, s.breakdown.heuristic);
    }
    assert!(h.score > c.score);
}

#[test]
#[serial]
fn broken_config_is_an_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("virality.toml");
    fs::write(&p, "[decay\nhalf_life_hours = ").unwrap();
    assert!(config::load_from(&p).is_err());

    std::env::set_var(ENV_CONFIG_PATH, dir.path().join("nope.toml"));
    assert!(config::load_default().is_err());
    std::env::remove_var(ENV_CONFIG_PATH);
}

#[test]
fn external_lexicon_replaces_embedded_one() {
    let dir = tempfile::tempdir().unwrap();
    let lex = dir.path().join("lexicon.json");
    fs::write(&lex, r#"{"wagmi": 4, "ngmi": -4}"#).unwrap();

    let mut cfg = virality_engine::EngineConfig::default();
    cfg.sentiment.lexicon_path = Some(lex);
    let engine = ViralityEngine::new(cfg);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let ctx = engine.acceleration_context();

    let up = engine.score_item(&ContentItem::new("u", Source::Twitter, "wagmi"), now, &ctx);
    let down = engine.score_item(&ContentItem::new("d", Source::Twitter, "ngmi"), now, &ctx);
    let gone = engine.score_item(&ContentItem::new("g", Source::Twitter, "amazing"), now, &ctx);
    assert!(up.sentiment_score > 0.5);
    assert!(down.sentiment_score < -0.5);
    assert_eq!(gone.sentiment_score, 0.0);
}
