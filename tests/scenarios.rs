// tests/scenarios.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use virality_engine::{ContentItem, EngineConfig, Source, ViralityEngine};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn fresh_item_outscores_identical_stale_item() {
    let engine = ViralityEngine::new(EngineConfig::default());
    let ctx = engine.acceleration_context();

    let a = ContentItem::new("a", Source::Twitter, "Protocol upgrade ships today")
        .with_engagement(850, 200, 400)
        .published_at(now());
    let b = ContentItem::new("b", Source::Twitter, "Protocol upgrade ships today")
        .with_engagement(850, 200, 400)
        .published_at(now() - Duration::hours(72));

    let out = engine.score_batch(&[a, b], now(), &ctx);
    assert!(
        out[0].score > out[1].score,
        "fresh {} vs stale {}",
        out[0].score,
        out[1].score
    );
    assert_eq!(out[0].breakdown.decay_factor, 1.0);
    // 72h at a 24h half-life: exp(-3) ≈ 0.0498 hits the 0.05 floor
    assert!((out[1].breakdown.decay_factor - 0.05).abs() < 1e-9);
}

#[test]
fn sol_burst_is_buzzing_and_boosts_fresh_item() {
    let engine = ViralityEngine::new(EngineConfig::default());
    let ctx = engine.acceleration_context();

    let mut history = Vec::new();
    for i in 0..2 {
        history.push(
            ContentItem::new(format!("prev-{i}"), Source::Telegram, "watching $SOL")
                .published_at(now() - Duration::minutes(15) + Duration::seconds(i)),
        );
    }
    for i in 0..20 {
        history.push(
            ContentItem::new(format!("recent-{i:02}"), Source::Telegram, "$SOL going wild")
                .published_at(now() - Duration::minutes(9) + Duration::seconds(i * 20)),
        );
    }
    engine.score_batch(&history, now(), &ctx);

    let buzz = ctx.buzzing_tickers(now());
    assert_eq!(buzz.len(), 1);
    assert_eq!(buzz[0].ticker, "SOL");
    assert_eq!(buzz[0].recent, 20);
    assert_eq!(buzz[0].previous, 2);

    let fresh = ContentItem::new("fresh", Source::Twitter, "Everyone is talking about $SOL")
        .with_engagement(30, 5, 2)
        .published_at(now());
    let boosted = engine.score_item(&fresh, now(), &ctx);
    let baseline = engine.score_item(&fresh, now(), &engine.acceleration_context());

    assert!(boosted.score > baseline.score);
    assert_eq!(boosted.breakdown.buzzing_tickers, vec!["SOL".to_string()]);
    assert_eq!(boosted.breakdown.acceleration_boost, 15.0);
    assert_eq!(baseline.breakdown.acceleration_boost, 0.0);
    assert!(boosted.score <= 100.0);
}

#[test]
fn hashtag_variant_clusters_and_unrelated_topic_does_not() {
    let engine = ViralityEngine::new(EngineConfig::default());
    let ctx = engine.acceleration_context();
    let items = vec![
        ContentItem::new("t1", Source::Twitter, "Bitcoin just broke 100k, new all time high")
            .with_engagement(900, 300, 120)
            .published_at(now() - Duration::minutes(30)),
        ContentItem::new("t2", Source::Reddit, "Bitcoin just broke 100k, new all time high #BTC")
            .with_engagement(50, 4, 10)
            .published_at(now() - Duration::minutes(20)),
        ContentItem::new("t3", Source::News, "Central bank holds interest rates steady")
            .with_engagement(80, 10, 5)
            .published_at(now() - Duration::minutes(10)),
    ];
    let mut scored = engine.score_batch(&items, now(), &ctx);
    let mut clusterer = engine.clusterer();
    clusterer.assign(&mut scored);

    assert_eq!(scored[0].cluster_id, scored[1].cluster_id);
    assert_ne!(scored[0].cluster_id, scored[2].cluster_id);
    assert_eq!(clusterer.len(), 2);

    let top = &clusterer.clusters()[0];
    assert_eq!(top.representative, "t1");
    assert_eq!(top.score, scored[0].score.max(scored[1].score));
}

#[test]
fn long_lived_context_survives_repeated_rescoring() {
    let engine = ViralityEngine::new(EngineConfig::default());
    let ctx = engine.acceleration_context();

    let batch: Vec<ContentItem> = (0..4)
        .map(|i| {
            ContentItem::new(format!("sol-{i}"), Source::Twitter, "$SOL update")
                .with_engagement(30, 5, 2)
                .published_at(now() - Duration::minutes(i))
        })
        .collect();

    let first = engine.score_batch(&batch, now(), &ctx);
    assert!(first.iter().all(|s| s.breakdown.acceleration_boost == 0.0));
    for _ in 0..10 {
        assert_eq!(engine.score_batch(&batch, now(), &ctx), first);
    }
    assert_eq!(ctx.acceleration("SOL", now()).recent, 4);
    assert!(ctx.buzzing_tickers(now()).is_empty());

    // a day later the old mentions are gone and the ticker is no longer tracked
    let later = now() + Duration::hours(24);
    ctx.prune(later);
    assert_eq!(ctx.tracked_tickers(), 0);
}
