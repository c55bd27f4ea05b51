// src/main.rs
//! virality-engine: command-line driver.
//!
//! Reads a JSON array of content items from a file (or stdin), scores and
//! clusters them, and writes a JSON report to stdout:
//! `{ "items": [...], "clusters": [...], "buzzing": [...] }`.
//!
//! Logs go to stderr. `--metrics` appends the Prometheus exposition text to
//! stderr after the report.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use virality_engine::{
    config, items_from_values, telemetry, Acceleration, Cluster, ContentItem, ScoredItem,
    ViralityEngine,
};

const USAGE: &str = "usage: virality-engine [--metrics] [--now <RFC3339>] [FILE | -]";

#[derive(Serialize)]
struct Report {
    items: Vec<ScoredItem>,
    clusters: Vec<Cluster>,
    buzzing: Vec<Acceleration>,
}

#[derive(Debug, Default)]
struct Args {
    input: Option<PathBuf>,
    metrics: bool,
    now: Option<DateTime<Utc>>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--metrics" => args.metrics = true,
            "--now" => {
                let v = it.next().context("--now needs a timestamp")?;
                let ts = DateTime::parse_from_rfc3339(&v)
                    .with_context(|| format!("--now: invalid RFC3339 timestamp {v:?}"))?;
                args.now = Some(ts.with_timezone(&Utc));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-" => args.input = None,
            flag if flag.starts_with('-') => bail!("unknown flag {flag}\n{USAGE}"),
            path => {
                if args.input.is_some() {
                    bail!("only one input file is accepted\n{USAGE}");
                }
                args.input = Some(PathBuf::from(path));
            }
        }
    }
    Ok(args)
}

/// Compact logs to stderr, or JSON lines when VIRALITY_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scoring=info,model=info,config=info,warn"));
    let json = std::env::var("VIRALITY_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("reading {}", p.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

/// Elements that are not content items at all (no id, wrong shape) are
/// reported and skipped; field-level problems are absorbed by the item parser.
fn parse_items(raw: &str) -> Result<Vec<ContentItem>> {
    let values: Vec<Value> =
        serde_json::from_str(raw).context("input must be a JSON array of content items")?;
    Ok(items_from_values(values))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; VIRALITY_CONFIG_PATH and RUST_LOG may come from there.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = parse_args()?;
    let prometheus = if args.metrics {
        Some(telemetry::install_prometheus()?)
    } else {
        None
    };

    let cfg = config::load_default()?;
    let items = parse_items(&read_input(args.input.as_ref()).await?)?;
    let now = args.now.unwrap_or_else(Utc::now);

    let engine = Arc::new(ViralityEngine::new(cfg));
    let ctx = engine.acceleration_context();
    let mut scored = Arc::clone(&engine)
        .score_batch_concurrent(items, now, &ctx)
        .await;

    let mut clusterer = engine.clusterer();
    clusterer.assign(&mut scored);

    let report = Report {
        items: scored,
        clusters: clusterer.clusters(),
        buzzing: ctx.buzzing_tickers(now),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }
    Ok(())
}
