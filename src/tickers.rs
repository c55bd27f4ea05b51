// src/tickers.rs
//! Ticker extraction: cashtags like `$SOL` plus configured bare symbols (`BTC`).
//!
//! Returns distinct, uppercase symbols without the `$`, sorted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

// First char must be a letter so dollar amounts ("$100", "$5k") are skipped.
static RE_CASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z][A-Za-z0-9]{1,9})\b").unwrap());

static RE_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z][A-Z0-9]{1,9})\b").unwrap());

#[derive(Debug, Clone, Default)]
pub struct TickerExtractor {
    known: HashSet<String>,
}

impl TickerExtractor {
    pub fn new<I, S>(known_symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            known: known_symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut out = BTreeSet::new();

        for caps in RE_CASHTAG.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                out.insert(m.as_str().to_ascii_uppercase());
            }
        }

        if !self.known.is_empty() {
            for caps in RE_BARE.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    if self.known.contains(m.as_str()) {
                        out.insert(m.as_str().to_string());
                    }
                }
            }
        }

        out.into_iter().collect()
    }
}
