// src/text.rs
//! Text canonicalization used before any comparison or model feature extraction.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());
static RE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)@\w+").unwrap());
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());

/// Lowercase; decode HTML entities; strip tags, URLs, @mentions and punctuation
/// noise; collapse whitespace.
pub fn canonicalize(s: &str) -> String {
    // 1) HTML entity decode + tag strip
    let decoded = html_escape::decode_html_entities(s);
    let out = RE_TAGS.replace_all(&decoded, " ");

    // 2) URLs and mentions carry no topic signal
    let out = RE_URL.replace_all(&out, " ");
    let out = RE_MENTION.replace_all(&out, " ");

    // 3) Keep word characters only, lowercased
    let mut buf = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch.is_alphanumeric() {
            buf.extend(ch.to_lowercase());
        } else {
            buf.push(' ');
        }
    }

    // 4) Collapse whitespace
    buf.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace tokens of already canonical text.
pub fn tokens(canonical: &str) -> Vec<&str> {
    canonical.split_whitespace().collect()
}
