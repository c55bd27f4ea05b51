// src/item.rs
//! Content records exchanged with collectors (input) and downstream
//! persistence/report stages (output).
//!
//! Raw fields are read-only for the engine. Collectors are not trusted to send
//! clean records: missing, null or mistyped fields are coerced to their
//! defaults, and counters may be negative, fractional or string-encoded.
//! Only an item without a usable `id` is rejected.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(alias = "x", alias = "x.com", alias = "tweet")]
    Twitter,
    #[serde(alias = "subreddit")]
    Reddit,
    #[serde(alias = "tg")]
    Telegram,
    #[serde(alias = "rss")]
    News,
    #[serde(alias = "cryptopanic")]
    Crypto,
    #[default]
    #[serde(other)]
    Other,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Twitter => "twitter",
            Source::Reddit => "reddit",
            Source::Telegram => "telegram",
            Source::News => "news",
            Source::Crypto => "crypto",
            Source::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default, deserialize_with = "lenient_count")]
    pub likes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub reposts: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub replies: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: u64,
}

impl Engagement {
    pub fn new(likes: u64, reposts: u64, replies: u64) -> Self {
        Self {
            likes,
            reposts,
            replies,
            views: 0,
        }
    }

    /// Unweighted interaction count, used to pick exact-duplicate representatives.
    pub fn raw_total(&self) -> u64 {
        self.likes
            .saturating_add(self.reposts)
            .saturating_add(self.replies)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(deserialize_with = "required_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_source")]
    pub source: Source,
    /// Source-specific id (tweet id, reddit fullname, ...), if the collector knows it.
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_engagement")]
    pub engagement: Engagement,
    #[serde(default, deserialize_with = "lenient_followers")]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub payload: Value,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, source: Source, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            external_id: None,
            text: text.into(),
            author: String::new(),
            published_at: None,
            engagement: Engagement::default(),
            follower_count: None,
            payload: Value::Null,
        }
    }

    pub fn with_engagement(mut self, likes: u64, reposts: u64, replies: u64) -> Self {
        self.engagement = Engagement::new(likes, reposts, replies);
        self
    }

    pub fn published_at(mut self, ts: DateTime<Utc>) -> Self {
        self.published_at = Some(ts);
        self
    }

    pub fn with_followers(mut self, followers: u64) -> Self {
        self.follower_count = Some(followers);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// Per-stage values behind a score, for diagnostics and report tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub engagement: f64,
    pub source_weight: f64,
    pub decay_factor: f64,
    pub sentiment_adjustment: f64,
    pub heuristic: f64,
    /// Heuristic after optional model refinements (equals `heuristic` without models).
    pub model_adjusted: f64,
    pub acceleration_boost: f64,
    pub buzzing_tickers: Vec<String>,
}

/// An item enriched by a scoring pass. Derived fields are recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub sentiment_score: f64,
    pub tickers: Vec<String>,
    pub score: f64,
    pub cluster_id: Option<String>,
    /// Id of the exact-duplicate representative this item was merged into.
    pub duplicate_of: Option<String>,
    pub breakdown: ScoreBreakdown,
}

impl ScoredItem {
    /// Unscored wrapper; every derived field starts empty.
    pub fn unscored(item: ContentItem) -> Self {
        Self {
            item,
            sentiment_score: 0.0,
            tickers: Vec::new(),
            score: 0.0,
            cluster_id: None,
            duplicate_of: None,
            breakdown: ScoreBreakdown::default(),
        }
    }

    /// Effective publication time used for ordering (falls back to `now`).
    pub fn effective_published_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.item.published_at.unwrap_or(now)
    }
}

/// Decode collector output element by element. Elements without a usable id
/// are logged and skipped; every other field is coerced.
pub fn items_from_values(values: Vec<Value>) -> Vec<ContentItem> {
    let mut items = Vec::with_capacity(values.len());
    for (idx, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<ContentItem>(v) {
            Ok(it) => items.push(it),
            Err(e) => tracing::warn!(
                target: "scoring",
                index = idx,
                error = %e,
                "skipping input element without a usable id"
            ),
        }
    }
    items
}

fn string_from_value(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    string_from_value(v)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| D::Error::custom("item id must be a non-empty string or number"))
}

fn lenient_string<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(string_from_value(v).unwrap_or_default())
}

fn lenient_opt_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(string_from_value(v).filter(|s| !s.is_empty()))
}

/// Case-insensitive source names and aliases; anything unreadable is `Other`.
fn lenient_source<'de, D>(d: D) -> Result<Source, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => {
            serde_json::from_value(Value::String(s.trim().to_lowercase())).unwrap_or_default()
        }
        _ => Source::Other,
    })
}

fn lenient_engagement<'de, D>(d: D) -> Result<Engagement, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Object(_) => serde_json::from_value(v).unwrap_or_default(),
        _ => Engagement::default(),
    })
}

fn count_from_value(v: &Value) -> u64 {
    match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f.floor() as u64)
                    .unwrap_or(0)
            }
        }
        Value::String(s) => {
            let t = s.trim().replace(',', "");
            t.parse::<u64>().ok().unwrap_or_else(|| {
                t.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f.floor() as u64)
                    .unwrap_or(0)
            })
        }
        _ => 0,
    }
}

fn lenient_count<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(count_from_value(&v))
}

fn lenient_followers<'de, D>(d: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Null => None,
        other => Some(count_from_value(&other)).filter(|n| *n > 0),
    })
}

/// RFC 3339 strings or unix seconds; anything else is treated as missing.
fn lenient_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_counters_default_to_zero() {
        let raw = r#"{
            "id": "a1",
            "source": "twitter",
            "text": "gm",
            "engagement": {"likes": "1,200", "reposts": -5, "replies": null, "views": 12.7}
        }"#;
        let it: ContentItem = serde_json::from_str(raw).unwrap();
        assert_eq!(it.engagement.likes, 1200);
        assert_eq!(it.engagement.reposts, 0);
        assert_eq!(it.engagement.replies, 0);
        assert_eq!(it.engagement.views, 12);
        assert_eq!(it.published_at, None);
        assert_eq!(it.follower_count, None);
    }

    #[test]
    fn missing_engagement_block_is_all_zero() {
        let it: ContentItem =
            serde_json::from_str(r#"{"id":"b","source":"reddit","text":"hi"}"#).unwrap();
        assert_eq!(it.engagement, Engagement::default());
    }

    #[test]
    fn timestamps_accept_rfc3339_and_unix_seconds() {
        let a: ContentItem = serde_json::from_str(
            r#"{"id":"a","source":"news","published_at":"2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        let b: ContentItem =
            serde_json::from_str(r#"{"id":"b","source":"news","published_at":1709294400}"#)
                .unwrap();
        let c: ContentItem =
            serde_json::from_str(r#"{"id":"c","source":"news","published_at":"yesterday"}"#)
                .unwrap();
        assert_eq!(a.published_at, b.published_at);
        assert!(a.published_at.is_some());
        assert_eq!(c.published_at, None);
    }

    #[test]
    fn unknown_source_and_alias() {
        let a: ContentItem = serde_json::from_str(r#"{"id":"a","source":"x"}"#).unwrap();
        let b: ContentItem = serde_json::from_str(r#"{"id":"b","source":"mastodon"}"#).unwrap();
        assert_eq!(a.source, Source::Twitter);
        assert_eq!(b.source, Source::Other);
    }

    #[test]
    fn source_aliases_resolve_to_canonical_sources() {
        for (raw, want) in [
            ("tg", Source::Telegram),
            ("x.com", Source::Twitter),
            ("tweet", Source::Twitter),
            ("subreddit", Source::Reddit),
            ("rss", Source::News),
            ("cryptopanic", Source::Crypto),
            (" Reddit ", Source::Reddit),
        ] {
            let it: ContentItem =
                serde_json::from_value(serde_json::json!({"id": "a", "source": raw})).unwrap();
            assert_eq!(it.source, want, "{raw}");
        }
    }

    #[test]
    fn null_or_missing_fields_fall_back_to_defaults() {
        let it: ContentItem = serde_json::from_str(
            r#"{"id":"n1","text":null,"author":null,"engagement":null,"external_id":null}"#,
        )
        .unwrap();
        assert_eq!(it.source, Source::Other);
        assert_eq!(it.text, "");
        assert_eq!(it.author, "");
        assert_eq!(it.engagement, Engagement::default());
        assert_eq!(it.external_id, None);

        let odd: ContentItem = serde_json::from_str(
            r#"{"id":42,"source":null,"text":7,"engagement":"lots","external_id":991}"#,
        )
        .unwrap();
        assert_eq!(odd.id, "42");
        assert_eq!(odd.source, Source::Other);
        assert_eq!(odd.text, "7");
        assert_eq!(odd.engagement, Engagement::default());
        assert_eq!(odd.external_id.as_deref(), Some("991"));
    }

    #[test]
    fn items_without_usable_id_are_skipped() {
        let values: Vec<Value> = serde_json::from_str(
            r#"[
                {"id":"keep","engagement":null},
                {"source":"twitter","text":"no id"},
                {"id":"  ","text":"blank id"},
                {"id":null},
                "not an object",
                {"id":"also-kept","source":"tg","text":null}
            ]"#,
        )
        .unwrap();
        let items = items_from_values(values);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["keep", "also-kept"]);
        assert_eq!(items[1].source, Source::Telegram);
    }

    #[test]
    fn zero_followers_is_absent() {
        let it: ContentItem =
            serde_json::from_str(r#"{"id":"a","source":"telegram","follower_count":0}"#).unwrap();
        assert_eq!(it.follower_count, None);
    }
}
