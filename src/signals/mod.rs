// src/signals/mod.rs
pub mod types;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::collect::types::RawRecord;
use crate::signals::types::{
    Sentiment, Signal, SignalSet, SignalStats, SignalType, SourceKind, TopicCount,
};

/// How many of the most frequent topics the stats report.
const TOP_TOPICS: usize = 30;
/// Topic tokens at or above this length are dropped as junk.
const MAX_TOPIC_LEN: usize = 50;
/// Text prefix length used in the fingerprint when url/name are absent.
const FINGERPRINT_TEXT_PREFIX: usize = 50;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "signals_kept_total",
            "Signals kept after normalization + deduplication."
        );
        describe_counter!(
            "signals_dedup_total",
            "Raw records dropped as fingerprint duplicates."
        );
    });
}

/// Canonicalize one topic tag: lower-case, trim, collapse internal
/// whitespace to underscores. Returns `None` for empty or over-length
/// tokens.
pub fn canonical_topic(raw: &str) -> Option<String> {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));

    let t = raw.trim().to_lowercase();
    let t = re_ws.replace_all(&t, "_").to_string();
    if t.is_empty() || t.chars().count() >= MAX_TOPIC_LEN {
        return None;
    }
    Some(t)
}

fn canonical_topics(raw: Option<&[String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for t in raw.unwrap_or_default() {
        if let Some(c) = canonical_topic(t) {
            if seen.insert(c.clone()) {
                out.push(c);
            }
        }
    }
    out
}

/// Deterministic fingerprint of (source, sub_source, url-or-name-or-text
/// prefix). Identical logical content from the same origin always hashes to
/// the same id, regardless of call order.
pub fn fingerprint(source: SourceKind, sub_source: &str, raw: &RawRecord) -> String {
    let text_prefix;
    let basis: &str = if let Some(u) = raw.url.as_deref().filter(|s| !s.is_empty()) {
        u
    } else if let Some(n) = raw.name.as_deref().filter(|s| !s.is_empty()) {
        n
    } else if let Some(t) = raw.title.as_deref().filter(|s| !s.is_empty()) {
        t
    } else {
        let text = raw.text.as_deref().unwrap_or_default();
        text_prefix = text.chars().take(FINGERPRINT_TEXT_PREFIX).collect::<String>();
        &text_prefix
    };

    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(sub_source.as_bytes());
    hasher.update(b"|");
    hasher.update(basis.as_bytes());
    let digest = hasher.finalize();

    // 8 bytes of the digest as 16 hex chars: short, fixed radix, stable.
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_date(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return dt.and_utc();
        }
    }
    fallback
}

/// Map one raw record to the canonical shape. Total: every missing or
/// malformed field gets a default instead of an error.
pub fn normalize(raw: &RawRecord, collected_at: DateTime<Utc>) -> Signal {
    let source = SourceKind::parse(raw.source.as_deref().unwrap_or("unknown"));
    let sub_source = raw
        .sub_source
        .as_deref()
        .unwrap_or("unknown")
        .trim()
        .to_string();

    let title = raw
        .title
        .as_deref()
        .or(raw.name.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string();

    let signal_type = match raw.signal_type.as_deref() {
        Some(s) if !s.trim().is_empty() => SignalType::parse(s),
        _ => SignalType::from_source(source),
    };

    Signal {
        id: fingerprint(source, &sub_source, raw),
        source,
        sub_source,
        title,
        text: raw.text.as_deref().unwrap_or_default().trim().to_string(),
        url: raw.url.clone().filter(|u| !u.is_empty()),
        date: parse_date(raw.date.as_deref(), collected_at),
        collected_at,
        topics: canonical_topics(raw.topics.as_deref()),
        sentiment: raw
            .sentiment
            .as_deref()
            .map(Sentiment::parse)
            .unwrap_or_default(),
        signal_type,
        engagement: raw.engagement.clone(),
        stars: raw.stars,
        market_cap: raw.market_cap,
        username: raw.username.clone(),
        ticker: raw.ticker.clone(),
        address: raw.address.clone(),
    }
}

/// Normalize every record and deduplicate by first-seen fingerprint.
/// Later duplicates are dropped wholesale, not merged; returns the number
/// dropped.
pub fn normalize_dedup(
    raws: &[RawRecord],
    collected_at: DateTime<Utc>,
) -> (Vec<Signal>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(raws.len());
    let mut kept = Vec::with_capacity(raws.len());
    let mut dropped = 0usize;

    for raw in raws {
        let sig = normalize(raw, collected_at);
        if seen.insert(sig.id.clone()) {
            kept.push(sig);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

/// Full normalization pass: dedup, sort by date descending (stable, so
/// first-seen order survives among equal dates), compute stats.
pub fn normalize_all(raws: &[RawRecord], collected_at: DateTime<Utc>) -> SignalSet {
    ensure_metrics_described();

    let (mut signals, dropped) = normalize_dedup(raws, collected_at);
    signals.sort_by(|a, b| b.date.cmp(&a.date));

    counter!("signals_kept_total").increment(signals.len() as u64);
    counter!("signals_dedup_total").increment(dropped as u64);
    if dropped > 0 {
        tracing::debug!(dropped, kept = signals.len(), "deduplicated raw records");
    }

    let stats = signal_stats(&signals);
    SignalSet { signals, stats }
}

/// Aggregate statistics, O(n) in the signal count.
pub fn signal_stats(signals: &[Signal]) -> SignalStats {
    let mut stats = SignalStats {
        total: signals.len(),
        ..Default::default()
    };

    // (count, first-seen index) per topic for a deterministic tie-break.
    let mut topic_freq: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut next_idx = 0usize;

    for sig in signals {
        *stats
            .by_source
            .entry(sig.source.as_str().to_string())
            .or_default() += 1;
        *stats
            .by_type
            .entry(sig.signal_type.as_str().to_string())
            .or_default() += 1;

        for topic in &sig.topics {
            let entry = topic_freq.entry(topic.as_str()).or_insert_with(|| {
                let idx = next_idx;
                next_idx += 1;
                (0, idx)
            });
            entry.0 += 1;
        }

        stats.earliest = Some(match stats.earliest {
            Some(e) if e <= sig.date => e,
            _ => sig.date,
        });
        stats.latest = Some(match stats.latest {
            Some(l) if l >= sig.date => l,
            _ => sig.date,
        });
    }

    let mut topics: Vec<(&str, usize, usize)> = topic_freq
        .into_iter()
        .map(|(t, (count, idx))| (t, count, idx))
        .collect();
    topics.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    stats.top_topics = topics
        .into_iter()
        .take(TOP_TOPICS)
        .map(|(t, count, _)| TopicCount {
            topic: t.to_string(),
            count,
        })
        .collect();

    stats
}
