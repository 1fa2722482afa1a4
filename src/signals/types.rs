// src/signals/types.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin category of a signal. Finer granularity lives in `sub_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Social,
    Onchain,
    Developer,
    Research,
    Unknown,
}

impl SourceKind {
    /// Permissive parse: unrecognized categories map to `Unknown`,
    /// they never fail normalization.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "social" => Self::Social,
            "onchain" | "on-chain" | "on_chain" => Self::Onchain,
            "developer" | "developer_activity" | "developer-activity" | "github" => {
                Self::Developer
            }
            "research" => Self::Research,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Social => "social",
            Self::Onchain => "onchain",
            Self::Developer => "developer",
            Self::Research => "research",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "bullish" => Self::Positive,
            "negative" | "bearish" => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Derived classification of what kind of evidence a signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    KolSignal,
    TokenActivity,
    DeveloperActivity,
    ResearchInsight,
    General,
}

impl SignalType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "kol_signal" => Self::KolSignal,
            "token_activity" => Self::TokenActivity,
            "developer_activity" => Self::DeveloperActivity,
            "research_insight" => Self::ResearchInsight,
            _ => Self::General,
        }
    }

    /// Fallback classification when the raw record carries no explicit type.
    pub fn from_source(source: SourceKind) -> Self {
        match source {
            SourceKind::Social => Self::KolSignal,
            SourceKind::Onchain => Self::TokenActivity,
            SourceKind::Developer => Self::DeveloperActivity,
            SourceKind::Research => Self::ResearchInsight,
            SourceKind::Unknown => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KolSignal => "kol_signal",
            Self::TokenActivity => "token_activity",
            Self::DeveloperActivity => "developer_activity",
            Self::ResearchInsight => "research_insight",
            Self::General => "general",
        }
    }
}

/// One canonical, deduplicated unit of evidence about ecosystem activity.
/// Created once by the normalizer, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Deterministic fingerprint of (source, sub_source, url-or-name-or-text
    /// prefix); the deduplication key.
    pub id: String,
    pub source: SourceKind,
    pub sub_source: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Best-effort event time; falls back to `collected_at` when the raw
    /// record carries none.
    pub date: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub signal_type: SignalType,

    // Source-specific metrics/identity, present only when the origin
    // supplied them. Never fabricated by the normalizer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Topic with its frequency across a signal set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

/// Aggregate statistics over one signal set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    /// Top 30 topics by descending frequency, ties broken by first
    /// encounter so the ordering is deterministic.
    pub top_topics: Vec<TopicCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateTime<Utc>>,
}

/// Deduplicated signals sorted by `date` descending, plus their stats.
/// Invariant: no two signals share an `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub signals: Vec<Signal>,
    pub stats: SignalStats,
}

impl SignalSet {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }
}
