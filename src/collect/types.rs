// src/collect/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Loosely-structured record as delivered by one source adapter.
///
/// Every field is optional and unknown keys are kept in `extra`; no shape is
/// guaranteed. A `RawRecord` exists only between collection and
/// normalization — the looseness never reaches the canonical `Signal`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub source: Option<String>,
    #[serde(alias = "subSource")]
    pub sub_source: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub date: Option<String>,
    pub topics: Option<Vec<String>>,
    pub sentiment: Option<String>,
    #[serde(alias = "signalType")]
    pub signal_type: Option<String>,
    pub engagement: Option<String>,
    pub stars: Option<i64>,
    #[serde(alias = "marketCap")]
    pub market_cap: Option<f64>,
    pub username: Option<String>,
    pub ticker: Option<String>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One external origin system. Adapters fetch independently and fail
/// independently; the orchestrator never lets one failure abort the rest.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch raw items covering roughly the last `day_range` days.
    /// Implementations should bound their own wall-clock time (client
    /// timeout), so the fan-out is bounded by the slowest adapter.
    async fn fetch(&self, day_range: u32) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &str;
}
