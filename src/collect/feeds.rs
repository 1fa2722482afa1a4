// src/collect/feeds.rs
//
// Generic feed adapter: fetches a JSON array of raw records from a
// configured endpoint. Source-specific clients live outside this crate;
// anything that can serve `[{...}, {...}]` plugs in through here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::collect::types::{RawRecord, SourceAdapter};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct JsonFeedAdapter {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl JsonFeedAdapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        // Per-adapter timeout bounds the orchestrator's wall-clock time.
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl SourceAdapter for JsonFeedAdapter {
    async fn fetch(&self, day_range: u32) -> Result<Vec<RawRecord>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("days", day_range)])
            .send()
            .await
            .with_context(|| format!("feed '{}' get {}", self.name, self.url))?;

        let records: Vec<RawRecord> = resp
            .error_for_status()
            .with_context(|| format!("feed '{}' status", self.name))?
            .json()
            .await
            .with_context(|| format!("feed '{}' decoding json body", self.name))?;
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
