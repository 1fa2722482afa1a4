// src/pipeline.rs
//! Pipeline orchestration: collect → normalize → snapshot → classify →
//! score → enrich → snapshot. One coarse async task per run; stage-local
//! failures (adapters, classifier, enricher) degrade to empty results,
//! storage failures propagate.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::collect::types::SourceAdapter;
use crate::collect::{collect_all, effective_day_range, DEFAULT_DAY_RANGE};
use crate::narrative::{classify_or_empty, ideas_or_empty, IdeaEnricher, Narrative, NarrativeClassifier};
use crate::scoring::score_narratives;
use crate::signals::normalize_all;
use crate::signals::types::SignalSet;
use crate::store::{RunMeta, SnapshotStore};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline stage runs.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when a pipeline stage last completed."
        );
    });
}

fn mark_run(stage: &'static str) {
    ensure_metrics_described();
    counter!("pipeline_runs_total", "stage" => stage).increment(1);
    gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
}

/// Compact result of a collection run; never the full payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub timestamp: DateTime<Utc>,
    pub day_range: u32,
    pub raw_count: usize,
    pub signal_count: usize,
    pub duplicates_dropped: usize,
    pub by_source: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeBrief {
    pub id: String,
    pub name: String,
    pub total_score: u32,
    pub rank: u32,
}

impl From<&Narrative> for NarrativeBrief {
    fn from(n: &Narrative) -> Self {
        Self {
            id: n.id.clone(),
            name: n.name.clone(),
            total_score: n.total_score,
            rank: n.rank,
        }
    }
}

/// Compact result of an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub timestamp: DateTime<Utc>,
    pub signal_count: usize,
    pub narrative_count: usize,
    /// Top narratives by rank, at most three.
    pub top: Vec<NarrativeBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub collection: CollectionSummary,
    pub analysis: AnalysisSummary,
}

pub struct Pipeline {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    classifier: Arc<dyn NarrativeClassifier>,
    enricher: Arc<dyn IdeaEnricher>,
    store: Arc<SnapshotStore>,
    day_range_default: u32,
    enrich_throttle: Duration,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        classifier: Arc<dyn NarrativeClassifier>,
        enricher: Arc<dyn IdeaEnricher>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            adapters,
            classifier,
            enricher,
            store,
            day_range_default: DEFAULT_DAY_RANGE,
            enrich_throttle: Duration::from_millis(500),
        }
    }

    pub fn with_day_range_default(mut self, days: u32) -> Self {
        self.day_range_default = days.max(1);
        self
    }

    /// Pause between consecutive enrichment calls (rate-limit courtesy).
    pub fn with_enrich_throttle(mut self, throttle: Duration) -> Self {
        self.enrich_throttle = throttle;
        self
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Fan out to all adapters, normalize, persist a signal snapshot.
    /// Returns the normalized set alongside the compact summary.
    async fn collect_signals(
        &self,
        days: Option<u32>,
        trigger: &str,
    ) -> Result<(SignalSet, CollectionSummary)> {
        let day_range = effective_day_range(days, self.day_range_default);
        let raws = collect_all(&self.adapters, day_range).await;
        let raw_count = raws.len();

        let set = normalize_all(&raws, Utc::now());
        let snapshot = self.store.save_signal_set(
            &set,
            RunMeta {
                day_range,
                trigger: trigger.to_string(),
            },
        )?;

        let summary = CollectionSummary {
            timestamp: snapshot.timestamp,
            day_range,
            raw_count,
            signal_count: set.len(),
            // Deduplication is the only dropping step in normalization.
            duplicates_dropped: raw_count - set.len(),
            by_source: set.stats.by_source.clone(),
        };
        mark_run("collection");
        tracing::info!(
            raw = raw_count,
            kept = set.len(),
            day_range,
            trigger,
            "collection run complete"
        );
        Ok((set, summary))
    }

    pub async fn run_collection(
        &self,
        days: Option<u32>,
        trigger: &str,
    ) -> Result<CollectionSummary> {
        let (_, summary) = self.collect_signals(days, trigger).await?;
        Ok(summary)
    }

    /// Analyze a signal set: classify, score, enrich, persist. With no set
    /// supplied, the latest stored signals are used; with none stored, the
    /// run proceeds over an empty set (a valid, uninteresting outcome).
    pub async fn run_analysis(&self, signals: Option<SignalSet>) -> Result<AnalysisSummary> {
        let set = match signals {
            Some(s) => s,
            None => self
                .store
                .load_latest_signals()?
                .map(|snap| snap.to_set())
                .unwrap_or_default(),
        };

        let mut narratives = if set.is_empty() {
            Vec::new()
        } else {
            let drafts = classify_or_empty(self.classifier.as_ref(), &set.signals).await;
            score_narratives(drafts, &set.signals)
        };

        // Strictly sequential, throttled enrichment in rank order. Output
        // order stays the scoring rank regardless of enrichment outcomes.
        for (i, narrative) in narratives.iter_mut().enumerate() {
            if i > 0 && !self.enrich_throttle.is_zero() {
                tokio::time::sleep(self.enrich_throttle).await;
            }
            narrative.build_ideas = ideas_or_empty(self.enricher.as_ref(), narrative).await;
        }

        let snapshot = self.store.save_narrative_set(&narratives, &set.stats)?;

        let summary = AnalysisSummary {
            timestamp: snapshot.timestamp,
            signal_count: set.len(),
            narrative_count: narratives.len(),
            top: narratives.iter().take(3).map(NarrativeBrief::from).collect(),
        };
        mark_run("analysis");
        tracing::info!(
            signals = set.len(),
            narratives = narratives.len(),
            "analysis run complete"
        );
        Ok(summary)
    }

    /// Full run: fresh collection feeding straight into analysis.
    pub async fn run_full(&self, days: Option<u32>, trigger: &str) -> Result<RunSummary> {
        let (set, collection) = self.collect_signals(days, trigger).await?;
        let analysis = self.run_analysis(Some(set)).await?;
        Ok(RunSummary {
            collection,
            analysis,
        })
    }
}
