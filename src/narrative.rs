// src/narrative.rs
//
// Narrative model plus the two opaque collaborator boundaries (clustering
// and idea generation). Both collaborators are AI-backed and unreliable:
// the engine validates their output defensively and substitutes empty
// results on failure rather than aborting a run.

use anyhow::Result;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::signals::types::Signal;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "classify_errors_total",
            "Classifier failures substituted with an empty narrative list."
        );
        describe_counter!(
            "enrich_errors_total",
            "Enricher failures substituted with zero build ideas."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Emerging,
    Accelerating,
    Maturing,
    Unknown,
}

impl Stage {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "emerging" => Self::Emerging,
            "accelerating" => Self::Accelerating,
            "maturing" => Self::Maturing,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Velocity {
    Rising,
    Stable,
    Declining,
    Unknown,
}

impl Velocity {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "rising" => Self::Rising,
            "stable" => Self::Stable,
            "declining" => Self::Declining,
            _ => Self::Unknown,
        }
    }
}

/// Candidate cluster as returned by the external classifier. Permissive on
/// purpose: no schema contract is enforced by the collaborator, so every
/// field defaults rather than failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeDraft {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub sources: Vec<String>,
    pub topics: Vec<String>,
    pub stage: Option<String>,
    pub velocity: Option<String>,
    pub confidence: Option<f64>,
}

/// Named per-factor point breakdown. Every point of `total_score` is
/// traceable to exactly one of these six factors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cross_source: u32,
    pub evidence: u32,
    pub velocity: u32,
    pub stage: u32,
    pub confidence: u32,
    pub signal_match: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.cross_source
            + self.evidence
            + self.velocity
            + self.stage
            + self.confidence
            + self.signal_match
    }
}

/// Externally generated descriptive build idea attached to a narrative.
/// Annotation only: never affects scoring or ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildIdea {
    pub title: String,
    pub description: String,
}

/// A thematic cluster, scored and ranked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narrative {
    pub id: String,
    pub name: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub sources: Vec<String>,
    pub topics: Vec<String>,
    pub stage: Stage,
    pub velocity: Velocity,
    /// Classifier confidence in [0,1].
    pub confidence: f64,
    pub scores: ScoreBreakdown,
    /// Sum of the six factors, at most 110.
    pub total_score: u32,
    pub matching_signal_count: usize,
    /// 1-based dense rank by `total_score` descending.
    pub rank: u32,
    #[serde(default)]
    pub build_ideas: Vec<BuildIdea>,
}

/// External clustering step. Opaque to the engine.
#[async_trait::async_trait]
pub trait NarrativeClassifier: Send + Sync {
    async fn classify(&self, signals: &[Signal]) -> Result<Vec<NarrativeDraft>>;
}

/// External idea-generation step. Opaque to the engine.
#[async_trait::async_trait]
pub trait IdeaEnricher: Send + Sync {
    async fn ideas(&self, narrative: &Narrative) -> Result<Vec<BuildIdea>>;
}

/// Classifier call with failure isolation: an error becomes an empty
/// narrative list plus a warn, never a run abort.
pub async fn classify_or_empty(
    classifier: &dyn NarrativeClassifier,
    signals: &[Signal],
) -> Vec<NarrativeDraft> {
    ensure_metrics_described();
    match classifier.classify(signals).await {
        Ok(drafts) => drafts,
        Err(e) => {
            tracing::warn!(error = ?e, "classifier error, continuing with zero narratives");
            counter!("classify_errors_total").increment(1);
            Vec::new()
        }
    }
}

/// Enricher call with failure isolation: an error becomes zero ideas for
/// that one narrative.
pub async fn ideas_or_empty(enricher: &dyn IdeaEnricher, narrative: &Narrative) -> Vec<BuildIdea> {
    ensure_metrics_described();
    match enricher.ideas(narrative).await {
        Ok(ideas) => ideas,
        Err(e) => {
            tracing::warn!(error = ?e, narrative = %narrative.id, "enricher error, zero ideas");
            counter!("enrich_errors_total").increment(1);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_deserializes_from_sparse_json() {
        let draft: NarrativeDraft =
            serde_json::from_str(r#"{"name":"Restaking"}"#).expect("sparse draft");
        assert_eq!(draft.name, "Restaking");
        assert!(draft.evidence.is_empty());
        assert!(draft.confidence.is_none());
    }

    #[test]
    fn stage_and_velocity_parse_permissively() {
        assert_eq!(Stage::parse("Emerging"), Stage::Emerging);
        assert_eq!(Stage::parse("whatever"), Stage::Unknown);
        assert_eq!(Velocity::parse(" rising "), Velocity::Rising);
        assert_eq!(Velocity::parse(""), Velocity::Unknown);
    }
}
