// src/scoring.rs
//! # Scoring Engine
//! Pure, testable logic that maps `(drafts, signals)` → ranked `Narrative`s.
//! No I/O, deterministic given its inputs.
//!
//! The rubric is a fixed, auditable policy: six independently-bounded
//! factors summing to at most 110, each reproducible in `explain_score`.

use std::collections::HashSet;

use crate::narrative::{Narrative, NarrativeDraft, ScoreBreakdown, Stage, Velocity};
use crate::signals::canonical_topic;
use crate::signals::types::Signal;

pub const MAX_TOTAL: u32 = 110;
const MAX_CROSS_SOURCE: u32 = 30;
const MAX_EVIDENCE: u32 = 25;
const MAX_VELOCITY: u32 = 20;
const MAX_STAGE: u32 = 15;
const MAX_CONFIDENCE: u32 = 10;
const MAX_SIGNAL_MATCH: u32 = 10;

/// Classifier confidence assumed when the draft carries none.
const DEFAULT_CONFIDENCE: f64 = 0.5;

fn velocity_points(v: Velocity) -> u32 {
    match v {
        Velocity::Rising => 20,
        Velocity::Stable => 10,
        Velocity::Declining | Velocity::Unknown => 5,
    }
}

fn stage_points(s: Stage) -> u32 {
    match s {
        Stage::Emerging => 15,
        Stage::Accelerating => 12,
        Stage::Maturing | Stage::Unknown => 5,
    }
}

/// Signals sharing at least one topic (case-insensitively) with the
/// narrative's topic set.
fn matching_signal_count(topics: &[String], signals: &[Signal]) -> usize {
    let wanted: HashSet<String> = topics
        .iter()
        .filter_map(|t| canonical_topic(t))
        .collect();
    if wanted.is_empty() {
        return 0;
    }
    signals
        .iter()
        .filter(|s| s.topics.iter().any(|t| wanted.contains(t)))
        .count()
}

fn distinct_source_count(sources: &[String]) -> u32 {
    sources
        .iter()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect::<HashSet<_>>()
        .len() as u32
}

/// Score one draft against the signal evidence. Fallback id keeps drafts
/// addressable even when the classifier omits one.
fn score_one(draft: NarrativeDraft, ordinal: usize, signals: &[Signal]) -> Narrative {
    let stage = Stage::parse(draft.stage.as_deref().unwrap_or_default());
    let velocity = Velocity::parse(draft.velocity.as_deref().unwrap_or_default());
    let confidence = draft.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
    let matching = matching_signal_count(&draft.topics, signals);

    let scores = ScoreBreakdown {
        cross_source: (distinct_source_count(&draft.sources) * 8).min(MAX_CROSS_SOURCE),
        evidence: (draft.evidence.len() as u32 * 8).min(MAX_EVIDENCE),
        velocity: velocity_points(velocity),
        stage: stage_points(stage),
        confidence: (confidence * 10.0).round() as u32,
        signal_match: ((matching / 2) as u32).min(MAX_SIGNAL_MATCH),
    };

    Narrative {
        id: draft
            .id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("narrative-{}", ordinal + 1)),
        name: draft.name,
        description: draft.description,
        evidence: draft.evidence,
        sources: draft.sources,
        topics: draft.topics,
        stage,
        velocity,
        confidence,
        total_score: scores.total(),
        scores,
        matching_signal_count: matching,
        rank: 0, // assigned after sorting
        build_ideas: Vec::new(),
    }
}

/// Score, sort and rank candidate narratives against the signal evidence.
///
/// Sort is stable by `total_score` descending, so equal totals keep their
/// input order. Ranks are 1-based and dense: equal totals share a rank and
/// the next distinct total takes the previous rank + 1.
pub fn score_narratives(drafts: Vec<NarrativeDraft>, signals: &[Signal]) -> Vec<Narrative> {
    let mut scored: Vec<Narrative> = drafts
        .into_iter()
        .enumerate()
        .map(|(i, d)| score_one(d, i, signals))
        .collect();

    scored.sort_by(|a, b| b.total_score.cmp(&a.total_score));

    let mut rank = 0u32;
    let mut prev_total = None;
    for n in scored.iter_mut() {
        if prev_total != Some(n.total_score) {
            rank += 1;
            prev_total = Some(n.total_score);
        }
        n.rank = rank;
    }
    scored
}

/// Human-readable reproduction of the per-factor breakdown, with the
/// numerator/denominator for each factor and the grand total out of 110.
pub fn explain_score(n: &Narrative) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\"{}\" — rank {}, total {}/{}\n",
        n.name, n.rank, n.total_score, MAX_TOTAL
    ));
    out.push_str(&format!(
        "  cross-source strength: {}/{} ({} distinct sources x 8)\n",
        n.scores.cross_source,
        MAX_CROSS_SOURCE,
        distinct_source_count(&n.sources)
    ));
    out.push_str(&format!(
        "  evidence quality: {}/{} ({} evidence points x 8)\n",
        n.scores.evidence,
        MAX_EVIDENCE,
        n.evidence.len()
    ));
    out.push_str(&format!(
        "  velocity: {}/{} ({:?})\n",
        n.scores.velocity, MAX_VELOCITY, n.velocity
    ));
    out.push_str(&format!(
        "  stage: {}/{} ({:?})\n",
        n.scores.stage, MAX_STAGE, n.stage
    ));
    out.push_str(&format!(
        "  ai confidence: {}/{} ({:.2})\n",
        n.scores.confidence, MAX_CONFIDENCE, n.confidence
    ));
    out.push_str(&format!(
        "  signal match: {}/{} ({} matching signals / 2)\n",
        n.scores.signal_match, MAX_SIGNAL_MATCH, n.matching_signal_count
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::types::RawRecord;
    use crate::signals::normalize;
    use chrono::Utc;

    fn draft(name: &str) -> NarrativeDraft {
        NarrativeDraft {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn signal_with_topics(name: &str, topics: &[&str]) -> Signal {
        let raw = RawRecord {
            source: Some("social".into()),
            name: Some(name.into()),
            topics: Some(topics.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        };
        normalize(&raw, Utc::now())
    }

    #[test]
    fn reference_scenario_totals_85() {
        let d = NarrativeDraft {
            name: "Reference".into(),
            sources: vec!["social".into(), "onchain".into()],
            evidence: vec!["a".into(), "b".into(), "c".into()],
            velocity: Some("rising".into()),
            stage: Some("emerging".into()),
            confidence: Some(0.8),
            topics: vec!["restaking".into()],
            ..Default::default()
        };
        let signals = vec![
            signal_with_topics("s1", &["restaking"]),
            signal_with_topics("s2", &["restaking", "defi"]),
            signal_with_topics("s3", &["restaking"]),
            signal_with_topics("s4", &["restaking"]),
            signal_with_topics("s5", &["unrelated"]),
        ];

        let out = score_narratives(vec![d], &signals);
        let n = &out[0];
        assert_eq!(n.scores.cross_source, 16);
        assert_eq!(n.scores.evidence, 24);
        assert_eq!(n.scores.velocity, 20);
        assert_eq!(n.scores.stage, 15);
        assert_eq!(n.scores.confidence, 8);
        assert_eq!(n.matching_signal_count, 4);
        assert_eq!(n.scores.signal_match, 2);
        assert_eq!(n.total_score, 85);
        assert_eq!(n.rank, 1);
    }

    #[test]
    fn factors_stay_within_caps() {
        let d = NarrativeDraft {
            name: "Maxed".into(),
            sources: (0..10).map(|i| format!("src{i}")).collect(),
            evidence: (0..10).map(|i| format!("ev{i}")).collect(),
            velocity: Some("rising".into()),
            stage: Some("emerging".into()),
            confidence: Some(4.2), // clamped to 1.0
            topics: vec!["hot".into()],
            ..Default::default()
        };
        let signals: Vec<Signal> = (0..100)
            .map(|i| signal_with_topics(&format!("s{i}"), &["hot"]))
            .collect();

        let n = &score_narratives(vec![d], &signals)[0];
        assert_eq!(n.scores.cross_source, 30);
        assert_eq!(n.scores.evidence, 25);
        assert_eq!(n.scores.confidence, 10);
        assert_eq!(n.scores.signal_match, 10);
        assert_eq!(n.total_score, n.scores.total());
        assert!(n.total_score <= MAX_TOTAL);
        assert_eq!(n.total_score, 110);
    }

    #[test]
    fn missing_attributes_fall_back_to_defaults() {
        let n = &score_narratives(vec![draft("bare")], &[])[0];
        assert_eq!(n.scores.velocity, 5);
        assert_eq!(n.scores.stage, 5);
        assert_eq!(n.scores.confidence, 5); // round(0.5 * 10)
        assert_eq!(n.scores.cross_source, 0);
        assert_eq!(n.scores.signal_match, 0);
        assert_eq!(n.id, "narrative-1");
    }

    #[test]
    fn ranking_is_dense_and_ties_keep_input_order() {
        let strong = NarrativeDraft {
            name: "strong".into(),
            velocity: Some("rising".into()),
            ..Default::default()
        };
        let out = score_narratives(
            vec![draft("tie-a"), strong, draft("tie-b")],
            &[],
        );
        assert_eq!(out[0].name, "strong");
        assert_eq!(out[0].rank, 1);
        assert_eq!(out[1].name, "tie-a");
        assert_eq!(out[2].name, "tie-b");
        assert_eq!(out[1].rank, 2);
        assert_eq!(out[2].rank, 2);
        for pair in out.windows(2) {
            assert!(pair[0].total_score >= pair[1].total_score);
        }
    }

    #[test]
    fn topic_matching_is_case_insensitive() {
        let d = NarrativeDraft {
            name: "case".into(),
            topics: vec!["DeFi".into()],
            ..Default::default()
        };
        let signals = vec![signal_with_topics("s", &["defi"])];
        let n = &score_narratives(vec![d], &signals)[0];
        assert_eq!(n.matching_signal_count, 1);
    }

    #[test]
    fn explain_reproduces_breakdown() {
        let d = NarrativeDraft {
            name: "Explained".into(),
            sources: vec!["social".into()],
            evidence: vec!["one".into()],
            confidence: Some(0.8),
            ..Default::default()
        };
        let n = &score_narratives(vec![d], &[])[0];
        let report = explain_score(n);
        assert!(report.contains(&format!("total {}/110", n.total_score)));
        assert!(report.contains("cross-source strength: 8/30 (1 distinct sources x 8)"));
        assert!(report.contains("evidence quality: 8/25 (1 evidence points x 8)"));
        assert!(report.contains("ai confidence: 8/10 (0.80)"));
        assert!(report.contains("signal match: 0/10 (0 matching signals / 2)"));
    }
}
