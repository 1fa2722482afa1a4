// src/api.rs
//
// Read/write HTTP views over the engine's stored outputs. Aggregate GET
// endpoints return a labeled empty result when nothing has been stored
// yet; trigger endpoints return a success flag plus message or error text,
// never a stack trace.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::narrative::Narrative;
use crate::pipeline::{AnalysisSummary, CollectionSummary, NarrativeBrief, Pipeline, RunSummary};
use crate::scoring::explain_score;
use crate::signals::types::{Signal, SignalSet, SignalStats};
use crate::store::{SnapshotStore, StorageStats};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub pipeline: Arc<Pipeline>,
    pub started_at: Instant,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/narratives", get(get_narratives))
        .route("/api/narratives/{id}", get(get_narrative))
        .route("/api/signals", get(get_signals))
        .route("/api/stats", get(get_stats))
        .route("/api/history", get(get_history))
        .route("/api/collect", post(trigger_collect))
        .route("/api/analyze", post(trigger_analyze))
        .route("/api/run", post(trigger_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn internal_error(e: anyhow::Error) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!(error = ?e, "api storage error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    )
}

// ---- liveness ----

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    uptime_secs: u64,
    storage: StorageStats,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.storage_stats() {
        Ok(storage) => Json(HealthResp {
            status: "ok",
            uptime_secs: state.started_at.elapsed().as_secs(),
            storage,
        })
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

// ---- narratives ----

#[derive(Serialize)]
struct NarrativesResp {
    empty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    count: usize,
    narratives: Vec<Narrative>,
}

async fn get_narratives(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.load_latest_narratives() {
        Ok(Some(snap)) => Json(NarrativesResp {
            empty: false,
            timestamp: Some(snap.timestamp),
            count: snap.count,
            narratives: snap.narratives,
        })
        .into_response(),
        // No analysis has run yet: an empty result, not a 404.
        Ok(None) => Json(NarrativesResp {
            empty: true,
            timestamp: None,
            count: 0,
            narratives: Vec::new(),
        })
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

#[derive(Serialize)]
struct NarrativeResp {
    narrative: Narrative,
    explanation: String,
}

async fn get_narrative(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.load_latest_narratives() {
        Ok(snap) => {
            let found = snap
                .into_iter()
                .flat_map(|s| s.narratives)
                .find(|n| n.id == id);
            match found {
                Some(narrative) => {
                    let explanation = explain_score(&narrative);
                    Json(NarrativeResp {
                        narrative,
                        explanation,
                    })
                    .into_response()
                }
                None => (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({ "error": format!("no narrative with id '{id}'") })),
                )
                    .into_response(),
            }
        }
        Err(e) => internal_error(e).into_response(),
    }
}

// ---- signals ----

#[derive(Deserialize)]
struct SignalsQuery {
    source: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SignalsResp {
    empty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    /// Signals in the latest snapshot before filtering/truncation.
    total: usize,
    count: usize,
    signals: Vec<Signal>,
}

async fn get_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalsQuery>,
) -> impl IntoResponse {
    match state.store.load_latest_signals() {
        Ok(Some(snap)) => {
            let total = snap.count;
            let limit = q.limit.unwrap_or(50);
            let signals: Vec<Signal> = snap
                .signals
                .into_iter()
                .filter(|s| match q.source.as_deref() {
                    Some(want) => s.source.as_str().eq_ignore_ascii_case(want.trim()),
                    None => true,
                })
                .take(limit)
                .collect();
            Json(SignalsResp {
                empty: false,
                timestamp: Some(snap.timestamp),
                total,
                count: signals.len(),
                signals,
            })
            .into_response()
        }
        Ok(None) => Json(SignalsResp {
            empty: true,
            timestamp: None,
            total: 0,
            count: 0,
            signals: Vec::new(),
        })
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

// ---- combined stats ----

#[derive(Serialize)]
struct StatsResp {
    storage: StorageStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal_stats: Option<SignalStats>,
    narrative_count: usize,
    top_narratives: Vec<NarrativeBrief>,
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let storage = match state.store.storage_stats() {
        Ok(s) => s,
        Err(e) => return internal_error(e).into_response(),
    };
    let signal_stats = match state.store.load_latest_signals() {
        Ok(snap) => snap.map(|s| s.stats),
        Err(e) => return internal_error(e).into_response(),
    };
    let (narrative_count, top_narratives) = match state.store.load_latest_narratives() {
        Ok(Some(snap)) => (
            snap.count,
            snap.narratives.iter().take(3).map(NarrativeBrief::from).collect(),
        ),
        Ok(None) => (0, Vec::new()),
        Err(e) => return internal_error(e).into_response(),
    };
    Json(StatsResp {
        storage,
        signal_stats,
        narrative_count,
        top_narratives,
    })
    .into_response()
}

// ---- history ----

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryEntry {
    timestamp: DateTime<Utc>,
    count: usize,
    /// Top three narratives by rank.
    top: Vec<NarrativeBrief>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = q.limit.unwrap_or(5).min(50);
    match state.store.load_narrative_history(limit) {
        Ok(snaps) => {
            let entries: Vec<HistoryEntry> = snaps
                .into_iter()
                .map(|s| HistoryEntry {
                    timestamp: s.timestamp,
                    count: s.count,
                    // Narratives are stored in rank order.
                    top: s.narratives.iter().take(3).map(NarrativeBrief::from).collect(),
                })
                .collect();
            Json(serde_json::json!({ "count": entries.len(), "snapshots": entries }))
                .into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

// ---- triggers ----

#[derive(Deserialize)]
struct TriggerQuery {
    days: Option<u32>,
}

#[derive(Serialize)]
struct TriggerResp {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<CollectionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisSummary>,
}

impl TriggerResp {
    fn failure(e: anyhow::Error) -> (StatusCode, Json<TriggerResp>) {
        tracing::error!(error = ?e, "trigger run failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TriggerResp {
                success: false,
                message: "run failed".to_string(),
                error: Some(e.to_string()),
                collection: None,
                analysis: None,
            }),
        )
    }
}

async fn trigger_collect(
    State(state): State<AppState>,
    Query(q): Query<TriggerQuery>,
) -> impl IntoResponse {
    match state.pipeline.run_collection(q.days, "api").await {
        Ok(summary) => Json(TriggerResp {
            success: true,
            message: format!(
                "collected {} signals ({} duplicates dropped)",
                summary.signal_count, summary.duplicates_dropped
            ),
            error: None,
            collection: Some(summary),
            analysis: None,
        })
        .into_response(),
        Err(e) => TriggerResp::failure(e).into_response(),
    }
}

async fn trigger_analyze(
    State(state): State<AppState>,
    body: Option<Json<Vec<Signal>>>,
) -> impl IntoResponse {
    // Signals may be supplied inline; otherwise the latest stored set is
    // analyzed.
    let supplied = body
        .map(|Json(signals)| SignalSet {
            stats: crate::signals::signal_stats(&signals),
            signals,
        })
        .filter(|set| !set.is_empty());
    match state.pipeline.run_analysis(supplied).await {
        Ok(summary) => Json(TriggerResp {
            success: true,
            message: format!(
                "analyzed {} signals into {} narratives",
                summary.signal_count, summary.narrative_count
            ),
            error: None,
            collection: None,
            analysis: Some(summary),
        })
        .into_response(),
        Err(e) => TriggerResp::failure(e).into_response(),
    }
}

async fn trigger_run(
    State(state): State<AppState>,
    Query(q): Query<TriggerQuery>,
) -> impl IntoResponse {
    match state.pipeline.run_full(q.days, "api").await {
        Ok(RunSummary {
            collection,
            analysis,
        }) => Json(TriggerResp {
            success: true,
            message: format!(
                "full run: {} signals, {} narratives",
                collection.signal_count, analysis.narrative_count
            ),
            error: None,
            collection: Some(collection),
            analysis: Some(analysis),
        })
        .into_response(),
        Err(e) => TriggerResp::failure(e).into_response(),
    }
}
