// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/narratives (empty state + populated)
// - GET /api/narratives/{id}
// - GET /api/signals (source filter + limit)
// - GET /api/stats, GET /api/history
// - POST /api/run

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use narrative_radar::api::{create_router, AppState};
use narrative_radar::collect::types::{RawRecord, SourceAdapter};
use narrative_radar::narrative::{
    BuildIdea, IdeaEnricher, Narrative, NarrativeClassifier, NarrativeDraft,
};
use narrative_radar::pipeline::Pipeline;
use narrative_radar::signals::types::Signal;
use narrative_radar::store::SnapshotStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn raw(source: &str, name: &str, topics: &[&str]) -> RawRecord {
    RawRecord {
        source: Some(source.to_string()),
        name: Some(name.to_string()),
        topics: Some(topics.iter().map(|t| t.to_string()).collect()),
        ..Default::default()
    }
}

struct StubAdapter {
    records: Vec<RawRecord>,
}

#[async_trait::async_trait]
impl SourceAdapter for StubAdapter {
    async fn fetch(&self, _day_range: u32) -> anyhow::Result<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
    fn name(&self) -> &str {
        "stub"
    }
}

struct StubClassifier;

#[async_trait::async_trait]
impl NarrativeClassifier for StubClassifier {
    async fn classify(&self, _signals: &[Signal]) -> anyhow::Result<Vec<NarrativeDraft>> {
        Ok(vec![NarrativeDraft {
            id: Some("restaking-wave".into()),
            name: "Restaking wave".into(),
            description: "Restaking shows up across origins".into(),
            evidence: vec!["ev1".into(), "ev2".into()],
            sources: vec!["social".into(), "onchain".into()],
            topics: vec!["restaking".into()],
            stage: Some("emerging".into()),
            velocity: Some("rising".into()),
            confidence: Some(0.8),
        }])
    }
}

struct StubEnricher;

#[async_trait::async_trait]
impl IdeaEnricher for StubEnricher {
    async fn ideas(&self, _narrative: &Narrative) -> anyhow::Result<Vec<BuildIdea>> {
        Ok(vec![BuildIdea {
            title: "dashboard".into(),
            description: "track restaking flows".into(),
        }])
    }
}

/// Build the same Router shape the binary uses, on a temp store.
fn test_router(tmp: &tempfile::TempDir) -> Router {
    let store = Arc::new(SnapshotStore::open(tmp.path()).expect("open store"));
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(StubAdapter {
            records: vec![
                raw("social", "alice", &["restaking"]),
                raw("onchain", "0xdeed", &["restaking", "defi"]),
                raw("developer", "acme/engine", &["infra"]),
            ],
        }),
    ];
    let pipeline = Arc::new(
        Pipeline::new(
            adapters,
            Arc::new(StubClassifier),
            Arc::new(StubEnricher),
            Arc::clone(&store),
        )
        .with_enrich_throttle(Duration::ZERO),
    );
    create_router(AppState {
        store,
        pipeline,
        started_at: Instant::now(),
    })
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    (status, v)
}

async fn post_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    (status, v)
}

#[tokio::test]
async fn health_reports_storage_counters() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let app = test_router(&tmp);

    let (status, v) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "ok");
    assert_eq!(v["storage"]["signal_snapshots"], 0);
    assert!(v.get("uptime_secs").is_some());
}

#[tokio::test]
async fn empty_state_returns_labeled_empty_not_404() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let app = test_router(&tmp);

    let (status, v) = get_json(&app, "/api/narratives").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["empty"], true);
    assert_eq!(v["count"], 0);

    let (status, v) = get_json(&app, "/api/signals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["empty"], true);
}

#[tokio::test]
async fn full_run_populates_all_read_endpoints() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let app = test_router(&tmp);

    let (status, v) = post_json(&app, "/api/run?days=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["collection"]["signal_count"], 3);
    assert_eq!(v["collection"]["day_range"], 7);
    assert_eq!(v["analysis"]["narrative_count"], 1);

    // Narratives carry score, rank and build ideas.
    let (status, v) = get_json(&app, "/api/narratives").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["empty"], false);
    assert_eq!(v["count"], 1);
    let n = &v["narratives"][0];
    assert_eq!(n["id"], "restaking-wave");
    assert_eq!(n["rank"], 1);
    // cross 16 + evidence 16 + velocity 20 + stage 15 + confidence 8 +
    // signal match floor(2/2)=1 => 76
    assert_eq!(n["total_score"], 76);
    assert_eq!(n["build_ideas"][0]["title"], "dashboard");

    // Single narrative includes the explanation report.
    let (status, v) = get_json(&app, "/api/narratives/restaking-wave").await;
    assert_eq!(status, StatusCode::OK);
    let explanation = v["explanation"].as_str().expect("explanation");
    assert!(explanation.contains("total 76/110"));
    assert!(explanation.contains("cross-source strength: 16/30"));

    let (status, _) = get_json(&app, "/api/narratives/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Signals filterable by source and truncated.
    let (_, v) = get_json(&app, "/api/signals?source=social&limit=10").await;
    assert_eq!(v["total"], 3);
    assert_eq!(v["count"], 1);
    assert_eq!(v["signals"][0]["source"], "social");

    let (_, v) = get_json(&app, "/api/signals?limit=2").await;
    assert_eq!(v["count"], 2);

    // Combined stats and history.
    let (_, v) = get_json(&app, "/api/stats").await;
    assert_eq!(v["storage"]["narrative_snapshots"], 1);
    assert_eq!(v["narrative_count"], 1);
    assert_eq!(v["top_narratives"][0]["id"], "restaking-wave");

    let (_, v) = get_json(&app, "/api/history?limit=5").await;
    assert_eq!(v["count"], 1);
    assert_eq!(v["snapshots"][0]["top"][0]["rank"], 1);
}
