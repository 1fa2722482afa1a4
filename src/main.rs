//! Narrative Radar — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the snapshot store, pipeline,
//! background jobs and middleware.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use narrative_radar::ai::AiClient;
use narrative_radar::api::{create_router, AppState};
use narrative_radar::collect::feeds::JsonFeedAdapter;
use narrative_radar::collect::types::SourceAdapter;
use narrative_radar::config::AppConfig;
use narrative_radar::metrics::Metrics;
use narrative_radar::pipeline::Pipeline;
use narrative_radar::scheduler::{JobHandles, ScheduleCfg};
use narrative_radar::store::SnapshotStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("narrative_radar=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Configuration failures are fatal: a missing credential must prevent
    // startup, not surface mid-run.
    let cfg = AppConfig::from_env().context("loading configuration")?;

    let metrics = Metrics::init()?;
    let store = Arc::new(SnapshotStore::open(&cfg.data_dir)?);

    let adapters: Vec<Arc<dyn SourceAdapter>> = cfg
        .feeds
        .iter()
        .map(|f| Arc::new(JsonFeedAdapter::new(f.name.clone(), f.url.clone())) as _)
        .collect();
    if adapters.is_empty() {
        tracing::warn!("no source feeds configured, collection runs will be empty");
    }

    let ai = Arc::new(AiClient::new(cfg.ai.clone()));
    let pipeline = Arc::new(
        Pipeline::new(adapters, ai.clone(), ai, Arc::clone(&store))
            .with_day_range_default(cfg.day_range_default)
            .with_enrich_throttle(Duration::from_millis(cfg.enrich_throttle_ms)),
    );

    let jobs = JobHandles::spawn(
        Arc::clone(&pipeline),
        ScheduleCfg {
            collect_interval: Duration::from_secs(cfg.collect_interval_hours * 3600),
            analyze_interval: Duration::from_secs(cfg.analyze_interval_hours * 3600),
        },
    );

    let state = AppState {
        store,
        pipeline,
        started_at: Instant::now(),
    };
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving http")?;

    jobs.shutdown();
    Ok(())
}
