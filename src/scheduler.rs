// src/scheduler.rs
//! Background jobs. All scheduled state lives in an explicit `JobHandles`
//! object created at startup and owned by the caller; there are no
//! free-floating process-wide job globals.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Copy)]
pub struct ScheduleCfg {
    pub collect_interval: Duration,
    pub analyze_interval: Duration,
}

/// Handles to the active periodic jobs, exposed for controlled shutdown.
pub struct JobHandles {
    collect: JoinHandle<()>,
    analyze: JoinHandle<()>,
}

impl JobHandles {
    /// Spawn the periodic collection and analysis jobs. On a first run
    /// (no stored narrative set yet) a one-off full bootstrap run fires
    /// before the intervals start.
    pub fn spawn(pipeline: Arc<Pipeline>, cfg: ScheduleCfg) -> Self {
        let collect = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                match pipeline.store().storage_stats() {
                    Ok(stats) if stats.needs_bootstrap() => {
                        tracing::info!("no stored narratives yet, running bootstrap analysis");
                        if let Err(e) = pipeline.run_full(None, "bootstrap").await {
                            tracing::error!(error = ?e, "bootstrap run failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = ?e, "storage stats unavailable"),
                }

                let mut ticker = tokio::time::interval(cfg.collect_interval);
                ticker.tick().await; // consume the immediate first tick
                loop {
                    ticker.tick().await;
                    match pipeline.run_collection(None, "scheduler").await {
                        Ok(s) => tracing::info!(
                            target: "scheduler",
                            signals = s.signal_count,
                            dropped = s.duplicates_dropped,
                            "scheduled collection tick"
                        ),
                        Err(e) => tracing::error!(error = ?e, "scheduled collection failed"),
                    }
                }
            })
        };

        let analyze = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cfg.analyze_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match pipeline.run_analysis(None).await {
                    Ok(s) => tracing::info!(
                        target: "scheduler",
                        narratives = s.narrative_count,
                        "scheduled analysis tick"
                    ),
                    Err(e) => tracing::error!(error = ?e, "scheduled analysis failed"),
                }
            }
        });

        Self { collect, analyze }
    }

    pub fn shutdown(self) {
        self.collect.abort();
        self.analyze.abort();
    }
}
