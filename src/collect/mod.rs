// src/collect/mod.rs
pub mod feeds;
pub mod types;

use std::sync::Arc;

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::collect::types::{RawRecord, SourceAdapter};

/// Day-range applied when a caller passes none (or a non-positive value).
pub const DEFAULT_DAY_RANGE: u32 = 14;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collect_records_total",
            "Raw records returned by successful adapters."
        );
        describe_counter!(
            "collect_adapter_errors_total",
            "Adapter fetch failures (isolated, non-fatal)."
        );
    });
}

/// Clamp an optional day-range request to a positive value.
pub fn effective_day_range(requested: Option<u32>, default: u32) -> u32 {
    match requested {
        Some(d) if d > 0 => d,
        _ => default.max(1),
    }
}

/// Invoke every adapter concurrently and wait for all of them to settle.
///
/// A failing adapter contributes zero records and a warn-level log entry;
/// it never aborts the others or the pipeline. Successful outputs are
/// concatenated in adapter declaration order. All adapters failing yields
/// an empty vec, which is a valid outcome, not an error.
pub async fn collect_all(adapters: &[Arc<dyn SourceAdapter>], day_range: u32) -> Vec<RawRecord> {
    ensure_metrics_described();

    let settled = join_all(
        adapters
            .iter()
            .map(|a| async move { (a.name().to_string(), a.fetch(day_range).await) }),
    )
    .await;

    let mut out = Vec::new();
    for (name, result) in settled {
        match result {
            Ok(mut records) => {
                counter!("collect_records_total").increment(records.len() as u64);
                tracing::debug!(adapter = %name, count = records.len(), "adapter ok");
                out.append(&mut records);
            }
            Err(e) => {
                tracing::warn!(error = ?e, adapter = %name, "adapter error");
                counter!("collect_adapter_errors_total").increment(1);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Fixed {
        name: &'static str,
        records: usize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        async fn fetch(&self, _day_range: u32) -> anyhow::Result<Vec<RawRecord>> {
            if self.fail {
                return Err(anyhow!("boom"));
            }
            Ok((0..self.records)
                .map(|i| RawRecord {
                    source: Some("social".into()),
                    name: Some(format!("{}-{}", self.name, i)),
                    ..Default::default()
                })
                .collect())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    #[tokio::test]
    async fn failing_adapter_does_not_abort_the_rest() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(Fixed { name: "a", records: 3, fail: false }),
            Arc::new(Fixed { name: "b", records: 0, fail: true }),
            Arc::new(Fixed { name: "c", records: 2, fail: false }),
        ];
        let out = collect_all(&adapters, DEFAULT_DAY_RANGE).await;
        assert_eq!(out.len(), 5);
        // Declaration order: a's records first, then c's.
        assert_eq!(out[0].name.as_deref(), Some("a-0"));
        assert_eq!(out[3].name.as_deref(), Some("c-0"));
    }

    #[tokio::test]
    async fn all_adapters_failing_yields_empty_not_error() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(Fixed { name: "a", records: 0, fail: true }),
            Arc::new(Fixed { name: "b", records: 0, fail: true }),
        ];
        let out = collect_all(&adapters, 7).await;
        assert!(out.is_empty());
    }

    #[test]
    fn day_range_falls_back_to_default() {
        assert_eq!(effective_day_range(None, 14), 14);
        assert_eq!(effective_day_range(Some(0), 14), 14);
        assert_eq!(effective_day_range(Some(30), 14), 30);
    }
}
