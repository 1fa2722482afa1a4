// src/store.rs
//! Versioned snapshot store.
//!
//! Each kind (signals, narratives) gets a directory of immutable,
//! timestamp-named JSON documents plus one mutable `latest.json` alias.
//! The immutable write always completes before the alias is overwritten,
//! so `latest` never points at a snapshot absent from the durable set.
//! Every document is self-describing: it carries its own timestamp, counts
//! and full payload.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::narrative::Narrative;
use crate::signals::types::{SignalSet, SignalStats};

const LATEST: &str = "latest.json";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "snapshot_writes_total",
            "Immutable snapshot documents written."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Signals,
    Narratives,
}

impl SnapshotKind {
    fn dir(&self) -> &'static str {
        match self {
            Self::Signals => "signals",
            Self::Narratives => "narratives",
        }
    }
}

/// Context recorded alongside a signal snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMeta {
    pub day_range: u32,
    /// What initiated the run: "api", "scheduler", "bootstrap".
    pub trigger: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub meta: RunMeta,
    pub stats: SignalStats,
    pub signals: Vec<crate::signals::types::Signal>,
}

impl SignalSnapshot {
    /// Reassemble the stored payload as a `SignalSet`.
    pub fn to_set(&self) -> SignalSet {
        SignalSet {
            signals: self.signals.clone(),
            stats: self.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeSnapshot {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    /// Stats of the signal set the narratives were evaluated against.
    pub signal_stats: SignalStats,
    pub narratives: Vec<Narrative>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub signal_snapshots: usize,
    pub narrative_snapshots: usize,
    pub has_latest_signals: bool,
    pub has_latest_narratives: bool,
}

impl StorageStats {
    /// First-run bootstrap is needed until a narrative set has been stored.
    pub fn needs_bootstrap(&self) -> bool {
        !self.has_latest_narratives
    }
}

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in [SnapshotKind::Signals, SnapshotKind::Narratives] {
            fs::create_dir_all(root.join(kind.dir()))
                .with_context(|| format!("creating store dir for {}", kind.dir()))?;
        }
        Ok(Self { root })
    }

    fn kind_dir(&self, kind: SnapshotKind) -> PathBuf {
        self.root.join(kind.dir())
    }

    /// Timestamp-derived unique file name; bumps a suffix on a
    /// same-millisecond collision. The `_` suffix separator sorts after
    /// the `.` of the un-suffixed name, so the descending file-name sort
    /// in `history_paths` keeps colliding snapshots newest-first.
    fn immutable_path(&self, kind: SnapshotKind, ts: DateTime<Utc>) -> PathBuf {
        let dir = self.kind_dir(kind);
        let stamp = ts.format("%Y%m%dT%H%M%S%3fZ");
        let mut path = dir.join(format!("{stamp}.json"));
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = dir.join(format!("{stamp}_{n:02}.json"));
        }
        path
    }

    /// Write the immutable document, then overwrite the `latest` alias via
    /// temp-file + rename. Ordering guarantees the alias only ever points
    /// at durable content; an aborted run leaves no partial snapshot.
    fn write_snapshot<T: Serialize>(&self, kind: SnapshotKind, doc: &T, ts: DateTime<Utc>) -> Result<()> {
        ensure_metrics_described();
        let body = serde_json::to_vec_pretty(doc).context("serializing snapshot")?;

        let immutable = self.immutable_path(kind, ts);
        fs::write(&immutable, &body)
            .with_context(|| format!("writing snapshot {}", immutable.display()))?;
        counter!("snapshot_writes_total").increment(1);

        let dir = self.kind_dir(kind);
        let tmp = dir.join(".latest.json.tmp");
        fs::write(&tmp, &body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, dir.join(LATEST)).context("publishing latest alias")?;

        tracing::info!(kind = kind.dir(), path = %immutable.display(), "snapshot stored");
        Ok(())
    }

    pub fn save_signal_set(&self, set: &SignalSet, meta: RunMeta) -> Result<SignalSnapshot> {
        let doc = SignalSnapshot {
            timestamp: Utc::now(),
            count: set.len(),
            meta,
            stats: set.stats.clone(),
            signals: set.signals.clone(),
        };
        self.write_snapshot(SnapshotKind::Signals, &doc, doc.timestamp)?;
        Ok(doc)
    }

    pub fn save_narrative_set(
        &self,
        narratives: &[Narrative],
        signal_stats: &SignalStats,
    ) -> Result<NarrativeSnapshot> {
        let doc = NarrativeSnapshot {
            timestamp: Utc::now(),
            count: narratives.len(),
            signal_stats: signal_stats.clone(),
            narratives: narratives.to_vec(),
        };
        self.write_snapshot(SnapshotKind::Narratives, &doc, doc.timestamp)?;
        Ok(doc)
    }

    fn load_latest<T: DeserializeOwned>(&self, kind: SnapshotKind) -> Result<Option<T>> {
        let path = self.kind_dir(kind).join(LATEST);
        if !path.exists() {
            // Absence is a legitimate empty-state, not an error.
            return Ok(None);
        }
        let body = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let doc = serde_json::from_str(&body)
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Some(doc))
    }

    pub fn load_latest_signals(&self) -> Result<Option<SignalSnapshot>> {
        self.load_latest(SnapshotKind::Signals)
    }

    pub fn load_latest_narratives(&self) -> Result<Option<NarrativeSnapshot>> {
        self.load_latest(SnapshotKind::Narratives)
    }

    /// Immutable file names for a kind, most-recent-first, alias excluded.
    /// The millisecond stamp sorts lexicographically.
    fn history_paths(&self, kind: SnapshotKind) -> Result<Vec<PathBuf>> {
        let dir = self.kind_dir(kind);
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name != LATEST && name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort_by(|a, b| b.cmp(a));
        Ok(names.into_iter().map(|n| dir.join(n)).collect())
    }

    fn load_history<T: DeserializeOwned>(&self, kind: SnapshotKind, limit: usize) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for path in self.history_paths(kind)? {
            if out.len() >= limit {
                break;
            }
            match read_doc(&path) {
                Ok(doc) => out.push(doc),
                // A corrupt historical file is skipped, not fatal to the
                // listing; writes remain fatal.
                Err(e) => tracing::warn!(error = ?e, path = %path.display(), "skipping unreadable snapshot"),
            }
        }
        Ok(out)
    }

    pub fn load_signal_history(&self, limit: usize) -> Result<Vec<SignalSnapshot>> {
        self.load_history(SnapshotKind::Signals, limit)
    }

    pub fn load_narrative_history(&self, limit: usize) -> Result<Vec<NarrativeSnapshot>> {
        self.load_history(SnapshotKind::Narratives, limit)
    }

    pub fn storage_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            signal_snapshots: self.history_paths(SnapshotKind::Signals)?.len(),
            narrative_snapshots: self.history_paths(SnapshotKind::Narratives)?.len(),
            has_latest_signals: self.kind_dir(SnapshotKind::Signals).join(LATEST).exists(),
            has_latest_narratives: self
                .kind_dir(SnapshotKind::Narratives)
                .join(LATEST)
                .exists(),
        })
    }
}

fn read_doc<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("decoding {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::{ScoreBreakdown, Stage, Velocity};

    fn narrative(name: &str, total: u32) -> Narrative {
        Narrative {
            id: name.to_string(),
            name: name.to_string(),
            description: String::new(),
            evidence: vec![],
            sources: vec![],
            topics: vec![],
            stage: Stage::Unknown,
            velocity: Velocity::Unknown,
            confidence: 0.5,
            scores: ScoreBreakdown::default(),
            total_score: total,
            matching_signal_count: 0,
            rank: 1,
            build_ideas: vec![],
        }
    }

    #[test]
    fn absent_latest_is_none_not_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::open(tmp.path()).expect("open");
        assert!(store.load_latest_signals().expect("load").is_none());
        assert!(store.load_latest_narratives().expect("load").is_none());
        let stats = store.storage_stats().expect("stats");
        assert!(stats.needs_bootstrap());
        assert_eq!(stats.signal_snapshots, 0);
    }

    #[test]
    fn second_write_keeps_first_snapshot_retrievable() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::open(tmp.path()).expect("open");
        let stats = SignalStats::default();

        store
            .save_narrative_set(&[narrative("first", 10)], &stats)
            .expect("save 1");
        store
            .save_narrative_set(&[narrative("second", 20)], &stats)
            .expect("save 2");

        let latest = store
            .load_latest_narratives()
            .expect("load latest")
            .expect("present");
        assert_eq!(latest.narratives[0].name, "second");

        let history = store.load_narrative_history(10).expect("history");
        assert_eq!(history.len(), 2);
        // Most-recent-first, both originals intact.
        assert_eq!(history[0].narratives[0].name, "second");
        assert_eq!(history[1].narratives[0].name, "first");

        let st = store.storage_stats().expect("stats");
        assert_eq!(st.narrative_snapshots, 2);
        assert!(st.has_latest_narratives);
        assert!(!st.needs_bootstrap());
    }

    #[test]
    fn rapid_saves_keep_history_newest_first() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::open(tmp.path()).expect("open");
        let stats = SignalStats::default();

        // Consecutive saves routinely land in the same millisecond, which
        // exercises the suffixed-file-name path.
        for i in 0..10u32 {
            store
                .save_narrative_set(&[narrative(&format!("n{i}"), i)], &stats)
                .expect("save");
        }

        let history = store.load_narrative_history(20).expect("history");
        assert_eq!(history.len(), 10);
        for pair in history.windows(2) {
            assert!(
                pair[0].timestamp >= pair[1].timestamp,
                "history must be most-recent-first"
            );
        }
        // Newest entry first, and the latest alias agrees with it.
        assert_eq!(history[0].narratives[0].name, "n9");
        assert_eq!(history[9].narratives[0].name, "n0");
        let latest = store
            .load_latest_narratives()
            .expect("load latest")
            .expect("present");
        assert_eq!(latest.narratives[0].name, "n9");
    }

    #[test]
    fn history_excludes_alias_and_respects_limit() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::open(tmp.path()).expect("open");
        let stats = SignalStats::default();
        for i in 0..3 {
            store
                .save_narrative_set(&[narrative(&format!("n{i}"), i)], &stats)
                .expect("save");
        }
        let history = store.load_narrative_history(2).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].narratives[0].name, "n2");
    }
}
