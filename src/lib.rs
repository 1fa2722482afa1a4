// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod ai;
pub mod api;
pub mod collect;
pub mod config;
pub mod metrics;
pub mod narrative;
pub mod pipeline;
pub mod scheduler;
pub mod scoring;
pub mod signals;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::collect::types::{RawRecord, SourceAdapter};
pub use crate::narrative::{
    BuildIdea, IdeaEnricher, Narrative, NarrativeClassifier, NarrativeDraft,
};
pub use crate::pipeline::Pipeline;
pub use crate::scoring::{explain_score, score_narratives};
pub use crate::signals::types::{Signal, SignalSet, SignalStats};
pub use crate::store::SnapshotStore;
