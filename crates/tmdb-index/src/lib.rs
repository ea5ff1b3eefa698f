//! tmdb-index
//!
//! tantivy-backed translation memory: n-gram analyzer, index store, query
//! engine, scoring pipeline and the snapshot/near-real-time consistency
//! manager. See `TantivyWriter` for ingestion and `TantivySeeker` for lookup.

pub mod analyzer;
pub mod index;
pub mod manager;
pub mod query;
pub mod scoring;
pub mod seeker;
pub mod snapshot;
pub mod tantivy_utils;
pub mod writer;

pub use analyzer::{NgramAnalyzer, NgramBag};
pub use index::TmIndex;
pub use manager::SnapshotManager;
pub use query::{ConcordanceQuery, ExactQuery, FuzzyQuery, Query};
pub use scoring::{RawScoring, ScoringPolicy};
pub use seeker::TantivySeeker;
pub use snapshot::Snapshot;
pub use writer::TantivyWriter;
