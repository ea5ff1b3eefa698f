//! tmdb-core
//!
//! Translation-memory domain model (coded text, units, hits), the shared error
//! type, configuration loading and the ingestion/retrieval traits implemented
//! by `tmdb-index`.

pub mod bilingual;
pub mod config;
pub mod error;
pub mod fragment;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use fragment::{Code, TagType, TextFragment};
pub use types::{
    DocId, Document, LocaleId, MatchType, Metadata, MetadataKind, TmHit, TranslationUnit, TranslationUnitVariant,
};
