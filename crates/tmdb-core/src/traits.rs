use crate::error::Result;
use crate::fragment::TextFragment;
use crate::types::{Metadata, TmHit, TranslationUnit};

/// Ingestion boundary used by format filters and import tools.
pub trait TmWriter: Send + Sync {
    /// Appends `tu`. Returns `None` when the unit was skipped (empty source).
    fn index_translation_unit(&self, tu: &TranslationUnit) -> Result<Option<u64>>;
    /// Like `index_translation_unit`, but with `overwrite` first removes units
    /// sharing the same source coded text and codes.
    fn index_translation_unit_overwrite(&self, tu: &TranslationUnit, overwrite: bool) -> Result<Option<u64>>;
    fn delete(&self, id: &str) -> Result<()>;
    fn update(&self, tu: &TranslationUnit) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// Retrieval boundary. Hits come back ranked and capped; callers never see
/// raw index internals.
pub trait TmSeeker: Send + Sync {
    fn search_exact(&self, query: &TextFragment, metadata: Option<&Metadata>) -> Result<Vec<TmHit>>;
    fn search_fuzzy(
        &self,
        query: &TextFragment,
        threshold: f32,
        max_hits: usize,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<TmHit>>;
    fn search_concordance(
        &self,
        query: &str,
        threshold: f32,
        max_hits: usize,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<TmHit>>;
    /// Every live unit of the current snapshot, in index order.
    fn translation_units(&self) -> Result<Vec<TranslationUnit>>;
    /// Idempotent. Errors from flushing pending writes are returned.
    fn close(&self) -> Result<()>;
}
