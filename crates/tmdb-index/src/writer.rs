use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{IndexWriter, Term};
use tracing::{debug, info, warn};

use tmdb_core::error::{Error, IoContext, Result};
use tmdb_core::traits::TmWriter;
use tmdb_core::{Code, MetadataKind, TranslationUnit};

use crate::index::TmIndex;

// tantivy refuses smaller per-thread budgets.
const MIN_WRITER_MEMORY: usize = 15_000_000;

/// The single writer of a `TmIndex`. Calls are serialized by an internal
/// mutex; one indexing thread keeps documents in insertion order.
pub struct TantivyWriter {
    index: TmIndex,
    writer: Mutex<Option<IndexWriter>>,
    dirty: AtomicBool,
}

impl TantivyWriter {
    pub fn new(index: TmIndex, memory_bytes: usize) -> Result<Self> {
        let writer: IndexWriter = index
            .index()
            .writer_with_num_threads(1, memory_bytes.max(MIN_WRITER_MEMORY))
            .io_context("creating index writer")?;
        Ok(Self { index, writer: Mutex::new(Some(writer)), dirty: AtomicBool::new(false) })
    }

    pub fn index(&self) -> &TmIndex {
        &self.index
    }

    fn with_writer<T>(&self, f: impl FnOnce(&mut IndexWriter) -> Result<T>) -> Result<T> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(Error::IndexClosed)?;
        f(writer)
    }

    /// Appends `tu`. An empty source is skipped and yields `Ok(None)`;
    /// otherwise the tantivy opstamp of the add is returned.
    pub fn add_document(&self, tu: &TranslationUnit) -> Result<Option<u64>> {
        self.with_writer(|writer| self.add_locked(writer, tu))
    }

    fn add_locked(&self, writer: &mut IndexWriter, tu: &TranslationUnit) -> Result<Option<u64>> {
        let Some(doc) = self.index.fields().to_document(self.index.analyzer(), tu)? else {
            debug!("skipping translation unit with empty source");
            return Ok(None);
        };
        let opstamp = writer.add_document(doc).io_context("adding document")?;
        self.dirty.store(true, Ordering::Release);
        Ok(Some(opstamp))
    }

    /// Adds `tu`; with `overwrite`, documents carrying the same source coded
    /// text (and the same codes, when the source has any) are removed first.
    pub fn index_translation_unit(&self, tu: &TranslationUnit, overwrite: bool) -> Result<Option<u64>> {
        self.with_writer(|writer| {
            if overwrite && !tu.is_source_empty() {
                let fields = self.index.fields();
                let source = &tu.source.content;
                let exact = Term::from_field_text(fields.source_exact, source.coded_text());
                if source.has_code() {
                    let codes = Term::from_field_text(fields.source_codes, &Code::list_to_string(source.codes())?);
                    let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
                        (Occur::Must, Box::new(TermQuery::new(exact, IndexRecordOption::Basic))),
                        (Occur::Must, Box::new(TermQuery::new(codes, IndexRecordOption::Basic))),
                    ];
                    writer.delete_query(Box::new(BooleanQuery::new(clauses))).io_context("deleting duplicates")?;
                } else {
                    writer.delete_term(exact);
                }
            }
            self.add_locked(writer, tu)
        })
    }

    /// Deletes every document whose `MetadataKind::Id` equals `id`.
    pub fn delete(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_argument("translation unit id must not be empty"));
        }
        self.with_writer(|writer| {
            let field = self.index.fields().metadata_field(MetadataKind::Id);
            writer.delete_term(Term::from_field_text(field, id));
            self.dirty.store(true, Ordering::Release);
            Ok(())
        })
    }

    /// Replaces the unit with the same `MetadataKind::Id`.
    pub fn update(&self, tu: &TranslationUnit) -> Result<()> {
        let id = tu
            .metadata_value(MetadataKind::Id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::invalid_argument("update requires an Id metadata value"))?;
        self.with_writer(|writer| {
            let field = self.index.fields().metadata_field(MetadataKind::Id);
            writer.delete_term(Term::from_field_text(field, id));
            self.dirty.store(true, Ordering::Release);
            self.add_locked(writer, tu).map(|_| ())
        })
    }

    pub fn commit(&self) -> Result<()> {
        self.with_writer(|writer| {
            let opstamp = self.commit_locked(writer, "committing index")?;
            info!(opstamp, "committed translation memory");
            Ok(())
        })
    }

    // The pending flag is only cleared once the commit went through.
    fn commit_locked(&self, writer: &mut IndexWriter, context: &'static str) -> Result<u64> {
        let payload = self.index.commit_payload()?;
        let mut prepared = writer.prepare_commit().io_context(context)?;
        prepared.set_payload(&payload);
        let opstamp = prepared.commit().io_context(context)?;
        self.dirty.store(false, Ordering::Release);
        Ok(opstamp)
    }

    /// Commits only when something was added or deleted since the last commit.
    /// Returns whether a commit happened.
    pub fn commit_if_dirty(&self) -> Result<bool> {
        if !self.has_pending_changes() {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    pub fn has_pending_changes(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }

    /// Commits pending changes and releases the writer lock. Later calls are
    /// no-ops; any other operation afterwards fails with `IndexClosed`.
    ///
    /// If the final commit fails the writer stays open with its changes
    /// pending, and the error is returned.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        match guard.as_mut() {
            None => return Ok(()),
            Some(writer) if self.has_pending_changes() => {
                self.commit_locked(writer, "committing index on close")?;
            }
            Some(_) => {}
        }
        let Some(writer) = guard.take() else {
            return Ok(());
        };
        drop(guard);
        writer.wait_merging_threads().io_context("waiting for merges on close")?;
        info!("closed translation memory writer");
        Ok(())
    }
}

impl TmWriter for TantivyWriter {
    fn index_translation_unit(&self, tu: &TranslationUnit) -> Result<Option<u64>> {
        self.add_document(tu)
    }

    fn index_translation_unit_overwrite(&self, tu: &TranslationUnit, overwrite: bool) -> Result<Option<u64>> {
        TantivyWriter::index_translation_unit(self, tu, overwrite)
    }

    fn delete(&self, id: &str) -> Result<()> {
        TantivyWriter::delete(self, id)
    }

    fn update(&self, tu: &TranslationUnit) -> Result<()> {
        TantivyWriter::update(self, tu)
    }

    fn commit(&self) -> Result<()> {
        TantivyWriter::commit(self)
    }

    fn close(&self) -> Result<()> {
        TantivyWriter::close(self)
    }
}

impl Drop for TantivyWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close translation memory writer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::NgramAnalyzer;
    use tmdb_core::TranslationUnitVariant;

    fn tu(source: &str) -> TranslationUnit {
        TranslationUnit::new(TranslationUnitVariant::new("en", source), TranslationUnitVariant::new("fr", "x"))
    }

    #[test]
    fn pending_changes_track_commits() {
        let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        assert!(!writer.has_pending_changes());
        writer.add_document(&tu("hello world")).unwrap();
        assert!(writer.has_pending_changes());
        assert!(writer.commit_if_dirty().unwrap());
        assert!(!writer.commit_if_dirty().unwrap());
    }

    #[test]
    fn commits_record_analyzer_settings() {
        let index = TmIndex::create_in_ram(NgramAnalyzer::new(3).with_fold_case(true)).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        assert_eq!(index.index().load_metas().unwrap().payload, None);
        writer.add_document(&tu("hello world")).unwrap();
        writer.commit().unwrap();
        let payload = index.index().load_metas().unwrap().payload.unwrap();
        assert_eq!(payload, r#"{"ngram_length":3,"fold_case":true}"#);
    }

    #[test]
    fn empty_source_is_skipped() {
        let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        assert_eq!(writer.add_document(&tu("")).unwrap(), None);
        assert!(!writer.has_pending_changes());
    }

    #[test]
    fn close_is_idempotent() {
        let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        writer.add_document(&tu("hello")).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(writer.add_document(&tu("again")), Err(Error::IndexClosed)));
        assert!(matches!(writer.delete("1"), Err(Error::IndexClosed)));
    }

    #[test]
    fn update_needs_an_id() {
        let index = TmIndex::create_in_ram(NgramAnalyzer::default()).unwrap();
        let writer = index.writer(50_000_000).unwrap();
        assert!(matches!(writer.update(&tu("hello")), Err(Error::InvalidArgument(_))));
        assert!(matches!(writer.delete(""), Err(Error::InvalidArgument(_))));
    }
}
