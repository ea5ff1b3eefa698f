use std::path::{Path, PathBuf};
use std::sync::Arc;

use tantivy::directory::MmapDirectory;
use tantivy::{Index, IndexReader, ReloadPolicy};
use tracing::info;

use tmdb_core::config::{AnalyzerConfig, TmConfig};
use tmdb_core::error::{Error, IoContext, Result};

use crate::analyzer::NgramAnalyzer;
use crate::tantivy_utils::{build_schema, TmFields};
use crate::writer::TantivyWriter;

/// Handle on a tantivy index holding translation units, together with the
/// analyzer every reader and writer of it must share.
///
/// Every commit records the analyzer settings as its payload. Opening an
/// index with an analyzer that disagrees with the recorded one fails with
/// `Error::Config`.
#[derive(Clone)]
pub struct TmIndex {
    index: Index,
    fields: Arc<TmFields>,
    analyzer: NgramAnalyzer,
    path: Option<PathBuf>,
}

impl TmIndex {
    pub fn create_in_ram(analyzer: NgramAnalyzer) -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::wrap(index, analyzer, None)
    }

    /// Creates a fresh index at `path`, removing whatever was there.
    pub fn create_in_dir(path: &Path, analyzer: NgramAnalyzer) -> Result<Self> {
        if path.exists() {
            std::fs::remove_dir_all(path).io_context("clearing index directory")?;
        }
        std::fs::create_dir_all(path).io_context("creating index directory")?;
        let index = Index::create_in_dir(path, build_schema()).io_context("creating index")?;
        info!(path = %path.display(), "created translation memory index");
        Self::wrap(index, analyzer, Some(path.to_path_buf()))
    }

    pub fn open_in_dir(path: &Path, analyzer: NgramAnalyzer) -> Result<Self> {
        if !path.join("meta.json").is_file() {
            return Err(Error::IndexNotFound(path.to_path_buf()));
        }
        let index = Index::open_in_dir(path).io_context("opening index")?;
        info!(path = %path.display(), "opened translation memory index");
        Self::wrap(index, analyzer, Some(path.to_path_buf()))
    }

    pub fn open_or_create_in_dir(path: &Path, analyzer: NgramAnalyzer) -> Result<Self> {
        std::fs::create_dir_all(path).io_context("creating index directory")?;
        let directory = MmapDirectory::open(path).io_context("opening index directory")?;
        let index = Index::open_or_create(directory, build_schema()).io_context("opening index")?;
        info!(path = %path.display(), "opened translation memory index");
        Self::wrap(index, analyzer, Some(path.to_path_buf()))
    }

    /// Opens (or creates) the index named by `config.index.path`.
    pub fn from_config(config: &TmConfig) -> Result<Self> {
        let analyzer = NgramAnalyzer::from_config(&config.analyzer);
        Self::open_or_create_in_dir(&config.index.resolved_path(), analyzer)
    }

    fn wrap(index: Index, analyzer: NgramAnalyzer, path: Option<PathBuf>) -> Result<Self> {
        let fields = TmFields::resolve(&index.schema())?;
        if let Some(stored) = Self::stored_analyzer(&index)? {
            if stored != analyzer.settings() {
                return Err(Error::Config(format!(
                    "index was built with ngram_length = {}, fold_case = {} but opened with \
                     ngram_length = {}, fold_case = {}",
                    stored.ngram_length,
                    stored.fold_case,
                    analyzer.ngram_length(),
                    analyzer.fold_case()
                )));
            }
        }
        Ok(Self { index, fields: Arc::new(fields), analyzer, path })
    }

    /// Analyzer settings recorded by the last commit, if any.
    fn stored_analyzer(index: &Index) -> Result<Option<AnalyzerConfig>> {
        let metas = index.load_metas().io_context("reading index metadata")?;
        let Some(payload) = metas.payload else {
            return Ok(None);
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| Error::Config(format!("unreadable analyzer settings in index: {e}")))
    }

    pub(crate) fn commit_payload(&self) -> Result<String> {
        serde_json::to_string(&self.analyzer.settings()).io_context("encoding analyzer settings")
    }

    pub fn writer(&self, memory_bytes: usize) -> Result<TantivyWriter> {
        TantivyWriter::new(self.clone(), memory_bytes)
    }

    pub(crate) fn reader(&self) -> Result<IndexReader> {
        self.index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .io_context("opening index reader")
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn fields(&self) -> &Arc<TmFields> {
        &self.fields
    }

    pub fn analyzer(&self) -> &NgramAnalyzer {
        &self.analyzer
    }

    /// `None` for in-RAM indexes.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
