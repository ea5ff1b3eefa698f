use std::sync::Arc;

use parking_lot::RwLock;
use tantivy::IndexReader;
use tracing::debug;

use tmdb_core::config::{ConsistencyMode, IndexConfig};
use tmdb_core::error::{Error, IoContext, Result};

use crate::index::TmIndex;
use crate::snapshot::Snapshot;
use crate::writer::TantivyWriter;

enum Source {
    Snapshot,
    NearRealTime(Arc<TantivyWriter>),
}

/// Hands out the `Snapshot` each search runs against.
///
/// In snapshot mode the reader generation only moves on `refresh()`. In
/// near-real-time mode every `snapshot()` first commits what the writer has
/// pending and reloads, so adds are visible to the very next search.
pub struct SnapshotManager {
    index: TmIndex,
    source: Source,
    reader: RwLock<Option<IndexReader>>,
}

impl SnapshotManager {
    pub fn snapshot_mode(index: TmIndex) -> Result<Self> {
        let reader = index.reader()?;
        Ok(Self { index, source: Source::Snapshot, reader: RwLock::new(Some(reader)) })
    }

    pub fn near_real_time(writer: Arc<TantivyWriter>) -> Result<Self> {
        let index = writer.index().clone();
        let reader = index.reader()?;
        Ok(Self { index, source: Source::NearRealTime(writer), reader: RwLock::new(Some(reader)) })
    }

    /// Snapshot mode ignores `writer`; near-real-time mode requires it.
    pub fn new(index: TmIndex, mode: ConsistencyMode, writer: Option<Arc<TantivyWriter>>) -> Result<Self> {
        match (mode, writer) {
            (ConsistencyMode::Snapshot, _) => Self::snapshot_mode(index),
            (ConsistencyMode::NearRealTime, Some(writer)) => Self::near_real_time(writer),
            (ConsistencyMode::NearRealTime, None) => {
                Err(Error::invalid_argument("near-real-time mode needs the index writer"))
            }
        }
    }

    /// Builds the manager for `config.mode`. Near-real-time mode opens the
    /// index writer itself; reach it through `writer()`.
    pub fn from_config(index: TmIndex, config: &IndexConfig) -> Result<Self> {
        match config.mode {
            ConsistencyMode::Snapshot => Self::snapshot_mode(index),
            ConsistencyMode::NearRealTime => {
                let writer = Arc::new(index.writer(config.writer_memory_bytes)?);
                Self::near_real_time(writer)
            }
        }
    }

    /// The writer searches commit through, in near-real-time mode.
    pub fn writer(&self) -> Option<&Arc<TantivyWriter>> {
        match &self.source {
            Source::Snapshot => None,
            Source::NearRealTime(writer) => Some(writer),
        }
    }

    pub fn mode(&self) -> ConsistencyMode {
        match self.source {
            Source::Snapshot => ConsistencyMode::Snapshot,
            Source::NearRealTime(_) => ConsistencyMode::NearRealTime,
        }
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        if let Source::NearRealTime(writer) = &self.source {
            if self.reader.read().is_none() {
                return Err(Error::IndexClosed);
            }
            if writer.commit_if_dirty()? {
                debug!("committed pending changes before search");
            }
            self.reload()?;
        }
        let guard = self.reader.read();
        let reader = guard.as_ref().ok_or(Error::IndexClosed)?;
        Ok(Snapshot::new(reader.searcher(), self.index.fields().clone(), self.index.analyzer().clone()))
    }

    /// Moves to the latest committed generation.
    pub fn refresh(&self) -> Result<()> {
        self.reload()
    }

    fn reload(&self) -> Result<()> {
        let guard = self.reader.read();
        let reader = guard.as_ref().ok_or(Error::IndexClosed)?;
        reader.reload().io_context("reloading index reader")
    }

    pub fn is_closed(&self) -> bool {
        self.reader.read().is_none()
    }

    /// Drops the reader and, in near-real-time mode, closes the writer. A
    /// failed writer close is returned and leaves the manager open.
    pub fn close(&self) -> Result<()> {
        let mut reader = self.reader.write();
        if reader.is_none() {
            return Ok(());
        }
        if let Source::NearRealTime(writer) = &self.source {
            writer.close()?;
        }
        *reader = None;
        Ok(())
    }
}
