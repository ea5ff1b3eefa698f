use tracing::debug;

use tmdb_core::config::{SearchConfig, TmConfig};
use tmdb_core::error::Result;
use tmdb_core::traits::TmSeeker;
use tmdb_core::{MatchType, Metadata, TextFragment, TmHit, TranslationUnit};

use crate::analyzer::NgramBag;
use crate::index::TmIndex;
use crate::manager::SnapshotManager;
use crate::query::{ConcordanceQuery, ExactQuery, FuzzyQuery, Query};
use crate::scoring::{self, RawScoring, ScoringPolicy};
use crate::snapshot::{Candidate, DocFilter, Snapshot};

/// Answers exact, fuzzy and concordance queries against the snapshots of a
/// `SnapshotManager`.
pub struct TantivySeeker {
    manager: SnapshotManager,
    search: SearchConfig,
    policy: ScoringPolicy,
}

impl TantivySeeker {
    pub fn new(manager: SnapshotManager, search: SearchConfig) -> Self {
        let policy = ScoringPolicy::from_config(&search);
        Self { manager, search, policy }
    }

    /// Seeker over `index` with the consistency mode and search settings of
    /// `config`.
    pub fn from_config(index: TmIndex, config: &TmConfig) -> Result<Self> {
        Ok(Self::new(SnapshotManager::from_config(index, &config.index)?, config.search.clone()))
    }

    /// Snapshot-mode seeker with default search settings.
    pub fn open(index: TmIndex) -> Result<Self> {
        Ok(Self::new(SnapshotManager::snapshot_mode(index)?, SearchConfig::default()))
    }

    pub fn manager(&self) -> &SnapshotManager {
        &self.manager
    }

    pub fn refresh(&self) -> Result<()> {
        self.manager.refresh()
    }

    pub fn search(&self, query: &Query) -> Result<Vec<TmHit>> {
        query.validate()?;
        let snapshot = self.manager.snapshot()?;
        let hits = match query {
            Query::Exact(q) => self.exact(&snapshot, q)?,
            Query::Fuzzy(q) => self.fuzzy(&snapshot, q)?,
            Query::Concordance(q) => self.concordance(&snapshot, q)?,
        };
        debug!(kind = query.kind(), hits = hits.len(), "query answered");
        Ok(hits)
    }

    fn exact(&self, snapshot: &Snapshot, q: &ExactQuery) -> Result<Vec<TmHit>> {
        let ids = snapshot.exact_candidates(q.fragment.coded_text(), q.metadata.as_ref(), usize::MAX)?;
        let mut hits = Vec::with_capacity(ids.len());
        for doc_id in ids {
            let tu = snapshot.document(doc_id)?.into_translation_unit()?;
            hits.push(TmHit { tu, doc_id, score: 100.0, match_type: MatchType::Exact, code_mismatch: false });
        }
        Ok(scoring::finish(hits, None))
    }

    fn fuzzy(&self, snapshot: &Snapshot, q: &FuzzyQuery) -> Result<Vec<TmHit>> {
        let plain = q.fragment.text();
        if plain.is_empty() {
            return Ok(Vec::new());
        }
        let bag = snapshot.analyzer().bag(&plain);
        let filter = snapshot.metadata_filter(q.metadata.as_ref())?;
        let candidates = self.over_fetch(snapshot, &bag, RawScoring::Dice, q.threshold, filter.as_ref())?;

        let mut hits = Vec::with_capacity(candidates.len());
        for Candidate { doc_id, score } in candidates {
            let tu = snapshot.document(doc_id)?.into_translation_unit()?;
            let adjusted = self.policy.adjust_fuzzy(&q.fragment, &tu, score);
            if adjusted.score < q.threshold {
                continue;
            }
            hits.push(TmHit {
                tu,
                doc_id,
                score: adjusted.score,
                match_type: adjusted.match_type,
                code_mismatch: adjusted.code_mismatch,
            });
        }
        Ok(scoring::finish(hits, Some(q.max_hits)))
    }

    fn concordance(&self, snapshot: &Snapshot, q: &ConcordanceQuery) -> Result<Vec<TmHit>> {
        let filter = snapshot.metadata_filter(q.metadata.as_ref())?;
        let analyzer = snapshot.analyzer();
        // Shorter than one n-gram: no posting can hold it, scan stored text.
        let candidates = if analyzer.normalize(&q.text).chars().count() < analyzer.ngram_length() {
            snapshot
                .substring_candidates(&q.text, filter.as_ref())?
                .into_iter()
                .map(|doc_id| Candidate { doc_id, score: 100.0 })
                .collect()
        } else {
            let bag = analyzer.bag(&q.text);
            self.over_fetch(snapshot, &bag, RawScoring::Coverage, q.threshold, filter.as_ref())?
        };

        let mut hits = Vec::with_capacity(candidates.len());
        for Candidate { doc_id, score } in candidates {
            let tu = snapshot.document(doc_id)?.into_translation_unit()?;
            hits.push(TmHit { tu, doc_id, score, match_type: MatchType::Concordance, code_mismatch: false });
        }
        Ok(scoring::finish(hits, Some(q.max_hits)))
    }

    /// Requests `cap`, `2 * cap`, ... candidates until a round comes back
    /// short or the whole index has been covered.
    fn over_fetch(
        &self,
        snapshot: &Snapshot,
        bag: &NgramBag,
        raw: RawScoring,
        threshold: f32,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<Candidate>> {
        let max_doc = snapshot.max_doc() as usize;
        let cap = self.search.candidate_cap(max_doc);
        let mut limit = 0;
        let mut rounds = 0;
        loop {
            limit += cap;
            rounds += 1;
            let candidates = snapshot.ngram_candidates(bag, raw, threshold, filter, limit)?;
            if candidates.len() < limit || limit >= max_doc {
                debug!(ngrams = bag.total(), candidates = candidates.len(), cap, rounds, "collected candidates");
                return Ok(candidates);
            }
        }
    }
}

impl TmSeeker for TantivySeeker {
    fn search_exact(&self, query: &TextFragment, metadata: Option<&Metadata>) -> Result<Vec<TmHit>> {
        let mut q = Query::exact(query.clone());
        if let Some(m) = metadata {
            q = q.with_metadata(m.clone());
        }
        self.search(&q)
    }

    fn search_fuzzy(
        &self,
        query: &TextFragment,
        threshold: f32,
        max_hits: usize,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<TmHit>> {
        let mut q = Query::fuzzy(query.clone(), threshold, max_hits);
        if let Some(m) = metadata {
            q = q.with_metadata(m.clone());
        }
        self.search(&q)
    }

    fn search_concordance(
        &self,
        query: &str,
        threshold: f32,
        max_hits: usize,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<TmHit>> {
        let mut q = Query::concordance(query, threshold, max_hits);
        if let Some(m) = metadata {
            q = q.with_metadata(m.clone());
        }
        self.search(&q)
    }

    fn translation_units(&self) -> Result<Vec<TranslationUnit>> {
        self.manager.snapshot()?.translation_units()
    }

    fn close(&self) -> Result<()> {
        self.manager.close()
    }
}
