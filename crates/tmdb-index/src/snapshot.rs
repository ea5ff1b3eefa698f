//! Immutable point-in-time view of the index.
//!
//! A `Snapshot` wraps one tantivy `Searcher` generation. Doc ids handed out
//! here are global (segment base offset + segment-local id) and are only
//! meaningful against the snapshot that produced them.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use tantivy::collector::DocSetCollector;
use tantivy::postings::Postings;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocAddress, DocSet, Searcher, SegmentReader, TantivyDocument, Term, TERMINATED};

use tmdb_core::error::{Error, IoContext, Result};
use tmdb_core::{DocId, Document, Metadata, TranslationUnit};

use crate::analyzer::{NgramAnalyzer, NgramBag};
use crate::scoring::RawScoring;
use crate::tantivy_utils::{TmFields, SOURCE_NGRAMS};

/// Set of global doc ids allowed by a metadata filter.
pub type DocFilter = HashSet<DocId>;

/// A document sharing n-grams with the query, with its raw similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub doc_id: DocId,
    pub score: f32,
}

/// Orders candidates best first: higher score, then lower doc id.
struct Ranked(Candidate);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.score.total_cmp(&other.0.score).then_with(|| other.0.doc_id.cmp(&self.0.doc_id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

#[derive(Clone)]
pub struct Snapshot {
    searcher: Searcher,
    fields: Arc<TmFields>,
    analyzer: NgramAnalyzer,
    bases: Arc<Vec<DocId>>,
}

impl Snapshot {
    pub(crate) fn new(searcher: Searcher, fields: Arc<TmFields>, analyzer: NgramAnalyzer) -> Self {
        let mut bases = Vec::with_capacity(searcher.segment_readers().len());
        let mut next: DocId = 0;
        for segment in searcher.segment_readers() {
            bases.push(next);
            next += segment.max_doc() as DocId;
        }
        Self { searcher, fields, analyzer, bases: Arc::new(bases) }
    }

    pub fn analyzer(&self) -> &NgramAnalyzer {
        &self.analyzer
    }

    /// Upper bound of doc ids, deleted documents included.
    pub fn max_doc(&self) -> u64 {
        self.searcher.segment_readers().iter().map(|s| s.max_doc() as u64).sum()
    }

    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    fn address(&self, doc_id: DocId) -> Option<DocAddress> {
        let ord = self.bases.partition_point(|base| *base <= doc_id).checked_sub(1)?;
        let local = doc_id - self.bases[ord];
        let segment = &self.searcher.segment_readers()[ord];
        (local < segment.max_doc() as DocId).then(|| DocAddress::new(ord as u32, local as u32))
    }

    fn global(&self, address: DocAddress) -> DocId {
        self.bases[address.segment_ord as usize] + address.doc_id as DocId
    }

    pub fn document(&self, doc_id: DocId) -> Result<Document> {
        let address = self
            .address(doc_id)
            .ok_or_else(|| Error::invalid_argument(format!("doc id {doc_id} is outside this snapshot")))?;
        let doc: TantivyDocument = self.searcher.doc(address).io_context("loading stored document")?;
        self.fields.from_document(doc_id, &doc)
    }

    /// Every live translation unit, in index order.
    pub fn translation_units(&self) -> Result<Vec<TranslationUnit>> {
        let mut units = Vec::with_capacity(self.num_docs() as usize);
        for (ord, segment) in self.searcher.segment_readers().iter().enumerate() {
            for local in segment.doc_ids_alive() {
                let doc_id = self.bases[ord] + local as DocId;
                units.push(self.document(doc_id)?.into_translation_unit()?);
            }
        }
        Ok(units)
    }

    fn filter_clauses(&self, metadata: &Metadata) -> Vec<(Occur, Box<dyn Query>)> {
        metadata
            .iter()
            .map(|(kind, value)| {
                let term = Term::from_field_text(self.fields.metadata_field(*kind), value);
                (Occur::Must, Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn Query>)
            })
            .collect()
    }

    fn collect_sorted(&self, query: &dyn Query) -> Result<Vec<DocId>> {
        let addresses = self.searcher.search(query, &DocSetCollector).io_context("collecting documents")?;
        let mut ids: Vec<DocId> = addresses.into_iter().map(|a| self.global(a)).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Live documents matching every metadata entry. `None` when there is
    /// nothing to filter on.
    pub fn metadata_filter(&self, metadata: Option<&Metadata>) -> Result<Option<DocFilter>> {
        let Some(metadata) = metadata.filter(|m| !m.is_empty()) else {
            return Ok(None);
        };
        let query = BooleanQuery::new(self.filter_clauses(metadata));
        Ok(Some(self.collect_sorted(&query)?.into_iter().collect()))
    }

    /// Live documents whose source coded text equals `coded_text` and that
    /// satisfy `metadata`, in doc id order, at most `limit` of them.
    pub fn exact_candidates(&self, coded_text: &str, metadata: Option<&Metadata>, limit: usize) -> Result<Vec<DocId>> {
        let term = Term::from_field_text(self.fields.source_exact, coded_text);
        let mut clauses: Vec<(Occur, Box<dyn Query>)> =
            vec![(Occur::Must, Box::new(TermQuery::new(term, IndexRecordOption::Basic)))];
        if let Some(metadata) = metadata {
            clauses.extend(self.filter_clauses(metadata));
        }
        let mut ids = self.collect_sorted(&BooleanQuery::new(clauses))?;
        ids.truncate(limit);
        Ok(ids)
    }

    /// Walks the postings of every distinct query n-gram and accumulates the
    /// shared n-gram count per live document. Candidates whose raw similarity
    /// falls below `threshold` are dropped. The best `limit` candidates are
    /// kept in a bounded heap and returned raw score desc, then doc id asc.
    pub fn ngram_candidates(
        &self,
        query: &NgramBag,
        scoring: RawScoring,
        threshold: f32,
        filter: Option<&DocFilter>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        // Min-heap on rank: the root is the weakest candidate kept so far.
        let mut best: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(limit.min(4096) + 1);
        for (ord, segment) in self.searcher.segment_readers().iter().enumerate() {
            let base = self.bases[ord];
            let overlaps = self.segment_overlaps(segment, query)?;
            if overlaps.is_empty() {
                continue;
            }
            let lengths = segment.fast_fields().u64(SOURCE_NGRAMS).io_context("reading n-gram counts")?;
            for (local, overlap) in overlaps {
                let doc_id = base + local as DocId;
                if filter.is_some_and(|f| !f.contains(&doc_id)) {
                    continue;
                }
                let doc_ngrams = lengths.first(local).unwrap_or(0) as u32;
                let score = scoring.score(overlap, query.total(), doc_ngrams);
                if score < threshold {
                    continue;
                }
                best.push(Reverse(Ranked(Candidate { doc_id, score })));
                if best.len() > limit {
                    best.pop();
                }
            }
        }
        Ok(best.into_sorted_vec().into_iter().map(|Reverse(Ranked(c))| c).collect())
    }

    fn segment_overlaps(&self, segment: &SegmentReader, query: &NgramBag) -> Result<HashMap<u32, u32>> {
        let inverted = segment.inverted_index(self.fields.source).io_context("opening inverted index")?;
        let alive = segment.alive_bitset();
        let mut overlaps: HashMap<u32, u32> = HashMap::new();
        for (ngram, query_count) in query.iter() {
            let term = Term::from_field_text(self.fields.source, ngram);
            let Some(mut postings) =
                inverted.read_postings(&term, IndexRecordOption::WithFreqs).io_context("reading postings")?
            else {
                continue;
            };
            let mut doc = postings.doc();
            while doc != TERMINATED {
                if alive.map_or(true, |bits| bits.is_alive(doc)) {
                    *overlaps.entry(doc).or_insert(0) += postings.term_freq().min(query_count);
                }
                doc = postings.advance();
            }
        }
        Ok(overlaps)
    }

    /// Live documents whose source plain text contains `needle` (after the
    /// analyzer's case normalization), in doc id order. Used for concordance
    /// queries shorter than one n-gram.
    pub fn substring_candidates(&self, needle: &str, filter: Option<&DocFilter>) -> Result<Vec<DocId>> {
        let needle = self.analyzer.normalize(needle);
        let mut ids = Vec::new();
        for (ord, segment) in self.searcher.segment_readers().iter().enumerate() {
            for local in segment.doc_ids_alive() {
                let doc_id = self.bases[ord] + local as DocId;
                if filter.is_some_and(|f| !f.contains(&doc_id)) {
                    continue;
                }
                let doc = self.document(doc_id)?;
                if self.analyzer.normalize(&doc.source_text).contains(needle.as_str()) {
                    ids.push(doc_id);
                }
            }
        }
        Ok(ids)
    }
}
