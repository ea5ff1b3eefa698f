//! Raw similarity formulas, fuzzy score adjustment, de-duplication and ranking.

use std::cmp::Ordering;
use std::collections::HashSet;

use tmdb_core::config::SearchConfig;
use tmdb_core::{MatchType, TextFragment, TmHit, TranslationUnit};

/// How shared n-grams turn into a raw score in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawScoring {
    /// `200 * shared / (|Q| + |D|)`; identical texts score exactly 100.
    Dice,
    /// `100 * shared / |Q|`; a query contained in the document scores 100.
    Coverage,
}

impl RawScoring {
    pub fn score(self, shared: u32, query_ngrams: u32, doc_ngrams: u32) -> f32 {
        let score = match self {
            RawScoring::Dice => {
                let total = query_ngrams + doc_ngrams;
                if total == 0 {
                    return 0.0;
                }
                200.0 * shared as f32 / total as f32
            }
            RawScoring::Coverage => {
                if query_ngrams == 0 {
                    return 0.0;
                }
                100.0 * shared as f32 / query_ngrams as f32
            }
        };
        score.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub whitespace_or_case_penalty: f32,
    pub single_code_diff_penalty: f32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// Outcome of adjusting one fuzzy candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjusted {
    pub match_type: MatchType,
    pub score: f32,
    pub code_mismatch: bool,
}

impl ScoringPolicy {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            whitespace_or_case_penalty: config.whitespace_or_case_penalty,
            single_code_diff_penalty: config.single_code_diff_penalty,
        }
    }

    /// Classifies a fuzzy candidate and applies the penalties. The threshold
    /// is not applied here.
    pub fn adjust_fuzzy(&self, query: &TextFragment, candidate: &TranslationUnit, raw: f32) -> Adjusted {
        let source = &candidate.source.content;
        let mut score = raw;
        let match_type = if source.coded_text() == query.coded_text() {
            MatchType::Exact
        } else if source.text() == query.text() {
            MatchType::ExactTextOnly
        } else {
            // Full n-gram overlap without equal text: only whitespace or case differs.
            if score >= 100.0 {
                score -= self.whitespace_or_case_penalty;
            }
            MatchType::Fuzzy
        };

        let code_diff = source.codes().len().abs_diff(query.codes().len());
        let code_mismatch = code_diff > 0;
        if code_mismatch {
            score -= self.single_code_diff_penalty * code_diff as f32;
        }

        Adjusted { match_type, score: score.clamp(0.0, 100.0), code_mismatch }
    }
}

/// Removes repeated hits, keeping the first of each. Two hits are the same
/// when match type, score, code-mismatch flag and translation unit agree.
pub fn dedup(hits: Vec<TmHit>) -> Vec<TmHit> {
    let mut seen: HashSet<(MatchType, u32, bool, TranslationUnit)> = HashSet::with_capacity(hits.len());
    hits.into_iter()
        .filter(|h| seen.insert((h.match_type, h.score.to_bits(), h.code_mismatch, h.tu.clone())))
        .collect()
}

/// Match-type priority, score desc, source plain text asc, doc id asc.
pub fn compare(a: &TmHit, b: &TmHit) -> Ordering {
    a.match_type
        .cmp(&b.match_type)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.source_text().cmp(&b.source_text()))
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// De-duplicates, ranks and caps a hit list.
pub fn finish(hits: Vec<TmHit>, max_hits: Option<usize>) -> Vec<TmHit> {
    let mut hits = dedup(hits);
    hits.sort_by(compare);
    if let Some(max) = max_hits {
        hits.truncate(max);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmdb_core::{TagType, TranslationUnitVariant};

    fn unit(source: TextFragment) -> TranslationUnit {
        TranslationUnit::new(
            TranslationUnitVariant { locale: "en".into(), content: source },
            TranslationUnitVariant::new("fr", "t"),
        )
    }

    fn hit(text: &str, doc_id: u64, score: f32, match_type: MatchType) -> TmHit {
        TmHit { tu: unit(text.into()), doc_id, score, match_type, code_mismatch: false }
    }

    fn with_two_codes(text: &str) -> TextFragment {
        let mut tf = TextFragment::new();
        tf.append_code(TagType::Opening, "b", "<b>").unwrap();
        tf.append_text(text);
        tf.append_code(TagType::Closing, "b", "</b>").unwrap();
        tf
    }

    #[test]
    fn dice_of_identical_bags_is_100() {
        assert_eq!(RawScoring::Dice.score(7, 7, 7), 100.0);
        assert_eq!(RawScoring::Dice.score(0, 0, 0), 0.0);
        assert_eq!(RawScoring::Dice.score(3, 4, 8), 50.0);
    }

    #[test]
    fn coverage_of_contained_query_is_100() {
        assert_eq!(RawScoring::Coverage.score(5, 5, 40), 100.0);
        assert_eq!(RawScoring::Coverage.score(1, 4, 40), 25.0);
    }

    #[test]
    fn equal_coded_text_is_exact() {
        let q = with_two_codes("Hello");
        let a = ScoringPolicy::default().adjust_fuzzy(&q, &unit(q.clone()), 100.0);
        assert_eq!(a, Adjusted { match_type: MatchType::Exact, score: 100.0, code_mismatch: false });
    }

    #[test]
    fn two_codes_against_none_costs_one_point() {
        let q = TextFragment::from_text("Hello");
        let a = ScoringPolicy::default().adjust_fuzzy(&q, &unit(with_two_codes("Hello")), 100.0);
        assert_eq!(a.match_type, MatchType::ExactTextOnly);
        assert!(a.code_mismatch);
        assert_eq!(a.score, 99.0);
    }

    #[test]
    fn full_overlap_with_different_text_is_penalized() {
        let q = TextFragment::from_text("Help");
        let a = ScoringPolicy::default().adjust_fuzzy(&q, &unit("help".into()), 100.0);
        assert_eq!(a.match_type, MatchType::Fuzzy);
        assert_eq!(a.score, 98.0);
    }

    #[test]
    fn score_is_clamped() {
        let policy = ScoringPolicy { whitespace_or_case_penalty: 2.0, single_code_diff_penalty: 60.0 };
        let q = TextFragment::from_text("abcdef");
        let a = policy.adjust_fuzzy(&q, &unit(with_two_codes("abcxyz")), 20.0);
        assert_eq!(a.score, 0.0);
    }

    #[test]
    fn dedup_ignores_doc_id_and_keeps_first() {
        let hits = vec![
            hit("same", 4, 90.0, MatchType::Fuzzy),
            hit("same", 1, 90.0, MatchType::Fuzzy),
            hit("same", 2, 80.0, MatchType::Fuzzy),
        ];
        let out = dedup(hits);
        assert_eq!(out.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![4, 2]);
    }

    #[test]
    fn ranking_order() {
        let hits = vec![
            hit("b", 5, 90.0, MatchType::Fuzzy),
            hit("a", 6, 90.0, MatchType::Fuzzy),
            hit("z", 7, 95.0, MatchType::Fuzzy),
            hit("y", 8, 100.0, MatchType::ExactTextOnly),
            hit("x", 9, 100.0, MatchType::Exact),
        ];
        let out = finish(hits, Some(4));
        let texts: Vec<_> = out.iter().map(|h| h.source_text()).collect();
        assert_eq!(texts, vec!["x", "y", "z", "a"]);
    }
}
