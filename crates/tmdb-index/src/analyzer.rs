//! Character n-gram analyzer.
//!
//! The same `NgramAnalyzer` value feeds the index writer (as pre-tokenized
//! text) and the query side, so both always agree on the token stream. Its
//! settings are recorded in every commit and checked when an index is opened.
//!
//! Runs of whitespace are collapsed to one space before windowing, so texts
//! that differ only in spacing share every n-gram.

use std::collections::BTreeMap;

use tantivy::tokenizer::{PreTokenizedString, Token};
use tmdb_core::config::AnalyzerConfig;

pub const DEFAULT_NGRAM_LENGTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgramAnalyzer {
    n: usize,
    fold_case: bool,
}

impl Default for NgramAnalyzer {
    fn default() -> Self {
        Self { n: DEFAULT_NGRAM_LENGTH, fold_case: false }
    }
}

impl NgramAnalyzer {
    /// `n` below 1 is raised to 1.
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1), fold_case: false }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.ngram_length).with_fold_case(config.fold_case)
    }

    pub fn settings(&self) -> AnalyzerConfig {
        AnalyzerConfig { ngram_length: self.n, fold_case: self.fold_case }
    }

    pub fn with_fold_case(mut self, fold_case: bool) -> Self {
        self.fold_case = fold_case;
        self
    }

    pub fn ngram_length(&self) -> usize {
        self.n
    }

    pub fn fold_case(&self) -> bool {
        self.fold_case
    }

    pub(crate) fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_space = false;
        for c in text.chars() {
            if c.is_whitespace() {
                if !in_space {
                    out.push(' ');
                }
                in_space = true;
                continue;
            }
            in_space = false;
            if self.fold_case {
                out.extend(c.to_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Byte spans of every n-gram, stride one character. A non-empty text
    /// shorter than `n` is a single span covering all of it.
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        if bounds.is_empty() {
            return Vec::new();
        }
        bounds.push(text.len());
        let chars = bounds.len() - 1;
        if chars < self.n {
            return vec![(0, text.len())];
        }
        (0..=chars - self.n).map(|start| (bounds[start], bounds[start + self.n])).collect()
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let text = self.normalize(text);
        self.spans(&text).into_iter().map(|(from, to)| text[from..to].to_string()).collect()
    }

    pub fn bag(&self, text: &str) -> NgramBag {
        NgramBag::from_tokens(self.tokenize(text))
    }

    /// Token stream handed to tantivy at index time. Offsets refer to the
    /// normalized text, which is what gets attached.
    pub fn pre_tokenized(&self, text: &str) -> PreTokenizedString {
        let text = self.normalize(text);
        let tokens = self
            .spans(&text)
            .into_iter()
            .enumerate()
            .map(|(position, (from, to))| Token {
                offset_from: from,
                offset_to: to,
                position,
                text: text[from..to].to_string(),
                position_length: 1,
            })
            .collect();
        PreTokenizedString { text, tokens }
    }
}

/// Multiset of n-grams with their counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NgramBag {
    counts: BTreeMap<String, u32>,
    total: u32,
}

impl NgramBag {
    pub fn from_tokens<I: IntoIterator<Item = String>>(tokens: I) -> Self {
        let mut bag = Self::default();
        for t in tokens {
            *bag.counts.entry(t).or_insert(0) += 1;
            bag.total += 1;
        }
        bag
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
