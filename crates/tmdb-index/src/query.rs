use tmdb_core::error::{Error, Result};
use tmdb_core::{Metadata, TextFragment};

#[derive(Debug, Clone)]
pub struct ExactQuery {
    pub fragment: TextFragment,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone)]
pub struct FuzzyQuery {
    pub fragment: TextFragment,
    pub threshold: f32,
    pub max_hits: usize,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone)]
pub struct ConcordanceQuery {
    pub text: String,
    pub threshold: f32,
    pub max_hits: usize,
    pub metadata: Option<Metadata>,
}

/// Every query kind the seeker answers.
#[derive(Debug, Clone)]
pub enum Query {
    Exact(ExactQuery),
    Fuzzy(FuzzyQuery),
    Concordance(ConcordanceQuery),
}

impl Query {
    pub fn exact(fragment: impl Into<TextFragment>) -> Self {
        Query::Exact(ExactQuery { fragment: fragment.into(), metadata: None })
    }

    pub fn fuzzy(fragment: impl Into<TextFragment>, threshold: f32, max_hits: usize) -> Self {
        Query::Fuzzy(FuzzyQuery { fragment: fragment.into(), threshold, max_hits, metadata: None })
    }

    pub fn concordance(text: impl Into<String>, threshold: f32, max_hits: usize) -> Self {
        Query::Concordance(ConcordanceQuery { text: text.into(), threshold, max_hits, metadata: None })
    }

    /// Restricts hits to units whose metadata contains every given entry.
    pub fn with_metadata(mut self, filter: Metadata) -> Self {
        let slot = match &mut self {
            Query::Exact(q) => &mut q.metadata,
            Query::Fuzzy(q) => &mut q.metadata,
            Query::Concordance(q) => &mut q.metadata,
        };
        *slot = Some(filter);
        self
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Query::Exact(q) => q.metadata.as_ref(),
            Query::Fuzzy(q) => q.metadata.as_ref(),
            Query::Concordance(q) => q.metadata.as_ref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::Exact(_) => "exact",
            Query::Fuzzy(_) => "fuzzy",
            Query::Concordance(_) => "concordance",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Query::Exact(q) => {
                if q.fragment.coded_text().is_empty() {
                    return Err(Error::invalid_argument("exact query text must not be empty"));
                }
            }
            Query::Fuzzy(q) => {
                if q.fragment.coded_text().is_empty() {
                    return Err(Error::invalid_argument("fuzzy query text must not be empty"));
                }
                validate_threshold(q.threshold)?;
            }
            Query::Concordance(q) => {
                if q.text.is_empty() {
                    return Err(Error::invalid_argument("concordance query text must not be empty"));
                }
                validate_threshold(q.threshold)?;
            }
        }
        Ok(())
    }
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(Error::invalid_argument(format!("threshold must be within [0, 100], got {threshold}")));
    }
    Ok(())
}
