//! Domain types shared by the index and its callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::fragment::{Code, TextFragment};

/// Normalized locale tag: trimmed, `_` replaced by `-`, lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocaleId(String);

impl LocaleId {
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().replace('_', "-").to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocaleId {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Closed set of metadata kinds a unit may carry. Each kind is stored in its
/// own untokenized index field and can only be equality-filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetadataKind {
    Id,
    Type,
    FileName,
    GroupName,
    Origin,
    CreationId,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 6] = [
        MetadataKind::Id,
        MetadataKind::Type,
        MetadataKind::FileName,
        MetadataKind::GroupName,
        MetadataKind::Origin,
        MetadataKind::CreationId,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            MetadataKind::Id => "tuid",
            MetadataKind::Type => "datatype",
            MetadataKind::FileName => "file_name",
            MetadataKind::GroupName => "group_name",
            MetadataKind::Origin => "origin",
            MetadataKind::CreationId => "creation_id",
        }
    }
}

pub type Metadata = BTreeMap<MetadataKind, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranslationUnitVariant {
    pub locale: LocaleId,
    pub content: TextFragment,
}

impl TranslationUnitVariant {
    pub fn new(locale: impl Into<LocaleId>, content: impl Into<TextFragment>) -> Self {
        Self { locale: locale.into(), content: content.into() }
    }
}

/// A bilingual pair plus metadata. Indexed units are never edited in place;
/// an update is a delete followed by a new add.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub source: TranslationUnitVariant,
    pub target: TranslationUnitVariant,
    pub metadata: Metadata,
}

impl TranslationUnit {
    pub fn new(source: TranslationUnitVariant, target: TranslationUnitVariant) -> Self {
        Self { source, target, metadata: Metadata::new() }
    }

    pub fn with_metadata(mut self, kind: MetadataKind, value: impl Into<String>) -> Self {
        self.metadata.insert(kind, value.into());
        self
    }

    pub fn metadata_value(&self, kind: MetadataKind) -> Option<&str> {
        self.metadata.get(&kind).map(String::as_str)
    }

    pub fn is_source_empty(&self) -> bool {
        self.source.content.is_empty()
    }

    pub fn is_target_empty(&self) -> bool {
        self.target.content.is_empty()
    }
}

/// Ranking priority follows declaration order: `Exact` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchType {
    Exact,
    ExactTextOnly,
    Fuzzy,
    Concordance,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchType::Exact => "EXACT",
            MatchType::ExactTextOnly => "EXACT_TEXT_ONLY",
            MatchType::Fuzzy => "FUZZY",
            MatchType::Concordance => "CONCORDANCE",
        };
        f.write_str(s)
    }
}

/// Handle of a document inside one snapshot. Not a persistent key: it must be
/// re-resolved after the index is reopened.
pub type DocId = u64;

/// A ranked query result.
///
/// - `score` is always within `[0, 100]`
/// - `match_type` is assigned by the scoring pipeline, never by the raw query
/// - `code_mismatch` is never set on an `Exact` hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmHit {
    pub tu: TranslationUnit,
    pub doc_id: DocId,
    pub score: f32,
    pub match_type: MatchType,
    pub code_mismatch: bool,
}

impl TmHit {
    pub fn source_text(&self) -> String {
        self.tu.source.content.text()
    }
}

/// Stored index record, one per indexed translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc_id: DocId,
    pub source_locale: LocaleId,
    pub source_coded_text: String,
    pub source_text: String,
    pub source_codes: Vec<Code>,
    pub target_locale: LocaleId,
    pub target_coded_text: String,
    pub target_codes: Vec<Code>,
    pub metadata: Metadata,
}

impl Document {
    pub fn into_translation_unit(self) -> Result<TranslationUnit> {
        let source = TextFragment::from_coded(self.source_coded_text, self.source_codes)?;
        let target = TextFragment::from_coded(self.target_coded_text, self.target_codes)?;
        Ok(TranslationUnit {
            source: TranslationUnitVariant { locale: self.source_locale, content: source },
            target: TranslationUnitVariant { locale: self.target_locale, content: target },
            metadata: self.metadata,
        })
    }
}
