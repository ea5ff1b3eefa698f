use std::collections::BTreeMap;

use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, STORED, STRING,
};
use tantivy::TantivyDocument;

use tmdb_core::error::{IoContext, Result};
use tmdb_core::{Code, DocId, Document, LocaleId, MetadataKind, TranslationUnit};

use crate::analyzer::NgramAnalyzer;

pub const SOURCE_LANG: &str = "source_lang";
pub const SOURCE_EXACT: &str = "source_exact";
pub const SOURCE: &str = "source";
pub const SOURCE_TEXT: &str = "source_text";
pub const SOURCE_CODES: &str = "source_codes";
pub const SOURCE_NGRAMS: &str = "source_ngrams";
pub const TARGET_LANG: &str = "target_lang";
pub const TARGET: &str = "target";
pub const TARGET_CODES: &str = "target_codes";

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(SOURCE_LANG, STRING | STORED);
    schema_builder.add_text_field(SOURCE_EXACT, STRING | STORED);
    // Pre-tokenized by NgramAnalyzer; the tokenizer name is never consulted.
    let ngram_indexing = TextFieldIndexing::default()
        .set_tokenizer("raw")
        .set_index_option(IndexRecordOption::WithFreqs);
    schema_builder.add_text_field(SOURCE, TextOptions::default().set_indexing_options(ngram_indexing));
    schema_builder.add_text_field(SOURCE_TEXT, STORED);
    schema_builder.add_text_field(SOURCE_CODES, STRING | STORED);
    schema_builder.add_u64_field(SOURCE_NGRAMS, FAST | STORED);
    schema_builder.add_text_field(TARGET_LANG, STRING | STORED);
    schema_builder.add_text_field(TARGET, STORED);
    schema_builder.add_text_field(TARGET_CODES, STORED);
    for kind in MetadataKind::ALL {
        schema_builder.add_text_field(kind.field_name(), STRING | STORED);
    }
    schema_builder.build()
}

/// Resolved field handles of the TM schema.
#[derive(Debug, Clone)]
pub struct TmFields {
    pub source_lang: Field,
    pub source_exact: Field,
    pub source: Field,
    pub source_text: Field,
    pub source_codes: Field,
    pub source_ngrams: Field,
    pub target_lang: Field,
    pub target: Field,
    pub target_codes: Field,
    pub metadata: BTreeMap<MetadataKind, Field>,
}

impl TmFields {
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let get = |name: &str| schema.get_field(name).io_context("resolving schema field");
        let mut metadata = BTreeMap::new();
        for kind in MetadataKind::ALL {
            metadata.insert(kind, get(kind.field_name())?);
        }
        Ok(Self {
            source_lang: get(SOURCE_LANG)?,
            source_exact: get(SOURCE_EXACT)?,
            source: get(SOURCE)?,
            source_text: get(SOURCE_TEXT)?,
            source_codes: get(SOURCE_CODES)?,
            source_ngrams: get(SOURCE_NGRAMS)?,
            target_lang: get(TARGET_LANG)?,
            target: get(TARGET)?,
            target_codes: get(TARGET_CODES)?,
            metadata,
        })
    }

    pub fn metadata_field(&self, kind: MetadataKind) -> Field {
        self.metadata[&kind]
    }

    /// Builds the stored record for `tu`; `None` when the source is empty.
    pub fn to_document(&self, analyzer: &NgramAnalyzer, tu: &TranslationUnit) -> Result<Option<TantivyDocument>> {
        if tu.is_source_empty() {
            return Ok(None);
        }
        let source = &tu.source.content;
        let plain = source.text();
        let ngrams = analyzer.pre_tokenized(&plain);

        let mut doc = TantivyDocument::default();
        doc.add_text(self.source_lang, tu.source.locale.as_str());
        doc.add_text(self.source_exact, source.coded_text());
        doc.add_u64(self.source_ngrams, ngrams.tokens.len() as u64);
        doc.add_pre_tokenized_text(self.source, ngrams);
        doc.add_text(self.source_text, &plain);
        doc.add_text(self.source_codes, Code::list_to_string(source.codes())?);
        if !tu.target.locale.is_empty() {
            doc.add_text(self.target_lang, tu.target.locale.as_str());
        }
        if !tu.is_target_empty() {
            let target = &tu.target.content;
            doc.add_text(self.target, target.coded_text());
            doc.add_text(self.target_codes, Code::list_to_string(target.codes())?);
        }
        for (kind, value) in &tu.metadata {
            doc.add_text(self.metadata_field(*kind), value);
        }
        Ok(Some(doc))
    }

    pub fn from_document(&self, doc_id: DocId, doc: &TantivyDocument) -> Result<Document> {
        let text = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
        let mut metadata = BTreeMap::new();
        for (kind, field) in &self.metadata {
            if let Some(value) = doc.get_first(*field).and_then(|v| v.as_str()) {
                metadata.insert(*kind, value.to_string());
            }
        }
        Ok(Document {
            doc_id,
            source_locale: LocaleId::new(&text(self.source_lang)),
            source_coded_text: text(self.source_exact),
            source_text: text(self.source_text),
            source_codes: Code::list_from_str(&text(self.source_codes))?,
            target_locale: LocaleId::new(&text(self.target_lang)),
            target_coded_text: text(self.target),
            target_codes: Code::list_from_str(&text(self.target_codes))?,
            metadata,
        })
    }
}
