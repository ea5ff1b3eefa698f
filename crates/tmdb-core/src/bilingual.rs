//! Tab-separated bilingual text → translation units.
//!
//! One unit per line: `source<TAB>target`. Lines without a tab, or with an
//! empty source after trimming, are skipped and counted.

use std::fs;
use std::path::Path;

use crate::error::{IoContext, Result};
use crate::types::{LocaleId, MetadataKind, TranslationUnit, TranslationUnitVariant};

#[derive(Debug, Clone)]
pub struct BilingualConfig {
    pub source_locale: LocaleId,
    pub target_locale: LocaleId,
    /// Stamped on every unit as `MetadataKind::Origin` when set.
    pub origin: Option<String>,
}

#[derive(Debug, Default)]
pub struct BilingualBatch {
    pub units: Vec<TranslationUnit>,
    pub skipped_lines: usize,
}

pub struct BilingualReader {
    config: BilingualConfig,
}

impl BilingualReader {
    pub fn new(config: BilingualConfig) -> Self {
        Self { config }
    }

    pub fn read_file(&self, path: &Path) -> Result<BilingualBatch> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => String::from_utf8_lossy(&fs::read(path).io_context("reading bilingual file")?).to_string(),
        };
        Ok(self.parse(&content, &path.to_string_lossy()))
    }

    pub fn parse(&self, content: &str, file_name: &str) -> BilingualBatch {
        let mut batch = BilingualBatch::default();
        for (line_no, line) in content.lines().enumerate() {
            let Some((source, target)) = line.split_once('\t') else {
                if !line.trim().is_empty() {
                    batch.skipped_lines += 1;
                }
                continue;
            };
            let source = source.trim();
            if source.is_empty() {
                batch.skipped_lines += 1;
                continue;
            }
            let mut tu = TranslationUnit::new(
                TranslationUnitVariant::new(self.config.source_locale.clone(), source),
                TranslationUnitVariant::new(self.config.target_locale.clone(), target.trim()),
            )
            .with_metadata(MetadataKind::FileName, file_name)
            .with_metadata(MetadataKind::Id, format!("{}:{}", file_name, line_no + 1));
            if let Some(origin) = &self.config.origin {
                tu = tu.with_metadata(MetadataKind::Origin, origin.clone());
            }
            batch.units.push(tu);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> BilingualReader {
        BilingualReader::new(BilingualConfig { source_locale: "EN".into(), target_locale: "fr".into(), origin: None })
    }

    #[test]
    fn parses_pairs_and_counts_skips() {
        let batch = reader().parse("Hello\tBonjour\nno tab here\n\n\tonly target\nBye\tAu revoir\n", "t.tsv");
        assert_eq!(batch.units.len(), 2);
        assert_eq!(batch.skipped_lines, 2);
        assert_eq!(batch.units[1].source.content.text(), "Bye");
        assert_eq!(batch.units[1].metadata_value(MetadataKind::Id), Some("t.tsv:5"));
        assert_eq!(batch.units[0].source.locale.as_str(), "en");
    }
}
