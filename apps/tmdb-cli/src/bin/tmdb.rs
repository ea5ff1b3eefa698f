use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tmdb_core::bilingual::{BilingualConfig, BilingualReader};
use tmdb_core::config::TmConfig;
use tmdb_core::traits::TmSeeker;
use tmdb_core::{Metadata, MetadataKind, TextFragment, TmHit};
use tmdb_index::{NgramAnalyzer, TantivySeeker, TmIndex};

#[derive(Parser, Debug)]
#[command(name = "tmdb", version, about = "Translation memory lookup: exact, fuzzy and concordance matches")]
struct Cli {
    /// Index directory (overrides `index.path` from configuration)
    #[arg(long, global = true)]
    index: Option<String>,

    /// Print hits as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Restrict hits to units imported from this file
    #[arg(long, global = true)]
    file_name: Option<String>,

    /// Restrict hits to units with this origin
    #[arg(long, global = true)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import tab-separated `source<TAB>target` lines
    Import {
        file: PathBuf,
        #[arg(long, default_value = "en")]
        source_locale: String,
        #[arg(long, default_value = "fr")]
        target_locale: String,
        /// Recreate the index before importing
        #[arg(long)]
        create: bool,
        /// Replace units with the same source text
        #[arg(long)]
        overwrite: bool,
        /// Origin stamped on every imported unit
        #[arg(long = "set-origin")]
        set_origin: Option<String>,
    },
    /// Units whose source equals the query exactly
    Exact { text: String },
    /// Ranked approximate matches
    Fuzzy {
        text: String,
        #[arg(short, long, default_value_t = 80.0)]
        threshold: f32,
        #[arg(short, long, default_value_t = 10)]
        max_hits: usize,
    },
    /// Units containing the query text
    Concordance {
        text: String,
        #[arg(short, long, default_value_t = 80.0)]
        threshold: f32,
        #[arg(short, long, default_value_t = 10)]
        max_hits: usize,
    },
    /// Print every unit in index order
    List {
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = TmConfig::load().context("loading configuration")?;
    if let Some(index) = &cli.index {
        config.index.path = index.clone();
    }
    let index_path = config.index.resolved_path();
    let analyzer = NgramAnalyzer::from_config(&config.analyzer);

    match &cli.command {
        Command::Import { file, source_locale, target_locale, create, overwrite, set_origin } => {
            let index =
                if *create { TmIndex::create_in_dir(&index_path, analyzer)? } else { TmIndex::from_config(&config)? };
            let reader = BilingualReader::new(BilingualConfig {
                source_locale: source_locale.as_str().into(),
                target_locale: target_locale.as_str().into(),
                origin: set_origin.clone(),
            });
            let batch = reader.read_file(file).with_context(|| format!("reading {}", file.display()))?;
            let writer = index.writer(config.index.writer_memory_bytes)?;

            let pb = ProgressBar::new(batch.units.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%)",
                    )?
                    .progress_chars("#>-"),
            );
            let mut added = 0usize;
            for tu in &batch.units {
                if writer.index_translation_unit(tu, *overwrite)?.is_some() {
                    added += 1;
                }
                pb.inc(1);
            }
            writer.commit()?;
            writer.close()?;
            pb.finish_and_clear();
            info!(added, skipped = batch.skipped_lines, path = %index_path.display(), "import finished");
            println!("Imported {} units into {} ({} lines skipped)", added, index_path.display(), batch.skipped_lines);
        }
        Command::List { limit } => {
            let seeker = open_seeker(&index_path, analyzer, &config)?;
            let units = seeker.translation_units()?;
            for tu in units.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{}\t{}", tu.source.content.to_display_text(), tu.target.content.to_display_text());
            }
            seeker.close()?;
        }
        Command::Exact { text } => {
            let seeker = open_seeker(&index_path, analyzer, &config)?;
            let hits = seeker.search_exact(&TextFragment::from_text(text), filter(&cli).as_ref())?;
            print_hits(&hits, cli.json)?;
            seeker.close()?;
        }
        Command::Fuzzy { text, threshold, max_hits } => {
            let seeker = open_seeker(&index_path, analyzer, &config)?;
            let hits =
                seeker.search_fuzzy(&TextFragment::from_text(text), *threshold, *max_hits, filter(&cli).as_ref())?;
            print_hits(&hits, cli.json)?;
            seeker.close()?;
        }
        Command::Concordance { text, threshold, max_hits } => {
            let seeker = open_seeker(&index_path, analyzer, &config)?;
            let hits = seeker.search_concordance(text, *threshold, *max_hits, filter(&cli).as_ref())?;
            print_hits(&hits, cli.json)?;
            seeker.close()?;
        }
    }
    Ok(())
}

// Queries need an existing index; `index.mode` picks the consistency mode.
fn open_seeker(path: &std::path::Path, analyzer: NgramAnalyzer, config: &TmConfig) -> Result<TantivySeeker> {
    let index = TmIndex::open_in_dir(path, analyzer)?;
    Ok(TantivySeeker::from_config(index, config)?)
}

fn filter(cli: &Cli) -> Option<Metadata> {
    let mut metadata = Metadata::new();
    if let Some(name) = &cli.file_name {
        metadata.insert(MetadataKind::FileName, name.clone());
    }
    if let Some(origin) = &cli.origin {
        metadata.insert(MetadataKind::Origin, origin.clone());
    }
    (!metadata.is_empty()).then_some(metadata)
}

fn print_hits(hits: &[TmHit], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No matches.");
    }
    for hit in hits {
        let flag = if hit.code_mismatch { " (codes differ)" } else { "" };
        println!(
            "{:>6.2}  {:<15} {}\t{}{}",
            hit.score,
            hit.match_type.to_string(),
            hit.tu.source.content.to_display_text(),
            hit.tu.target.content.to_display_text(),
            flag
        );
    }
    Ok(())
}
