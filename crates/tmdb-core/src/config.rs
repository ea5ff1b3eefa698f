use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// How searches see index mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// One reader generation is reused until explicitly refreshed.
    #[default]
    Snapshot,
    /// Every search commits pending writes and reopens the reader first.
    NearRealTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub ngram_length: usize,
    pub fold_case: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { ngram_length: 4, fold_case: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Share of `max_doc` fetched per over-fetch round.
    pub max_hits_ratio: f32,
    /// Lower bound of the per-round candidate cap.
    pub min_max_hits: usize,
    pub whitespace_or_case_penalty: f32,
    pub single_code_diff_penalty: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_hits_ratio: 0.01,
            min_max_hits: 500,
            whitespace_or_case_penalty: 2.0,
            single_code_diff_penalty: 0.5,
        }
    }
}

impl SearchConfig {
    /// `max(max_hits_ratio * max_doc, min_max_hits)`, never zero.
    pub fn candidate_cap(&self, max_doc: usize) -> usize {
        let ratio_cap = (max_doc as f32 * self.max_hits_ratio) as usize;
        ratio_cap.max(self.min_max_hits).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: String,
    pub writer_memory_bytes: usize,
    pub mode: ConsistencyMode,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { path: "~/.tmdb/index".to_string(), writer_memory_bytes: 50_000_000, mode: ConsistencyMode::Snapshot }
    }
}

impl IndexConfig {
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmConfig {
    pub analyzer: AnalyzerConfig,
    pub search: SearchConfig,
    pub index: IndexConfig,
}

impl TmConfig {
    /// Defaults, then `tmdb.toml`, then `tmdb.<env>.toml`, then `TMDB_*`.
    pub fn load() -> Result<Self> {
        Config::load()?.typed()
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: TmConfig = figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analyzer.ngram_length == 0 {
            return Err(Error::Config("analyzer.ngram_length must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.search.max_hits_ratio) {
            return Err(Error::Config(format!(
                "search.max_hits_ratio must be within [0, 1], got {}",
                self.search.max_hits_ratio
            )));
        }
        if self.search.min_max_hits == 0 {
            return Err(Error::Config("search.min_max_hits must be at least 1".into()));
        }
        for (name, v) in [
            ("whitespace_or_case_penalty", self.search.whitespace_or_case_penalty),
            ("single_code_diff_penalty", self.search.single_code_diff_penalty),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Config(format!("search.{name} must be a non-negative number, got {v}")));
            }
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(TmConfig::default())).merge(Toml::file("tmdb.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("tmdb.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("tmdb.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("tmdb.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("TMDB_").split("__"));

        Ok(Self { figment })
    }

    pub fn typed(&self) -> Result<TmConfig> {
        TmConfig::from_figment(&self.figment)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
