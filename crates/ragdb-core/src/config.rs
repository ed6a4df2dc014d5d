//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, DEFAULT_TRANSIENT_MARKERS};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract a section, falling back to its defaults when the key is absent.
    pub fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    pub fn retrieval(&self) -> anyhow::Result<RetrievalSettings> { self.section("retrieval") }
    pub fn storage(&self) -> anyhow::Result<StorageSettings> { self.section("storage") }
    pub fn models(&self) -> anyhow::Result<ModelSettings> { self.section("models") }

    fn validate(&self) -> anyhow::Result<()> {
        self.retrieval()?.validate()?;
        Ok(())
    }
}

/// Candidate budgets and thresholds for the hybrid pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates requested from each of the vector and lexical sources.
    pub candidates_per_source: usize,
    /// Fused candidates sent to the reranker.
    pub rerank_pool: usize,
    /// Results returned after reranking.
    pub final_top_n: usize,
    pub rrf_k: f32,
    /// Top-result confidence under which answer synthesis is refused.
    pub low_confidence_threshold: f32,
    pub retry: RetrySettings,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            candidates_per_source: 10,
            rerank_pool: 10,
            final_top_n: 5,
            rrf_k: 60.0,
            low_confidence_threshold: 0.25,
            retry: RetrySettings::default(),
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.candidates_per_source == 0 || self.rerank_pool == 0 || self.final_top_n == 0 {
            return Err(Error::InvalidConfig("retrieval budgets must be positive".into()));
        }
        if self.final_top_n > self.rerank_pool {
            return Err(Error::InvalidConfig(format!(
                "final_top_n ({}) exceeds rerank_pool ({})",
                self.final_top_n, self.rerank_pool
            )));
        }
        if self.rrf_k <= 0.0 {
            return Err(Error::InvalidConfig("rrf_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            return Err(Error::InvalidConfig("low_confidence_threshold must lie in [0,1]".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    /// Lower-case substrings that mark a storage error as transient.
    pub transient_markers: Vec<String>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            transient_markers: DEFAULT_TRANSIENT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration { Duration::from_millis(self.base_delay_ms) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub lancedb_dir: String,
    pub table: String,
    /// Keep the corpus in process memory only (no disk persistence).
    pub ephemeral: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { lancedb_dir: "data/lancedb".to_string(), table: "rag_docs".to_string(), ephemeral: false }
    }
}

impl StorageSettings {
    pub fn lancedb_path(&self) -> PathBuf { expand_path(&self.lancedb_dir) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embed_model_dir: Option<String>,
    pub reranker_model_dir: Option<String>,
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
