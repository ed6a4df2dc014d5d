//! Shared retrieval resources.
//!
//! One [`RetrievalContext`] is built at process start and handed to every
//! query handler. Models are loaded on first use and then reused; the lexical
//! index and vector store are shared by reference.

use anyhow::Result;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::info;

use ragdb_core::config::{expand_path, Config, ModelSettings, RetrievalSettings};
use ragdb_core::traits::{Embedder, Reranker, VectorStore};
use ragdb_core::types::SearchResult;
use ragdb_embed::{embedder_from_dir, reranker_from_dir, BGE_M3_DIM};
use ragdb_text::LexicalIndex;
use ragdb_vector::open_store;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// Construct-on-first-use slot. Initialization runs at most once at a time;
/// a failed attempt leaves the slot empty so a later call can retry.
pub struct Lazy<T: ?Sized> {
    cell: OnceLock<Arc<T>>,
    init: Mutex<()>,
    factory: Factory<T>,
}

impl<T: ?Sized> Lazy<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self { cell: OnceLock::new(), init: Mutex::new(()), factory: Box::new(factory) }
    }

    /// Slot that already holds `value`.
    pub fn ready(value: Arc<T>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(value);
        Self {
            cell,
            init: Mutex::new(()),
            factory: Box::new(|| Err(anyhow::anyhow!("lazy slot was created initialized"))),
        }
    }

    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(value) = self.cell.get() { return Ok(Arc::clone(value)); }
        let _guard = self.init.lock();
        if let Some(value) = self.cell.get() { return Ok(Arc::clone(value)); }
        let value = (self.factory)()?;
        let _ = self.cell.set(Arc::clone(&value));
        Ok(value)
    }

    pub fn is_initialized(&self) -> bool { self.cell.get().is_some() }
}

fn model_dir(dir: Option<&String>) -> Option<PathBuf> { dir.map(expand_path) }

pub struct RetrievalContext {
    embedder: Lazy<dyn Embedder>,
    reranker: Lazy<dyn Reranker>,
    lexical: Arc<LexicalIndex>,
    store: Arc<dyn VectorStore>,
    settings: RetrievalSettings,
}

impl RetrievalContext {
    pub fn builder(store: Arc<dyn VectorStore>) -> RetrievalContextBuilder {
        RetrievalContextBuilder {
            store,
            embedder: None,
            reranker: None,
            lexical: None,
            settings: RetrievalSettings::default(),
            models: ModelSettings::default(),
        }
    }

    /// Open the configured store and wire model factories from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let retrieval = config.retrieval()?;
        let store = open_store(&config.storage()?, BGE_M3_DIM, &retrieval.retry.transient_markers)?;
        Ok(Self::builder(store).settings(retrieval).models(config.models()?).build())
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> { self.embedder.get() }
    pub fn reranker(&self) -> Result<Arc<dyn Reranker>> { self.reranker.get() }
    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }
    pub fn store(&self) -> &dyn VectorStore { self.store.as_ref() }
    pub fn settings(&self) -> &RetrievalSettings { &self.settings }
    pub fn models_loaded(&self) -> (bool, bool) { (self.embedder.is_initialized(), self.reranker.is_initialized()) }
}

pub struct RetrievalContextBuilder {
    store: Arc<dyn VectorStore>,
    embedder: Option<Lazy<dyn Embedder>>,
    reranker: Option<Lazy<dyn Reranker>>,
    lexical: Option<Arc<LexicalIndex>>,
    settings: RetrievalSettings,
    models: ModelSettings,
}

impl RetrievalContextBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(Lazy::ready(embedder));
        self
    }

    pub fn embedder_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        self.embedder = Some(Lazy::new(factory));
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(Lazy::ready(reranker));
        self
    }

    pub fn reranker_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Reranker>> + Send + Sync + 'static,
    {
        self.reranker = Some(Lazy::new(factory));
        self
    }

    pub fn lexical(mut self, index: Arc<LexicalIndex>) -> Self {
        self.lexical = Some(index);
        self
    }

    pub fn settings(mut self, settings: RetrievalSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn models(mut self, models: ModelSettings) -> Self {
        self.models = models;
        self
    }

    pub fn build(self) -> RetrievalContext {
        let embed_dir = model_dir(self.models.embed_model_dir.as_ref());
        let rerank_dir = model_dir(self.models.reranker_model_dir.as_ref());
        let embedder = self.embedder.unwrap_or_else(|| {
            Lazy::new(move || {
                info!("Initializing embedding model");
                Ok(Arc::from(embedder_from_dir(embed_dir.as_deref())?))
            })
        });
        let reranker = self.reranker.unwrap_or_else(|| {
            Lazy::new(move || {
                info!("Initializing reranker");
                Ok(Arc::from(reranker_from_dir(rerank_dir.as_deref())?))
            })
        });
        RetrievalContext {
            embedder,
            reranker,
            lexical: self.lexical.unwrap_or_default(),
            store: self.store,
            settings: self.settings,
        }
    }
}

pub const NO_CONTEXT: &str = "No relevant context found.";

/// Passages of the first `top_k` results joined by a blank line, ready for a
/// generation prompt. `None` when there is nothing to show.
pub fn render_context(results: &[SearchResult], top_k: usize) -> Option<String> {
    let passages: Vec<&str> = results.iter().take(top_k).map(SearchResult::text).collect();
    if passages.is_empty() { None } else { Some(passages.join("\n\n")) }
}
