//! Hybrid search orchestration.
//!
//! Stages run strictly in order: vector query, lexical query, fusion, rerank
//! of the fused head, confidence normalization. Expected conditions (empty
//! corpus, index not built, exhausted transient retries) travel as
//! [`StageOutcome`] values; anything else aborts the pipeline and triggers
//! the vector-only fallback. Nothing escapes [`HybridSearcher::search`].

use anyhow::{anyhow, ensure, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use ragdb_core::error::StoreError;
use ragdb_core::types::{Candidate, Chunk, ChunkInput, Corpus, SearchResult};
use ragdb_vector::RetryPolicy;

use crate::confidence::normalize;
use crate::context::RetrievalContext;
use crate::fusion::reciprocal_rank_fusion;

/// Ingestion embeds and upserts this many chunks at a time.
pub const INGEST_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Hits(Vec<Candidate>),
    Empty,
    /// Retries were exhausted; the source is treated as empty.
    TransientFault(String),
}

impl StageOutcome {
    fn from_hits(hits: Vec<Candidate>) -> Self {
        if hits.is_empty() { Self::Empty } else { Self::Hits(hits) }
    }

    pub fn is_fault(&self) -> bool { matches!(self, Self::TransientFault(_)) }

    pub fn into_candidates(self) -> Vec<Candidate> {
        match self {
            Self::Hits(hits) => hits,
            Self::Empty | Self::TransientFault(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Full pipeline ran over healthy sources.
    Matched,
    /// Neither source had a candidate.
    NoMatches,
    /// A source faulted or the fallback path produced the results.
    Degraded,
    /// Both the pipeline and the fallback failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub results: Vec<SearchResult>,
    pub status: SearchStatus,
}

impl SearchReport {
    fn empty(status: SearchStatus) -> Self { Self { results: Vec::new(), status } }
}

pub struct HybridSearcher {
    ctx: Arc<RetrievalContext>,
    retry: RetryPolicy,
}

impl HybridSearcher {
    pub fn new(ctx: Arc<RetrievalContext>) -> Self {
        let retry = RetryPolicy::from_settings(&ctx.settings().retry);
        Self { ctx, retry }
    }

    pub fn context(&self) -> &RetrievalContext { &self.ctx }

    /// Best-effort search. Never fails; the status tells an empty corpus apart
    /// from a broken pipeline.
    pub fn search(&self, query: &str) -> SearchReport {
        match self.run_pipeline(query) {
            Ok(report) => report,
            Err(err) => {
                error!("Hybrid search failed: {:#}; falling back to vector search", err);
                match self.fallback(query) {
                    Ok(results) if results.is_empty() => SearchReport::empty(SearchStatus::Failed),
                    Ok(results) => SearchReport { results, status: SearchStatus::Degraded },
                    Err(err) => {
                        error!("Fallback search failed: {:#}", err);
                        SearchReport::empty(SearchStatus::Failed)
                    }
                }
            }
        }
    }

    /// Ranked results only; an empty list means "nothing relevant found".
    pub fn hybrid_search(&self, query: &str) -> Vec<SearchResult> { self.search(query).results }

    fn run_pipeline(&self, query: &str) -> Result<SearchReport> {
        let settings = self.ctx.settings();
        let vector = self.vector_stage(query, settings.candidates_per_source)?;
        let lexical = self.lexical_stage(query, settings.candidates_per_source)?;
        let degraded = vector.is_fault() || lexical.is_fault();

        let vector_hits = vector.into_candidates();
        let lexical_hits = lexical.into_candidates();
        debug!("Vector search: {} results; BM25 search: {} results", vector_hits.len(), lexical_hits.len());
        if vector_hits.is_empty() && lexical_hits.is_empty() {
            info!("No candidates from either source for '{}'", query);
            let status = if degraded { SearchStatus::Degraded } else { SearchStatus::NoMatches };
            return Ok(SearchReport::empty(status));
        }

        let mut fused = reciprocal_rank_fusion(&vector_hits, &lexical_hits, settings.rrf_k);
        fused.truncate(settings.rerank_pool);
        debug!("Fused to {} candidates", fused.len());

        let mut results = self.rerank(query, fused, settings.final_top_n)?;
        normalize(&mut results);
        for r in &results {
            info!("Reranked: confidence={:.3} score={:.3} source={}", r.confidence, r.score, r.source);
        }
        let status = if degraded { SearchStatus::Degraded } else { SearchStatus::Matched };
        Ok(SearchReport { results, status })
    }

    fn vector_stage(&self, query: &str, k: usize) -> Result<StageOutcome> {
        let embedding = self.ctx.embedder()?.embed_one(query)?;
        match self.retry.run("vector query", || self.ctx.store().query_nearest(&embedding, k)) {
            Ok(hits) => Ok(StageOutcome::from_hits(hits)),
            Err(StoreError::Transient(msg)) => {
                warn!("Vector search unavailable after {} attempts: {}", self.retry.max_attempts(), msg);
                Ok(StageOutcome::TransientFault(msg))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn lexical_stage(&self, query: &str, k: usize) -> Result<StageOutcome> {
        if !self.ctx.lexical().is_built() {
            debug!("BM25 index not built; keyword search skipped");
            return Ok(StageOutcome::Empty);
        }
        Ok(StageOutcome::from_hits(self.ctx.lexical().query(query, k)?))
    }

    /// Score `candidates` with the cross-encoder and keep the best `top_n`.
    /// `confidence` is left equal to the raw score.
    fn rerank(&self, query: &str, candidates: Vec<Candidate>, top_n: usize) -> Result<Vec<SearchResult>> {
        if candidates.is_empty() { return Ok(Vec::new()); }
        let passages: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self.ctx.reranker()?.rerank(query, &passages)?;
        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut results = Vec::with_capacity(top_n.min(slots.len()));
        for s in scores.into_iter().take(top_n) {
            let candidate = slots
                .get_mut(s.index)
                .and_then(Option::take)
                .ok_or_else(|| anyhow!("reranker returned invalid passage index {}", s.index))?;
            results.push(SearchResult::from_candidate(candidate, s.score));
        }
        Ok(results)
    }

    /// Vector search plus rerank, with confidence equal to the raw reranker
    /// score.
    fn fallback(&self, query: &str) -> Result<Vec<SearchResult>> {
        let settings = self.ctx.settings();
        let embedding = self.ctx.embedder()?.embed_one(query)?;
        let hits = self.retry.run("fallback vector query", || {
            self.ctx.store().query_nearest(&embedding, settings.candidates_per_source)
        })?;
        let results = self.rerank(query, hits, settings.final_top_n)?;
        info!("Fallback search returned {} results", results.len());
        Ok(results)
    }

    /// Replace the keyword index with `corpus`. An empty corpus disables
    /// keyword search until the next rebuild.
    pub fn rebuild_lexical_index(&self, corpus: Corpus) -> Result<()> {
        self.ctx.lexical().rebuild(corpus)
    }

    /// Rebuild the keyword index from everything the vector store holds.
    pub fn seed_lexical_from_store(&self) -> Result<usize> {
        let corpus = self.retry.run("load corpus", || self.ctx.store().get_all())?;
        let len = corpus.len();
        self.rebuild_lexical_index(corpus)?;
        info!("Keyword index seeded with {} chunks", len);
        Ok(len)
    }

    pub fn ingest(&self, inputs: Vec<ChunkInput>) -> Result<usize> {
        self.ingest_with_progress(inputs, |_| {})
    }

    /// Embed and upsert `inputs` in batches, then rebuild the keyword index
    /// from the store. `on_batch` receives the number of chunks just stored.
    pub fn ingest_with_progress<F>(&self, inputs: Vec<ChunkInput>, mut on_batch: F) -> Result<usize>
    where
        F: FnMut(usize),
    {
        let embedder = self.ctx.embedder()?;
        let mut stored = 0;
        for batch in inputs.chunks(INGEST_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = embedder.embed_batch(&texts)?;
            ensure!(
                embeddings.len() == batch.len(),
                "embedder returned {} vectors for {} texts",
                embeddings.len(),
                batch.len()
            );
            let chunks: Vec<Chunk> = batch
                .iter()
                .zip(embeddings)
                .map(|(input, embedding)| {
                    let mut metadata = input.metadata.clone();
                    metadata
                        .extra
                        .entry("chunk_size".to_string())
                        .or_insert_with(|| serde_json::json!(input.text.chars().count()));
                    Chunk { id: input.resolved_id(), text: input.text.clone(), embedding, metadata }
                })
                .collect();
            self.retry.run("upsert", || self.ctx.store().upsert(&chunks))?;
            stored += chunks.len();
            on_batch(chunks.len());
        }
        info!("Ingested {} chunks", stored);
        self.seed_lexical_from_store()?;
        Ok(stored)
    }
}
