use crate::error::StoreError;
use crate::types::{Candidate, Chunk, Corpus};

/// Deterministic text -> fixed-dimension vector function.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Relevance of one passage, addressed by its position in the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}

/// Stateless (query, passage) relevance scorer.
///
/// Implementations return one entry per passage, sorted best-first, with
/// scores already in [0,1].
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<RerankScore>>;
}

/// Persistent nearest-neighbour index keyed by chunk id. System of record for
/// the corpus.
pub trait VectorStore: Send + Sync {
    /// Up to `k` chunks nearest to `embedding`, best first. A store that has
    /// never been written to answers with an empty list.
    fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError>;

    /// Insert or replace chunks by id.
    fn upsert(&self, chunks: &[Chunk]) -> Result<(), StoreError>;

    /// Every persisted chunk, used to seed the lexical index.
    fn get_all(&self) -> Result<Corpus, StoreError>;
}
