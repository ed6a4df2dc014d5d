use parking_lot::RwLock;
use tracing::debug;

use ragdb_core::error::StoreError;
use ragdb_core::traits::VectorStore;
use ragdb_core::types::{Candidate, Chunk, Corpus};

/// Process-local store for ephemeral deployments and tests. Brute-force
/// cosine similarity; nothing survives the process.
#[derive(Default)]
pub struct MemoryVectorStore {
    rows: RwLock<Vec<Chunk>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.rows.read().len() }
    pub fn is_empty(&self) -> bool { self.rows.read().is_empty() }
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

impl VectorStore for MemoryVectorStore {
    fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError> {
        let rows = self.rows.read();
        if k == 0 || rows.is_empty() { return Ok(Vec::new()); }
        let mut scored = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            if row.embedding.len() != embedding.len() {
                return Err(StoreError::Backend(format!(
                    "query dimension {} does not match stored dimension {}",
                    embedding.len(),
                    row.embedding.len()
                )));
            }
            scored.push((cosine(embedding, &row.embedding), row));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        let hits: Vec<Candidate> = scored
            .into_iter()
            .take(k)
            .map(|(score, row)| Candidate::new(row.id.clone(), row.text.clone(), row.metadata.clone(), score))
            .collect();
        debug!("Memory vector search: {} results", hits.len());
        Ok(hits)
    }

    fn upsert(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        for chunk in chunks {
            match rows.iter_mut().find(|r| r.id == chunk.id) {
                Some(existing) => *existing = chunk.clone(),
                None => rows.push(chunk.clone()),
            }
        }
        Ok(())
    }

    fn get_all(&self) -> Result<Corpus, StoreError> {
        Ok(Corpus::from_chunks(self.rows.read().iter()))
    }
}
