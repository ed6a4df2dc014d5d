//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Source label used when a chunk carries no origin document name.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Per-chunk metadata persisted next to the text and embedding.
///
/// - `source`: origin document name
/// - `chunk_id`: ordinal position within the source document
/// - `image_paths`: figures/charts co-located with the passage
/// - `extra`: anything else the ingestion side attached (e.g. `chunk_size`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub chunk_id: usize,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "image_paths_from_any"
    )]
    pub image_paths: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, chunk_id: usize) -> Self {
        Self { source: source.into(), chunk_id, ..Self::default() }
    }

    /// Origin document name, or [`UNKNOWN_SOURCE`] when none was recorded.
    pub fn source_or_unknown(&self) -> &str {
        if self.source.is_empty() { UNKNOWN_SOURCE } else { &self.source }
    }
}

// Stores limited to scalar metadata keep `image_paths` as a JSON-encoded
// string; accept both shapes and fall back to no images.
fn image_paths_from_any<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(Value::String(encoded)) => serde_json::from_str(&encoded).unwrap_or_default(),
        _ => Vec::new(),
    })
}

/// The atomic retrievable unit. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Identifier derived from the source document name and ordinal.
    pub fn id_for(source: &str, ordinal: usize) -> ChunkId {
        format!("{source}_chunk_{ordinal}")
    }
}

/// A chunk handed to ingestion before it has been embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkInput {
    #[serde(default)]
    pub id: Option<ChunkId>,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl ChunkInput {
    pub fn resolved_id(&self) -> ChunkId {
        self.id.clone().unwrap_or_else(|| Chunk::id_for(self.metadata.source_or_unknown(), self.metadata.chunk_id))
    }
}

/// A scored, provisional match produced by one retrieval stage.
///
/// `score` is method-specific (cosine similarity, BM25, ...) and must not be
/// compared across stages. `rrf_score` is only set after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrf_score: Option<f32>,
}

impl Candidate {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>, metadata: ChunkMetadata, score: f32) -> Self {
        Self { id: id.into(), text: text.into(), metadata, score, rrf_score: None }
    }
}

/// Full corpus as parallel collections: `texts[i]`, `ids[i]` and
/// `metadatas[i]` always describe the same chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    texts: Vec<String>,
    ids: Vec<ChunkId>,
    metadatas: Vec<ChunkMetadata>,
}

impl Corpus {
    pub fn new(texts: Vec<String>, ids: Vec<ChunkId>, metadatas: Vec<ChunkMetadata>) -> Result<Self> {
        if texts.len() != ids.len() || texts.len() != metadatas.len() {
            return Err(Error::InvalidCorpus(format!(
                "length mismatch: {} texts, {} ids, {} metadatas",
                texts.len(),
                ids.len(),
                metadatas.len()
            )));
        }
        Ok(Self { texts, ids, metadatas })
    }

    /// Corpus with positional ids (`"0"`, `"1"`, ...) and empty metadata.
    pub fn from_texts(texts: Vec<String>) -> Self {
        let ids = (0..texts.len()).map(|i| i.to_string()).collect();
        let metadatas = vec![ChunkMetadata::default(); texts.len()];
        Self { texts, ids, metadatas }
    }

    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Self {
        let mut corpus = Self::default();
        for c in chunks {
            corpus.texts.push(c.text.clone());
            corpus.ids.push(c.id.clone());
            corpus.metadatas.push(c.metadata.clone());
        }
        corpus
    }

    pub fn len(&self) -> usize { self.texts.len() }
    pub fn is_empty(&self) -> bool { self.texts.is_empty() }
    pub fn texts(&self) -> &[String] { &self.texts }
    pub fn ids(&self) -> &[ChunkId] { &self.ids }
    pub fn metadatas(&self) -> &[ChunkMetadata] { &self.metadatas }

    /// Materialize the chunk at `pos` as a candidate with the given score.
    pub fn candidate(&self, pos: usize, score: f32) -> Option<Candidate> {
        Some(Candidate::new(
            self.ids.get(pos)?.clone(),
            self.texts.get(pos)?.clone(),
            self.metadatas.get(pos)?.clone(),
            score,
        ))
    }
}

/// Final pipeline output. Produced fresh per query; `confidence` is local to
/// the query that created it and must not be persisted or compared across
/// queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ChunkId,
    pub document: String,
    /// Raw reranker relevance in [0,1].
    pub score: f32,
    /// Min-max rescaled score in [0,1].
    pub confidence: f32,
    pub metadata: ChunkMetadata,
    pub source: String,
    pub chunk_id: usize,
}

impl SearchResult {
    /// Build a result from a reranked candidate. `confidence` starts equal to
    /// the raw score until the orchestrator normalizes the final set.
    pub fn from_candidate(candidate: Candidate, score: f32) -> Self {
        let source = candidate.metadata.source_or_unknown().to_string();
        let chunk_id = candidate.metadata.chunk_id;
        Self {
            id: candidate.id,
            document: candidate.text,
            score,
            confidence: score,
            metadata: candidate.metadata,
            source,
            chunk_id,
        }
    }

    pub fn text(&self) -> &str { &self.document }
}
