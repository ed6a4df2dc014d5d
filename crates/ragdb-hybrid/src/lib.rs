//! Hybrid retrieval: vector and BM25 candidates fused by reciprocal rank,
//! reranked by a cross-encoder and rescaled to per-query confidence.

pub mod confidence;
pub mod context;
pub mod fusion;
pub mod gate;
pub mod pipeline;

pub use context::{render_context, Lazy, RetrievalContext, RetrievalContextBuilder, NO_CONTEXT};
pub use fusion::{reciprocal_rank_fusion, RRF_K};
pub use gate::{Answerability, ConfidenceGate};
pub use pipeline::{HybridSearcher, SearchReport, SearchStatus, StageOutcome, INGEST_BATCH_SIZE};
