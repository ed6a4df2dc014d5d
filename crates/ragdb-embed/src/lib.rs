//! Embedding and reranking models.
//!
//! BGE-M3 (XLM-RoBERTa) provides dense 1024-dim embeddings and an ms-marco
//! MiniLM cross-encoder scores query/passage pairs. Both load through candle.
//! Deterministic stand-ins are selected with `APP_USE_FAKE_EMBEDDINGS` and
//! `APP_USE_FAKE_RERANKER`.

pub mod device;
pub mod embedder;
pub mod pool;
pub mod rerank;
pub mod tokenize;
pub mod weights;

pub use device::select_device;
pub use embedder::{embedder_from_dir, get_default_embedder, BgeM3Embedder, FakeEmbedder, BGE_M3_DIM};
pub use pool::masked_mean_l2;
pub use rerank::{get_default_reranker, reranker_from_dir, sigmoid, CrossEncoderReranker, TokenOverlapReranker};
pub use tokenize::{normalized_tokens, tokenize_on_device};
