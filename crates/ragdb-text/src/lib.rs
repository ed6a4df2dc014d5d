//! ragdb-text
//!
//! BM25 keyword index over the full chunk corpus. The index lives in memory,
//! is rebuilt wholesale from the vector store's contents, and is published to
//! readers with a single pointer swap.

pub mod index;
pub mod tantivy_utils;

pub use index::{LexicalIndex, LexicalSnapshot};
