use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a vector store adapter.
///
/// Only `Transient` is retried; everything else is surfaced immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("transient storage fault: {0}")]
    Transient(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Markers that identify an index which is not yet readable (flushed but not
/// loaded, or wiped by ephemeral storage).
pub const DEFAULT_TRANSIENT_MARKERS: &[&str] = &["hnsw", "nothing found on disk"];

impl StoreError {
    /// Classify a backend error message by looking for transient markers.
    ///
    /// Matching is case-insensitive; markers are expected in lower case.
    pub fn classify<S: AsRef<str>>(message: impl Into<String>, markers: &[S]) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if markers.iter().any(|m| lowered.contains(m.as_ref())) {
            Self::Transient(message)
        } else {
            Self::Backend(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
