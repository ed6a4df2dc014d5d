//! Vector store adapters: persistent LanceDB, in-process memory, and the
//! retry policy the orchestrator wraps around them.

pub mod lance;
pub mod memory;
pub mod retry;

use std::sync::Arc;
use tracing::info;

use ragdb_core::config::StorageSettings;
use ragdb_core::error::StoreError;
use ragdb_core::traits::VectorStore;

pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use retry::RetryPolicy;

/// Ephemeral deployments keep the corpus in memory; everything else persists
/// to the configured LanceDB directory.
pub fn open_store(settings: &StorageSettings, dim: usize, markers: &[String]) -> Result<Arc<dyn VectorStore>, StoreError> {
    if settings.ephemeral {
        info!("Using in-memory vector store");
        return Ok(Arc::new(MemoryVectorStore::new()));
    }
    let store = LanceVectorStore::open(&settings.lancedb_path(), &settings.table, dim, markers.to_vec())?;
    Ok(Arc::new(store))
}
