//! Vector stores: an in-memory brute-force store and a LanceDB-backed one.

use std::sync::Arc;

use docqa_core::config::{VectorBackend, VectorStoreSettings};
use docqa_core::traits::VectorStore;

pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;

/// Open the configured backend for vectors of width `dim`.
pub async fn vector_store_from_settings(settings: &VectorStoreSettings, dim: usize) -> docqa_core::Result<Arc<dyn VectorStore>> {
    Ok(match settings.backend {
        VectorBackend::Memory => Arc::new(MemoryVectorStore::new(dim)),
        VectorBackend::Lancedb => Arc::new(LanceVectorStore::open(&settings.uri_path(), &settings.table, dim).await?),
    })
}
