//! Embedding backends: BGE-M3 via candle, a deterministic hashed embedder,
//! and an LRU cache that wraps either.

use anyhow::Result;
use std::num::NonZeroUsize;
use std::sync::Arc;

use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::traits::Embedder;

pub mod bge;
pub mod cache;
pub mod device;
pub mod hashed;
pub mod pool;
pub mod tokenize;

pub use bge::BgeM3Embedder;
pub use cache::CachedEmbedder;
pub use hashed::HashedEmbedder;

/// Build the configured embedder, wrapped in a cache unless
/// `cache_capacity` is 0.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let inner: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::Hashed => {
            tracing::info!(dim = settings.dim, "using hashed embedder");
            Arc::new(HashedEmbedder::new(settings.dim, settings.max_len))
        }
        EmbeddingProvider::BgeM3 => {
            let dir = bge::resolve_model_dir(settings.model_dir())?;
            Arc::new(BgeM3Embedder::load(&dir, settings.dim, settings.max_len)?)
        }
    };
    Ok(match NonZeroUsize::new(settings.cache_capacity) {
        Some(capacity) => Arc::new(CachedEmbedder::new(inner, capacity)),
        None => inner,
    })
}
