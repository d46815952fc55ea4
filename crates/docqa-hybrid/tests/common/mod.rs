#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::{ChunkingSettings, Settings};
use docqa_core::traits::{VectorEntry, VectorMatch, VectorStore};
use docqa_core::types::{ChunkId, SessionId};
use docqa_embed::HashedEmbedder;
use docqa_hybrid::HybridEngine;
use docqa_text::TantivyLexicalStore;
use docqa_vector::MemoryVectorStore;

pub const DIM: usize = 64;

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.embedding.dim = DIM;
    settings.embedding.cache_capacity = 0;
    settings.chunking = ChunkingSettings { target_size: 500, overlap: 100 };
    settings
}

pub fn engine_with(settings: Settings, vectors: Arc<dyn VectorStore>) -> HybridEngine {
    let embedder = Arc::new(HashedEmbedder::new(settings.embedding.dim, 256));
    HybridEngine::new(settings, embedder, vectors, Arc::new(TantivyLexicalStore::new())).expect("engine")
}

pub fn engine() -> HybridEngine {
    engine_with(settings(), Arc::new(MemoryVectorStore::new(DIM)))
}

/// `"Section {n}\n"` followed by filler, exactly `len` characters.
pub fn section(n: usize, len: usize) -> String {
    let mut text = format!("Section {n}\n");
    let filler = "lorem ipsum dolor sit amet consectetur adipiscing elit ";
    while text.len() < len {
        text.push_str(filler);
    }
    text.truncate(len);
    text
}

/// Three 350-character sections; with 500/100 chunking this yields exactly
/// three chunks, one per section heading.
pub fn three_sections() -> String {
    (1..=3).map(|n| section(n, 350)).collect::<Vec<_>>().join("\n\n")
}

/// Writes go to memory; every query fails.
pub struct FailingQueries(pub MemoryVectorStore);

#[async_trait::async_trait]
impl VectorStore for FailingQueries {
    fn dim(&self) -> usize { self.0.dim() }
    async fn upsert(&self, session_id: &SessionId, entries: &[VectorEntry]) -> anyhow::Result<()> { self.0.upsert(session_id, entries).await }
    async fn query(&self, _: &SessionId, _: &[f32], _: usize) -> anyhow::Result<Vec<VectorMatch>> { anyhow::bail!("vector store unreachable") }
    async fn delete(&self, session_id: &SessionId, ids: &[ChunkId]) -> anyhow::Result<()> { self.0.delete(session_id, ids).await }
    async fn delete_session(&self, session_id: &SessionId) -> anyhow::Result<()> { self.0.delete_session(session_id).await }
    async fn count(&self, session_id: &SessionId) -> anyhow::Result<usize> { self.0.count(session_id).await }
}

/// Writes go to memory; queries stall for `.1`.
pub struct SlowQueries(pub MemoryVectorStore, pub Duration);

#[async_trait::async_trait]
impl VectorStore for SlowQueries {
    fn dim(&self) -> usize { self.0.dim() }
    async fn upsert(&self, session_id: &SessionId, entries: &[VectorEntry]) -> anyhow::Result<()> { self.0.upsert(session_id, entries).await }
    async fn query(&self, session_id: &SessionId, vector: &[f32], k: usize) -> anyhow::Result<Vec<VectorMatch>> {
        tokio::time::sleep(self.1).await;
        self.0.query(session_id, vector, k).await
    }
    async fn delete(&self, session_id: &SessionId, ids: &[ChunkId]) -> anyhow::Result<()> { self.0.delete(session_id, ids).await }
    async fn delete_session(&self, session_id: &SessionId) -> anyhow::Result<()> { self.0.delete_session(session_id).await }
    async fn count(&self, session_id: &SessionId) -> anyhow::Result<usize> { self.0.count(session_id).await }
}
