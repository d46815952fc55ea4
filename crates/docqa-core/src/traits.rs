//! Seams to the external collaborators: the embedding model, the vector
//! database and the lexical index. Implementations live in `docqa-embed`,
//! `docqa-vector` and `docqa-text`.

use crate::types::{ChunkId, SessionId};

/// Black-box text → vector function with a fixed dimension.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model, e.g. `hashed:d1024`. Cache keys use it.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// One row written to the vector store.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub chunk_id: ChunkId,
    pub document_id: String,
    pub sequence_index: usize,
    pub vector: Vec<f32>,
}

/// Nearest-neighbour hit. `distance` is cosine distance (`1 - cos`), lower is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub chunk_id: ChunkId,
    pub distance: f32,
}

impl VectorMatch {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Nearest-neighbour store keyed by session. Every call is scoped to one
/// session; a query never sees rows written under another session id.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    fn dim(&self) -> usize;
    /// Insert or replace rows by `chunk_id`.
    async fn upsert(&self, session_id: &SessionId, entries: &[VectorEntry]) -> anyhow::Result<()>;
    async fn query(&self, session_id: &SessionId, vector: &[f32], k: usize) -> anyhow::Result<Vec<VectorMatch>>;
    async fn delete(&self, session_id: &SessionId, chunk_ids: &[ChunkId]) -> anyhow::Result<()>;
    async fn delete_session(&self, session_id: &SessionId) -> anyhow::Result<()>;
    async fn count(&self, session_id: &SessionId) -> anyhow::Result<usize>;
}

#[derive(Debug, Clone)]
pub struct LexicalEntry {
    pub chunk_id: ChunkId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalMatch {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// Inverted index keyed by session. Scores are term-frequency weighted by
/// inverse document frequency within that session's corpus.
pub trait LexicalStore: Send + Sync {
    /// Lowercased, stop-word filtered tokens, exactly as the index sees them.
    fn tokenize(&self, text: &str) -> Vec<String>;
    fn upsert(&self, session_id: &SessionId, entries: &[LexicalEntry]) -> anyhow::Result<()>;
    fn search(&self, session_id: &SessionId, tokens: &[String], k: usize) -> anyhow::Result<Vec<LexicalMatch>>;
    fn delete(&self, session_id: &SessionId, chunk_ids: &[ChunkId]) -> anyhow::Result<()>;
    fn delete_session(&self, session_id: &SessionId) -> anyhow::Result<()>;
}
