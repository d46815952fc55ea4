use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docqa_core::config::Settings;
use docqa_core::traits::{Embedder, LexicalEntry, LexicalStore, VectorEntry, VectorStore};
use docqa_core::types::{Chunk, ChunkId, IndexedChunk};
use docqa_core::{Error, Result};

use crate::backend;
use crate::session::SessionIndex;

#[derive(Debug, Clone, Serialize)]
pub struct FailedChunk {
    pub chunk_id: ChunkId,
    pub reason: String,
}

/// Outcome of one indexing call. Chunks that could not be embedded are
/// listed in `failed`; they are skipped, never fatal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub succeeded: usize,
    pub failed: Vec<FailedChunk>,
    /// Lexical tokens written across all succeeded chunks.
    pub lexical_tokens: usize,
}

impl IndexReport {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn merge(&mut self, other: IndexReport) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
        self.lexical_tokens += other.lexical_tokens;
    }
}

/// Embeds chunks and writes them to the vector store, the lexical store and
/// the session catalog. Callers hold the session's write lock.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    lexical: Arc<dyn LexicalStore>,
    batch_size: usize,
    embed_timeout: Duration,
    store_timeout: Duration,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, vectors: Arc<dyn VectorStore>, lexical: Arc<dyn LexicalStore>, settings: &Settings) -> Self {
        Self {
            embedder,
            vectors,
            lexical,
            batch_size: settings.indexing.batch_size.max(1),
            embed_timeout: settings.retrieval.embed_timeout(),
            store_timeout: settings.retrieval.store_timeout(),
        }
    }

    /// Index chunks of documents already registered in `session`.
    /// Re-indexing a chunk id replaces its vector and tokens.
    pub async fn index(&self, session: &SessionIndex, chunks: &[Chunk]) -> Result<IndexReport> {
        for chunk in chunks {
            if &chunk.session_id != session.id() {
                return Err(Error::SessionMismatch { expected: session.id().clone(), found: chunk.session_id.clone() });
            }
            if session.document(&chunk.document_id).is_none() {
                return Err(Error::UnknownDocument { session_id: session.id().clone(), document_id: chunk.document_id.clone() });
            }
            if chunk.char_start >= chunk.char_end {
                return Err(Error::Configuration(format!(
                    "chunk {} has empty range {}..{}",
                    chunk.chunk_id, chunk.char_start, chunk.char_end
                )));
            }
        }

        let start = Instant::now();
        let mut report = IndexReport::default();
        for batch in chunks.chunks(self.batch_size) {
            report.merge(self.index_batch(session, batch).await?);
        }
        tracing::info!(
            session = %session.id(),
            succeeded = report.succeeded,
            failed = report.failed_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "indexed chunks"
        );
        Ok(report)
    }

    async fn index_batch(&self, session: &SessionIndex, batch: &[Chunk]) -> Result<IndexReport> {
        let embedded = self.embed_batch(batch).await;
        let mut report = IndexReport::default();
        let mut ok: Vec<IndexedChunk> = Vec::with_capacity(batch.len());
        for (chunk, result) in batch.iter().zip(embedded) {
            match result {
                Ok(embedding) if embedding.len() == self.vectors.dim() => ok.push(IndexedChunk {
                    lexical_tokens: self.lexical.tokenize(&chunk.text),
                    chunk: chunk.clone(),
                    embedding,
                }),
                Ok(vector) => {
                    let err = Error::DimensionMismatch { expected: self.vectors.dim(), actual: vector.len() };
                    report.failed.push(FailedChunk { chunk_id: chunk.chunk_id.clone(), reason: err.to_string() });
                }
                Err(e) => {
                    tracing::warn!(chunk = %chunk.chunk_id, error = %e, "skipping chunk");
                    report.failed.push(FailedChunk { chunk_id: chunk.chunk_id.clone(), reason: e.to_string() });
                }
            }
        }
        if ok.is_empty() {
            return Ok(report);
        }

        let entries: Vec<VectorEntry> = ok
            .iter()
            .map(|ic| VectorEntry {
                chunk_id: ic.chunk.chunk_id.clone(),
                document_id: ic.chunk.document_id.clone(),
                sequence_index: ic.chunk.sequence_index,
                vector: ic.embedding.clone(),
            })
            .collect();
        backend::store_call(self.store_timeout, self.vectors.upsert(session.id(), &entries)).await?;

        let lexical: Vec<LexicalEntry> = ok
            .iter()
            .map(|ic| LexicalEntry { chunk_id: ic.chunk.chunk_id.clone(), text: ic.chunk.text.clone() })
            .collect();
        backend::lexical_upsert(&self.lexical, session.id(), lexical, self.store_timeout).await?;

        report.succeeded = ok.len();
        report.lexical_tokens = ok.iter().map(|ic| ic.lexical_tokens.len()).sum();
        session.insert_chunks(ok.into_iter().map(|ic| ic.chunk));
        tracing::debug!(session = %session.id(), rows = report.succeeded, "indexed batch");
        Ok(report)
    }

    /// One vector or error per chunk. A failed batch is retried chunk by
    /// chunk so one bad input does not sink its neighbours.
    async fn embed_batch(&self, batch: &[Chunk]) -> Vec<Result<Vec<f32>>> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match backend::embed(&self.embedder, texts, self.embed_timeout).await {
            Ok(vectors) => vectors.into_iter().map(Ok).collect(),
            Err(e) if batch.len() > 1 => {
                tracing::warn!(error = %e, size = batch.len(), "batch embedding failed; retrying per chunk");
                let mut out = Vec::with_capacity(batch.len());
                for chunk in batch {
                    let single = backend::embed(&self.embedder, vec![chunk.text.clone()], self.embed_timeout).await;
                    out.push(single.and_then(|mut v| v.pop().ok_or_else(|| Error::Embedding("no vector returned".into()))));
                }
                out
            }
            Err(e) => vec![Err(e)],
        }
    }
}
