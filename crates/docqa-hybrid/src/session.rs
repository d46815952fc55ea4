//! Per-session index handle.
//!
//! A [`SessionIndex`] is the explicit handle every engine operation takes. It
//! owns the catalog of the session's documents and chunks (the metadata the
//! vector and lexical stores do not keep) and the write lock that serializes
//! indexing within the session. Nothing here is global: two handles never
//! share state, and dropping a handle drops its catalog.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use docqa_core::types::{new_session_id, Chunk, ChunkId, Document, DocumentId, SearchCandidate, Session, SessionId, StrategyKind};

/// An uploaded document as the catalog remembers it; the raw text itself is
/// not retained once chunked.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    pub filename: String,
    pub upload_time: DateTime<Utc>,
    /// Registration order within the session.
    pub ordinal: u64,
    pub chunk_ids: Vec<ChunkId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Default)]
struct Catalog {
    documents: BTreeMap<DocumentId, DocumentRecord>,
    chunks: BTreeMap<ChunkId, Chunk>,
    next_ordinal: u64,
    /// Bumped on every change to the set of indexed chunks.
    generation: u64,
}

pub struct SessionIndex {
    session_id: SessionId,
    created_at: DateTime<Utc>,
    catalog: RwLock<Catalog>,
    writes: tokio::sync::Mutex<()>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::with_id(new_session_id())
    }

    pub fn with_id(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            catalog: RwLock::new(Catalog::default()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held for the duration of any write to this session's stores.
    pub async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    pub fn snapshot(&self) -> Session {
        Session {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            document_ids: self.read().documents.keys().cloned().collect::<BTreeSet<_>>(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        let catalog = self.read();
        SessionStats { documents: catalog.documents.len(), chunks: catalog.chunks.len() }
    }

    pub fn chunk_count(&self) -> usize {
        self.read().chunks.len()
    }

    pub fn register_document(&self, document: &Document) {
        let mut catalog = self.write();
        let ordinal = catalog.next_ordinal;
        catalog.next_ordinal += 1;
        catalog.documents.insert(
            document.document_id.clone(),
            DocumentRecord {
                document_id: document.document_id.clone(),
                filename: document.filename.clone(),
                upload_time: document.upload_time,
                ordinal,
                chunk_ids: Vec::new(),
            },
        );
    }

    pub fn document(&self, document_id: &str) -> Option<DocumentRecord> {
        self.read().documents.get(document_id).cloned()
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        let mut docs: Vec<DocumentRecord> = self.read().documents.values().cloned().collect();
        docs.sort_by_key(|d| d.ordinal);
        docs
    }

    pub fn find_by_filename(&self, filename: &str) -> Option<DocumentId> {
        self.read().documents.values().find(|d| d.filename == filename).map(|d| d.document_id.clone())
    }

    /// Record indexed chunks. Chunks of unregistered documents are ignored.
    pub(crate) fn insert_chunks(&self, chunks: impl IntoIterator<Item = Chunk>) {
        let mut catalog = self.write();
        for chunk in chunks {
            let Some(doc) = catalog.documents.get_mut(&chunk.document_id) else { continue };
            if !doc.chunk_ids.contains(&chunk.chunk_id) {
                doc.chunk_ids.push(chunk.chunk_id.clone());
            }
            catalog.chunks.insert(chunk.chunk_id.clone(), chunk);
        }
        catalog.generation += 1;
    }

    /// Forget a document and its chunks, returning the removed chunk ids.
    pub(crate) fn remove_document(&self, document_id: &str) -> Option<Vec<ChunkId>> {
        let mut catalog = self.write();
        let record = catalog.documents.remove(document_id)?;
        for id in &record.chunk_ids {
            catalog.chunks.remove(id);
        }
        catalog.generation += 1;
        Some(record.chunk_ids)
    }

    pub(crate) fn clear(&self) {
        let mut catalog = self.write();
        catalog.documents.clear();
        catalog.chunks.clear();
        catalog.generation += 1;
    }

    /// Changes whenever indexed content changes; equal generations mean
    /// retrieval sees the same chunks.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<Chunk> {
        self.read().chunks.get(chunk_id).cloned()
    }

    /// Build a candidate for a chunk of this session. `None` for ids the
    /// catalog does not know, e.g. rows a store kept after a removal.
    pub fn candidate(&self, chunk_id: &str, raw_score: f32, strategy: StrategyKind) -> Option<SearchCandidate> {
        let catalog = self.read();
        let chunk = catalog.chunks.get(chunk_id)?;
        let filename = catalog.documents.get(&chunk.document_id).map(|d| d.filename.clone()).unwrap_or_default();
        Some(SearchCandidate {
            chunk_id: chunk.chunk_id.clone(),
            document_id: chunk.document_id.clone(),
            filename,
            text: chunk.text.clone(),
            sequence_index: chunk.sequence_index,
            page_number: chunk.page_number,
            raw_score,
            strategy,
        })
    }

    /// Chunks in document order (registration order, then sequence index)
    /// that satisfy `keep`, at most `limit` of them.
    pub fn scan(&self, limit: usize, mut keep: impl FnMut(&Chunk) -> bool) -> Vec<Chunk> {
        let catalog = self.read();
        let mut docs: Vec<&DocumentRecord> = catalog.documents.values().collect();
        docs.sort_by_key(|d| d.ordinal);
        let mut out = Vec::new();
        for doc in docs {
            let mut chunks: Vec<&Chunk> = doc.chunk_ids.iter().filter_map(|id| catalog.chunks.get(id)).collect();
            chunks.sort_by_key(|c| c.sequence_index);
            for chunk in chunks {
                if out.len() >= limit {
                    return out;
                }
                if keep(chunk) {
                    out.push(chunk.clone());
                }
            }
        }
        out
    }
}

impl Default for SessionIndex {
    fn default() -> Self {
        Self::new()
    }
}
