//! Timed calls into the embedding and lexical seams, which are synchronous
//! and run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use docqa_core::traits::{Embedder, LexicalEntry, LexicalMatch, LexicalStore};
use docqa_core::types::{ChunkId, SessionId};
use docqa_core::{Error, Result};

pub(crate) async fn embed(embedder: &Arc<dyn Embedder>, texts: Vec<String>, timeout: Duration) -> Result<Vec<Vec<f32>>> {
    let embedder = embedder.clone();
    let expected = texts.len();
    let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts));
    let vectors = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(vectors))) => vectors,
        Ok(Ok(Err(e))) => return Err(Error::Embedding(format!("{e:#}"))),
        Ok(Err(join)) => return Err(Error::Embedding(join.to_string())),
        Err(_) => return Err(Error::Embedding(format!("timed out after {}ms", timeout.as_millis()))),
    };
    if vectors.len() != expected {
        return Err(Error::Embedding(format!("embedder returned {} vectors for {expected} texts", vectors.len())));
    }
    Ok(vectors)
}

/// Await a store future with a deadline, mapping both failure kinds to `Error::Store`.
pub(crate) async fn store_call<T>(timeout: Duration, fut: impl std::future::Future<Output = anyhow::Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| Error::Store(format!("{e:#}"))),
        Err(_) => Err(Error::Store(format!("timed out after {}ms", timeout.as_millis()))),
    }
}

async fn blocking_store_call<T, F>(timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    store_call(timeout, async move { tokio::task::spawn_blocking(f).await? }).await
}

pub(crate) async fn lexical_search(
    lexical: &Arc<dyn LexicalStore>,
    session_id: &SessionId,
    tokens: Vec<String>,
    k: usize,
    timeout: Duration,
) -> Result<Vec<LexicalMatch>> {
    let lexical = lexical.clone();
    let session_id = session_id.clone();
    blocking_store_call(timeout, move || lexical.search(&session_id, &tokens, k)).await
}

pub(crate) async fn lexical_upsert(
    lexical: &Arc<dyn LexicalStore>,
    session_id: &SessionId,
    entries: Vec<LexicalEntry>,
    timeout: Duration,
) -> Result<()> {
    let lexical = lexical.clone();
    let session_id = session_id.clone();
    blocking_store_call(timeout, move || lexical.upsert(&session_id, &entries)).await
}

pub(crate) async fn lexical_delete(
    lexical: &Arc<dyn LexicalStore>,
    session_id: &SessionId,
    chunk_ids: Vec<ChunkId>,
    timeout: Duration,
) -> Result<()> {
    let lexical = lexical.clone();
    let session_id = session_id.clone();
    blocking_store_call(timeout, move || lexical.delete(&session_id, &chunk_ids)).await
}

pub(crate) async fn lexical_delete_session(lexical: &Arc<dyn LexicalStore>, session_id: &SessionId, timeout: Duration) -> Result<()> {
    let lexical = lexical.clone();
    let session_id = session_id.clone();
    blocking_store_call(timeout, move || lexical.delete_session(&session_id)).await
}
