use anyhow::{ensure, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use docqa_core::traits::{VectorEntry, VectorMatch, VectorStore};
use docqa_core::types::{ChunkId, SessionId};

/// Exact brute-force cosine search held in process memory. Intended for
/// single-process use and tests; contents are lost on drop.
pub struct MemoryVectorStore {
    dim: usize,
    sessions: RwLock<HashMap<SessionId, BTreeMap<ChunkId, Vec<f32>>>>,
}

impl MemoryVectorStore {
    pub fn new(dim: usize) -> Self {
        Self { dim, sessions: RwLock::new(HashMap::new()) }
    }
}

/// Cosine similarity; a zero vector on either side scores 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

#[async_trait::async_trait]
impl VectorStore for MemoryVectorStore {
    fn dim(&self) -> usize { self.dim }

    async fn upsert(&self, session_id: &SessionId, entries: &[VectorEntry]) -> Result<()> {
        for e in entries {
            ensure!(e.vector.len() == self.dim, "vector for {} has {} dims, store expects {}", e.chunk_id, e.vector.len(), self.dim);
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let rows = sessions.entry(session_id.clone()).or_default();
        for e in entries {
            rows.insert(e.chunk_id.clone(), e.vector.clone());
        }
        Ok(())
    }

    async fn query(&self, session_id: &SessionId, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        ensure!(vector.len() == self.dim, "query vector has {} dims, store expects {}", vector.len(), self.dim);
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = sessions.get(session_id) else { return Ok(Vec::new()) };
        let mut hits: Vec<VectorMatch> = rows
            .iter()
            .map(|(id, v)| VectorMatch { chunk_id: id.clone(), distance: 1.0 - cosine(vector, v) })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, session_id: &SessionId, chunk_ids: &[ChunkId]) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(rows) = sessions.get_mut(session_id) {
            for id in chunk_ids { rows.remove(id); }
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).remove(session_id);
        Ok(())
    }

    async fn count(&self, session_id: &SessionId) -> Result<usize> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(session_id).map_or(0, BTreeMap::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry { chunk_id: id.into(), document_id: "d".into(), sequence_index: 0, vector }
    }

    #[tokio::test]
    async fn nearest_first_and_sessions_isolated() {
        let store = MemoryVectorStore::new(2);
        let s1 = "session_a".to_string();
        let s2 = "session_b".to_string();
        store.upsert(&s1, &[entry("d:0", vec![1.0, 0.0]), entry("d:1", vec![0.0, 1.0])]).await.unwrap();
        store.upsert(&s2, &[entry("e:0", vec![1.0, 0.0])]).await.unwrap();

        let hits = store.query(&s1, &[0.9, 0.1], 10).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["d:0", "d:1"]);
        assert!(hits[0].similarity() > hits[1].similarity());
        assert_eq!(store.count(&s2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_removes() {
        let store = MemoryVectorStore::new(2);
        let s = "session_a".to_string();
        store.upsert(&s, &[entry("d:0", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&s, &[entry("d:0", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count(&s).await.unwrap(), 1);
        let hits = store.query(&s, &[0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].distance.abs() < 1e-6);

        store.delete(&s, &["d:0".into()]).await.unwrap();
        assert_eq!(store.count(&s).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let store = MemoryVectorStore::new(3);
        assert!(store.upsert(&"s".to_string(), &[entry("d:0", vec![1.0])]).await.is_err());
        assert!(store.query(&"s".to_string(), &[1.0], 3).await.is_err());
    }

    #[test]
    fn zero_vectors_score_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
