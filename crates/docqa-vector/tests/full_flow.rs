use docqa_core::traits::{VectorEntry, VectorStore};
use docqa_vector::LanceVectorStore;
use tempfile::TempDir;

fn entry(id: &str, seq: usize, vector: Vec<f32>) -> VectorEntry {
    VectorEntry { chunk_id: id.to_string(), document_id: "doc".to_string(), sequence_index: seq, vector }
}

#[tokio::test]
async fn lancedb_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceVectorStore::open(tmp.path(), "chunks_test", 3).await.expect("open");
    let s1 = "session_one".to_string();
    let s2 = "session_two".to_string();

    store
        .upsert(&s1, &[entry("doc:0", 0, vec![1.0, 0.0, 0.0]), entry("doc:1", 1, vec![0.0, 1.0, 0.0]), entry("doc:2", 2, vec![0.7, 0.7, 0.0])])
        .await
        .expect("upsert s1");
    store.upsert(&s2, &[entry("doc:0", 0, vec![1.0, 0.0, 0.0])]).await.expect("upsert s2");
    assert_eq!(store.count(&s1).await.expect("count"), 3);
    assert_eq!(store.count(&s2).await.expect("count"), 1);

    let hits = store.query(&s1, &[1.0, 0.0, 0.0], 2).await.expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, "doc:0");
    assert!(hits[0].similarity() > 0.99);
    assert_eq!(hits[1].chunk_id, "doc:2");

    // same chunk id replaces, never duplicates
    store.upsert(&s1, &[entry("doc:0", 0, vec![0.0, 0.0, 1.0])]).await.expect("re-upsert");
    assert_eq!(store.count(&s1).await.expect("count"), 3);

    store.delete(&s1, &["doc:1".to_string()]).await.expect("delete");
    assert_eq!(store.count(&s1).await.expect("count"), 2);

    store.delete_session(&s1).await.expect("delete session");
    assert_eq!(store.count(&s1).await.expect("count"), 0);
    assert_eq!(store.count(&s2).await.expect("count"), 1, "other sessions untouched");
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() {
    let tmp = TempDir::new().expect("tmp");
    drop(LanceVectorStore::open(tmp.path(), "chunks", 4).await.expect("open"));
    let err = LanceVectorStore::open(tmp.path(), "chunks", 8).await.err().expect("dimension mismatch");
    assert!(err.is_configuration());
}
