use std::fs;

use docqa_core::chunker::{reassemble, Chunker};
use docqa_core::config::{Config, EmbeddingProvider, VectorBackend};
use docqa_core::types::Document;
use tempfile::TempDir;

#[test]
fn config_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("docqa.toml");
    fs::write(
        &path,
        r#"
[chunking]
target_size = 500
overlap = 100

[fusion]
semantic = 0.7
keyword = 0.3
reference = 0.0
fallback = 0.0

[embedding]
provider = "bge-m3"
model_dir = "/models/bge-m3"

[vector_store]
backend = "lancedb"
"#,
    )
    .unwrap();

    let config = Config::from_file(&path);
    let settings = config.settings().expect("settings");
    assert_eq!(settings.chunking.target_size, 500);
    assert_eq!(settings.chunking.overlap, 100);
    assert_eq!(settings.fusion.semantic, 0.7);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::BgeM3);
    assert_eq!(settings.vector_store.backend, VectorBackend::Lancedb);
    // untouched sections keep their defaults
    assert_eq!(settings.retrieval.top_k, 20);
    assert_eq!(settings.vector_store.table, "chunks");

    let top_k: usize = config.get("retrieval.top_k").unwrap();
    assert_eq!(top_k, 20);
}

#[test]
fn invalid_chunking_in_file_fails_fast() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(&path, "[chunking]\ntarget_size = 100\noverlap = 150\n").unwrap();

    let err = Config::from_file(&path).settings().unwrap_err();
    assert!(err.is_configuration(), "got {err}");
}

#[test]
fn chunk_document_covers_source_text() {
    let text = fs_text();
    let document = Document::new("session_a", "manual.txt", text.clone());
    let chunker = Chunker::new(docqa_core::config::ChunkingSettings { target_size: 500, overlap: 100 }).unwrap();
    let chunks = chunker.chunk_document(&document);

    assert!(chunks.len() >= 3);
    assert_eq!(reassemble(&chunks), text);
    for c in &chunks {
        assert_eq!(c.document_id, document.document_id);
        assert_eq!(c.session_id, "session_a");
        assert!(c.text.chars().count() <= 500);
    }
    let ids: std::collections::HashSet<_> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
    assert_eq!(ids.len(), chunks.len());
}

fn fs_text() -> String {
    (1..=6)
        .map(|i| format!("Section {i}\n\nThis part explains topic number {i} in detail. It has several sentences. Each one adds a little more context about the subject at hand, so the paragraph grows past a trivial size."))
        .collect::<Vec<_>>()
        .join("\n\n")
}
