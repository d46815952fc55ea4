use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::traits::Embedder;
use docqa_embed::{embedder_from_settings, CachedEmbedder, HashedEmbedder};

#[test]
fn hashed_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingProvider::Hashed, dim: 1024, cache_capacity: 0, ..EmbeddingSettings::default() };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

struct CountingEmbedder { inner: HashedEmbedder, calls: AtomicUsize }

impl Embedder for CountingEmbedder {
    fn id(&self) -> &str { self.inner.id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

#[test]
fn cache_serves_repeated_texts() {
    let counting = Arc::new(CountingEmbedder { inner: HashedEmbedder::new(64, 256), calls: AtomicUsize::new(0) });
    let cached = CachedEmbedder::new(counting.clone(), NonZeroUsize::new(16).unwrap());

    let first = cached.embed("What is in chapter 3?").unwrap();
    let batch = cached.embed_batch(&["What is in chapter 3?".to_string(), "Another question".to_string()]).unwrap();

    assert_eq!(batch[0], first);
    assert_eq!(batch.len(), 2);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 2, "only the new text reaches the model");
    assert_eq!((cached.hits(), cached.misses()), (1, 2));
}

#[test]
fn cache_is_wrapped_by_default() {
    let embedder = embedder_from_settings(&EmbeddingSettings { dim: 128, ..EmbeddingSettings::default() }).unwrap();
    assert_eq!(embedder.id(), "hashed:d128");
    assert_eq!(embedder.dim(), 128);
}
