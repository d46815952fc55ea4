use anyhow::Result;
use std::hash::Hasher;
use twox_hash::XxHash64;

use docqa_core::traits::Embedder;

/// Deterministic bag-of-words embedder: each lowercased alphanumeric token is
/// hashed into one signed bucket and the result is L2-normalized. Shared
/// vocabulary produces cosine similarity, which is enough for tests and for
/// running without model weights.
#[derive(Debug, Clone)]
pub struct HashedEmbedder { dim: usize, max_len: usize, id: String }

impl HashedEmbedder {
    pub fn new(dim: usize, max_len: usize) -> Self {
        Self { dim, max_len, id: format!("hashed:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 { return v; }
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).take(self.max_len) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashedEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

    #[test]
    fn shared_tokens_are_similar() {
        let e = HashedEmbedder::new(256, 256);
        let q = e.embed("Photosynthesis in plants").unwrap();
        let near = e.embed("Plants perform photosynthesis").unwrap();
        let far = e.embed("Tax rules for 2023").unwrap();
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashedEmbedder::new(64, 256);
        assert_eq!(e.embed("Section 2!").unwrap(), e.embed("section, 2").unwrap());
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashedEmbedder::new(32, 256);
        assert!(e.embed("  ").unwrap().iter().all(|x| *x == 0.0));
    }
}
