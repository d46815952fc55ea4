use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::engine::Retrieval;
use crate::session::SessionIndex;

type Key = [u8; 32];

/// LRU cache of finished retrievals. A key covers the session id, the
/// session's content generation, the question and a fingerprint of the
/// settings that shape results, so any re-index or settings change misses.
pub struct SearchCache {
    entries: Mutex<LruCache<Key, Retrieval>>,
    fingerprint: String,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SearchCache {
    pub fn new(capacity: NonZeroUsize, fingerprint: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            fingerprint: fingerprint.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn key(&self, session: &SessionIndex, question: &str) -> Key {
        let mut hasher = blake3::Hasher::new();
        hasher.update(session.id().as_bytes());
        hasher.update(b"\0");
        hasher.update(&session.generation().to_le_bytes());
        hasher.update(self.fingerprint.as_bytes());
        hasher.update(b"\0");
        hasher.update(question.as_bytes());
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, key: &Key) -> Option<Retrieval> {
        let found = self.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn put(&self, key: Key, retrieval: Retrieval) {
        self.lock().put(key, retrieval);
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<Key, Retrieval>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
