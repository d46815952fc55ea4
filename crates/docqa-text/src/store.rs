use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;

use docqa_core::traits::{LexicalEntry, LexicalMatch, LexicalStore};
use docqa_core::types::{ChunkId, SessionId};

use crate::index::SessionTextIndex;
use crate::tantivy_utils::lexical_tokens;

/// Lexical store with one tantivy index per session. Dropping a session
/// drops its index; no document of one session is visible to another.
#[derive(Default)]
pub struct TantivyLexicalStore {
	sessions: RwLock<HashMap<SessionId, Arc<SessionTextIndex>>>,
}

impl TantivyLexicalStore {
	pub fn new() -> Self { Self::default() }

	fn session(&self, session_id: &SessionId) -> Option<Arc<SessionTextIndex>> {
		self.sessions.read().unwrap_or_else(PoisonError::into_inner).get(session_id).cloned()
	}

	fn session_or_create(&self, session_id: &SessionId) -> Result<Arc<SessionTextIndex>> {
		if let Some(existing) = self.session(session_id) { return Ok(existing); }
		let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
		if let Some(existing) = sessions.get(session_id) { return Ok(existing.clone()); }
		let created = Arc::new(SessionTextIndex::create_in_ram()?);
		sessions.insert(session_id.clone(), created.clone());
		tracing::debug!(session = %session_id, "created lexical index");
		Ok(created)
	}

	pub fn num_docs(&self, session_id: &SessionId) -> u64 {
		self.session(session_id).map_or(0, |s| s.num_docs())
	}
}

impl LexicalStore for TantivyLexicalStore {
	fn tokenize(&self, text: &str) -> Vec<String> { lexical_tokens(text) }

	fn upsert(&self, session_id: &SessionId, entries: &[LexicalEntry]) -> Result<()> {
		if entries.is_empty() { return Ok(()); }
		self.session_or_create(session_id)?.upsert(entries)
	}

	fn search(&self, session_id: &SessionId, tokens: &[String], k: usize) -> Result<Vec<LexicalMatch>> {
		match self.session(session_id) {
			Some(index) => index.search(tokens, k),
			None => Ok(Vec::new()),
		}
	}

	fn delete(&self, session_id: &SessionId, chunk_ids: &[ChunkId]) -> Result<()> {
		match self.session(session_id) {
			Some(index) => index.delete(chunk_ids),
			None => Ok(()),
		}
	}

	fn delete_session(&self, session_id: &SessionId) -> Result<()> {
		self.sessions.write().unwrap_or_else(PoisonError::into_inner).remove(session_id);
		Ok(())
	}
}
