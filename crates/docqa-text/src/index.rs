use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use docqa_core::traits::{LexicalEntry, LexicalMatch};

use crate::search::token_query;
use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 15_000_000;

/// In-RAM tantivy index holding one session's chunks, so IDF statistics
/// come from that session's corpus only.
pub struct SessionTextIndex {
	index: Index,
	reader: IndexReader,
	chunk_id_field: Field,
	text_field: Field,
}

impl SessionTextIndex {
	pub fn create_in_ram() -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let chunk_id_field = schema.get_field("chunk_id")?;
		let text_field = schema.get_field("text")?;
		Ok(Self { index, reader, chunk_id_field, text_field })
	}

	/// Replace-by-id: each entry's previous document is deleted in the same commit.
	pub fn upsert(&self, entries: &[LexicalEntry]) -> Result<()> {
		if entries.is_empty() { return Ok(()); }
		let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		for e in entries {
			writer.delete_term(Term::from_field_text(self.chunk_id_field, &e.chunk_id));
			writer.add_document(doc!(
				self.chunk_id_field => e.chunk_id.clone(),
				self.text_field => e.text.clone(),
			))?;
		}
		writer.commit()?;
		self.reader.reload()?;
		Ok(())
	}

	pub fn delete(&self, chunk_ids: &[String]) -> Result<()> {
		if chunk_ids.is_empty() { return Ok(()); }
		let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		for id in chunk_ids { writer.delete_term(Term::from_field_text(self.chunk_id_field, id)); }
		writer.commit()?;
		self.reader.reload()?;
		Ok(())
	}

	/// BM25 over already-analyzed tokens. Any token may match.
	pub fn search(&self, tokens: &[String], k: usize) -> Result<Vec<LexicalMatch>> {
		if k == 0 { return Ok(Vec::new()); }
		let Some(query) = token_query(self.text_field, tokens) else { return Ok(Vec::new()) };
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(chunk_id) = doc.get_first(self.chunk_id_field).and_then(|v| v.as_str()) else { continue };
			hits.push(LexicalMatch { chunk_id: chunk_id.to_string(), score });
		}
		Ok(hits)
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}
}
