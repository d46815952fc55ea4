use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;

use docqa_core::traits::{VectorEntry, VectorMatch, VectorStore};
use docqa_core::types::{ChunkId, SessionId};

use crate::schema::{build_chunk_schema, vector_dim};
use crate::table::{chunks_filter, ensure_table, open_db, session_filter};

/// Persistent vector store backed by a single LanceDB table shared by all
/// sessions; every read and write is filtered by `session_id`.
pub struct LanceVectorStore { pub(crate) db: Connection, pub(crate) table_name: String, dim: usize }

impl LanceVectorStore {
	/// Open (creating if needed) `table_name` under `db_path`. An existing
	/// table whose vector width differs from `dim` is rejected.
	pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> docqa_core::Result<Self> {
		let width = i32::try_from(dim).map_err(|_| docqa_core::Error::Configuration(format!("embedding.dim {dim} is too large")))?;
		let db = open_db(db_path.to_string_lossy().as_ref()).await.map_err(docqa_core::Error::store)?;
		ensure_table(&db, table_name, build_chunk_schema(width)).await.map_err(docqa_core::Error::store)?;
		let store = Self { db, table_name: table_name.to_string(), dim };
		let table = store.table().await.map_err(docqa_core::Error::store)?;
		let schema = table.schema().await.map_err(docqa_core::Error::store)?;
		match vector_dim(&schema) {
			Some(n) if n == width => {}
			Some(n) => return Err(docqa_core::Error::DimensionMismatch { expected: dim, actual: usize::try_from(n).unwrap_or(0) }),
			None => return Err(docqa_core::Error::Configuration(format!("table '{table_name}' has no vector column"))),
		}
		tracing::info!(path = %db_path.display(), table = table_name, dim, "opened LanceDB vector store");
		Ok(store)
	}

	async fn table(&self) -> Result<Table> {
		Ok(self.db.open_table(&self.table_name).execute().await?)
	}

	fn to_record_batch(&self, session_id: &str, entries: &[VectorEntry]) -> Result<RecordBatch> {
		let width = i32::try_from(self.dim)?;
		let schema = build_chunk_schema(width);
		let mut chunk_ids = Vec::with_capacity(entries.len());
		let mut document_ids = Vec::with_capacity(entries.len());
		let mut sequence = Vec::with_capacity(entries.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(entries.len());
		for e in entries {
			anyhow::ensure!(e.vector.len() == self.dim, "vector for {} has {} dims, store expects {}", e.chunk_id, e.vector.len(), self.dim);
			chunk_ids.push(e.chunk_id.clone());
			document_ids.push(e.document_id.clone());
			sequence.push(i32::try_from(e.sequence_index)?);
			vectors.push(Some(e.vector.iter().map(|&x| Some(x)).collect()));
		}
		let sessions = vec![session_id.to_string(); entries.len()];
		Ok(RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(chunk_ids)),
			Arc::new(StringArray::from(sessions)),
			Arc::new(StringArray::from(document_ids)),
			Arc::new(Int32Array::from(sequence)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), width)),
		])?)
	}
}

#[async_trait::async_trait]
impl VectorStore for LanceVectorStore {
	fn dim(&self) -> usize { self.dim }

	async fn upsert(&self, session_id: &SessionId, entries: &[VectorEntry]) -> Result<()> {
		if entries.is_empty() { return Ok(()); }
		let batch = self.to_record_batch(session_id, entries)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let table = self.table().await?;
		let mut mi = table.merge_insert(&["session_id", "chunk_id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await?;
		tracing::debug!(session = %session_id, rows = entries.len(), "upserted vectors");
		Ok(())
	}

	async fn query(&self, session_id: &SessionId, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
		anyhow::ensure!(vector.len() == self.dim, "query vector has {} dims, store expects {}", vector.len(), self.dim);
		if k == 0 { return Ok(Vec::new()); }
		let table = self.table().await?;
		let mut stream = table
			.vector_search(vector.to_vec())?
			.distance_type(DistanceType::Cosine)
			.only_if(session_filter(session_id))
			.limit(k)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = batch.column_by_name("chunk_id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("chunk_id column missing"))?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("_distance column missing"))?;
			for i in 0..batch.num_rows() {
				let distance = if distances.is_null(i) { 1.0 } else { distances.value(i) };
				hits.push(VectorMatch { chunk_id: ids.value(i).to_string(), distance });
			}
		}
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
		hits.truncate(k);
		Ok(hits)
	}

	async fn delete(&self, session_id: &SessionId, chunk_ids: &[ChunkId]) -> Result<()> {
		if chunk_ids.is_empty() { return Ok(()); }
		self.table().await?.delete(&chunks_filter(session_id, chunk_ids)).await?;
		Ok(())
	}

	async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
		self.table().await?.delete(&session_filter(session_id)).await?;
		tracing::info!(session = %session_id, "deleted session vectors");
		Ok(())
	}

	async fn count(&self, session_id: &SessionId) -> Result<usize> {
		Ok(self.table().await?.count_rows(Some(session_filter(session_id))).await?)
	}
}
