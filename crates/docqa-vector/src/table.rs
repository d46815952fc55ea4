//! LanceDB connection and table helpers.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    tracing::info!(table = name, "created vector table");
    Ok(())
}

/// Single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn session_filter(session_id: &str) -> String {
    format!("session_id = {}", sql_literal(session_id))
}

pub fn chunks_filter(session_id: &str, chunk_ids: &[String]) -> String {
    let ids: Vec<String> = chunk_ids.iter().map(|id| sql_literal(id)).collect();
    format!("{} AND chunk_id IN ({})", session_filter(session_id), ids.join(", "))
}
