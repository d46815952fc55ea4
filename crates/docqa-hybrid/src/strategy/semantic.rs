use std::sync::Arc;
use std::time::Duration;

use docqa_core::traits::VectorStore;
use docqa_core::types::{SearchCandidate, StrategyKind};
use docqa_core::Result;

use super::{QueryContext, RetrievalStrategy};
use crate::backend;

/// Nearest neighbours of the question embedding within the session. The raw
/// score is cosine similarity; hits below `min_similarity` are dropped.
pub struct SemanticStrategy {
    vectors: Arc<dyn VectorStore>,
    min_similarity: f32,
    store_timeout: Duration,
}

impl SemanticStrategy {
    pub fn new(vectors: Arc<dyn VectorStore>, min_similarity: f32, store_timeout: Duration) -> Self {
        Self { vectors, min_similarity, store_timeout }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    async fn search(&self, ctx: &QueryContext<'_>, k: usize) -> Result<Vec<SearchCandidate>> {
        let query = ctx.question_embedding().await?;
        let hits = backend::store_call(self.store_timeout, self.vectors.query(ctx.session.id(), query, k)).await?;
        Ok(hits
            .iter()
            .filter(|h| h.similarity() >= self.min_similarity)
            .filter_map(|h| ctx.session.candidate(&h.chunk_id, h.similarity(), StrategyKind::Semantic))
            .collect())
    }
}
