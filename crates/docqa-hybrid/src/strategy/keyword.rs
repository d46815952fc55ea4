use std::sync::Arc;
use std::time::Duration;

use docqa_core::traits::LexicalStore;
use docqa_core::types::{SearchCandidate, StrategyKind};
use docqa_core::Result;

use super::{QueryContext, RetrievalStrategy};
use crate::backend;

/// BM25 over the session's lexical index. A question made only of stop
/// words has no tokens and finds nothing.
pub struct KeywordStrategy {
    lexical: Arc<dyn LexicalStore>,
    store_timeout: Duration,
}

impl KeywordStrategy {
    pub fn new(lexical: Arc<dyn LexicalStore>, store_timeout: Duration) -> Self {
        Self { lexical, store_timeout }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for KeywordStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    async fn search(&self, ctx: &QueryContext<'_>, k: usize) -> Result<Vec<SearchCandidate>> {
        let tokens = self.lexical.tokenize(ctx.question);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let hits = backend::lexical_search(&self.lexical, ctx.session.id(), tokens, k, self.store_timeout).await?;
        Ok(hits
            .iter()
            .filter(|h| h.score > 0.0)
            .filter_map(|h| ctx.session.candidate(&h.chunk_id, h.score, StrategyKind::Keyword))
            .collect())
    }
}
