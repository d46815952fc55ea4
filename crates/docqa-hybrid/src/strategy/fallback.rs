use std::sync::Arc;
use std::time::Duration;

use docqa_core::traits::VectorStore;
use docqa_core::types::{SearchCandidate, StrategyKind};
use docqa_core::Result;

use super::{QueryContext, RetrievalStrategy};
use crate::backend;

/// Broad, unthresholded semantic lookup. When the vector path fails, comes
/// back empty or runs out of time it scans the session catalog instead, so a
/// session with any indexed chunk always yields candidates.
pub struct FallbackStrategy {
    vectors: Arc<dyn VectorStore>,
    multiplier: usize,
    store_timeout: Duration,
}

impl FallbackStrategy {
    pub fn new(vectors: Arc<dyn VectorStore>, multiplier: usize, store_timeout: Duration) -> Self {
        Self { vectors, multiplier: multiplier.max(1), store_timeout }
    }

    async fn broad_lookup(&self, ctx: &QueryContext<'_>, k: usize) -> Result<Vec<SearchCandidate>> {
        let query = ctx.question_embedding().await?;
        let hits = backend::store_call(self.store_timeout, self.vectors.query(ctx.session.id(), query, k)).await?;
        Ok(hits
            .iter()
            .filter_map(|h| ctx.session.candidate(&h.chunk_id, h.similarity(), StrategyKind::Fallback))
            .collect())
    }

    /// First chunks in document order; equal scores so fusion orders them by position.
    fn catalog_scan(ctx: &QueryContext<'_>, limit: usize) -> Vec<SearchCandidate> {
        ctx.session
            .scan(limit, |_| true)
            .iter()
            .filter_map(|c| ctx.session.candidate(&c.chunk_id, 0.0, StrategyKind::Fallback))
            .collect()
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for FallbackStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    async fn search(&self, ctx: &QueryContext<'_>, k: usize) -> Result<Vec<SearchCandidate>> {
        let broad_k = k.saturating_mul(self.multiplier);
        match self.broad_lookup(ctx, broad_k).await {
            Ok(found) if !found.is_empty() => return Ok(found),
            Ok(_) => tracing::debug!(session = %ctx.session.id(), "broad lookup empty; scanning catalog"),
            Err(e) => tracing::warn!(session = %ctx.session.id(), error = %e, "broad lookup failed; scanning catalog"),
        }
        Ok(Self::catalog_scan(ctx, broad_k))
    }

    fn recover(&self, ctx: &QueryContext<'_>, k: usize) -> Vec<SearchCandidate> {
        tracing::warn!(session = %ctx.session.id(), "broad lookup did not finish; scanning catalog");
        Self::catalog_scan(ctx, k.saturating_mul(self.multiplier))
    }
}
