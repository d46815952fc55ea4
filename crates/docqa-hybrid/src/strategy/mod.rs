//! Retrieval strategies and the plan that decides which of them run.
//!
//! Stages run in order. Every strategy in a stage whose activation predicate
//! holds runs concurrently with the others under its own timeout; the stage
//! is a join point. A strategy that fails or times out contributes nothing
//! and is recorded in the request's [`StrategyOutcome`] list.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docqa_core::traits::Embedder;
use docqa_core::types::{SearchCandidate, StrategyKind};
use docqa_core::{Error, Result};

use crate::backend;
use crate::session::SessionIndex;

pub mod fallback;
pub mod keyword;
pub mod reference;
pub mod semantic;

pub use fallback::FallbackStrategy;
pub use keyword::KeywordStrategy;
pub use reference::ReferenceStrategy;
pub use semantic::SemanticStrategy;

/// Per-question state shared by every strategy of one request.
pub struct QueryContext<'a> {
    pub question: &'a str,
    pub session: &'a SessionIndex,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
    embedding: tokio::sync::OnceCell<Vec<f32>>,
}

impl<'a> QueryContext<'a> {
    pub fn new(question: &'a str, session: &'a SessionIndex, embedder: Arc<dyn Embedder>, embed_timeout: Duration) -> Self {
        Self { question, session, embedder, embed_timeout, embedding: tokio::sync::OnceCell::new() }
    }

    /// The question's embedding, computed at most once per request.
    pub async fn question_embedding(&self) -> Result<&[f32]> {
        let vector = self
            .embedding
            .get_or_try_init(|| async {
                let mut vectors = backend::embed(&self.embedder, vec![self.question.to_string()], self.embed_timeout).await?;
                vectors.pop().ok_or_else(|| Error::Embedding("no vector returned".into()))
            })
            .await?;
        Ok(vector.as_slice())
    }
}

#[async_trait::async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    /// Up to `k` candidates from the context's session. A miss is an empty
    /// list; `Err` is reserved for backend failures.
    async fn search(&self, ctx: &QueryContext<'_>, k: usize) -> Result<Vec<SearchCandidate>>;

    /// Candidates that need no backend call, used when `search` fails or
    /// runs out of time. Empty by default.
    fn recover(&self, _ctx: &QueryContext<'_>, _k: usize) -> Vec<SearchCandidate> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Always,
    /// Run only while fewer than this many unique chunks have been found.
    BelowCandidates(usize),
}

impl Activation {
    pub fn is_active(self, unique_candidates: usize) -> bool {
        match self {
            Self::Always => true,
            Self::BelowCandidates(min) => unique_candidates < min,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StrategyStatus {
    Ok(usize),
    TimedOut,
    Failed(String),
    /// `search` failed or timed out; `recover` supplied this many candidates.
    Recovered(usize),
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutcome {
    pub strategy: StrategyKind,
    pub status: StrategyStatus,
    pub elapsed_ms: u64,
}

pub struct Stage {
    pub activation: Activation,
    pub strategies: Vec<Arc<dyn RetrievalStrategy>>,
}

pub struct StrategyPlan {
    stages: Vec<Stage>,
}

/// Candidate lists (one per strategy that ran) plus what happened to each strategy.
pub struct PlanOutput {
    pub candidates: Vec<Vec<SearchCandidate>>,
    pub outcomes: Vec<StrategyOutcome>,
}

impl StrategyPlan {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Semantic, keyword and reference together; fallback only when they
    /// found fewer than `min_candidates` unique chunks.
    pub fn standard(
        semantic: Arc<dyn RetrievalStrategy>,
        keyword: Arc<dyn RetrievalStrategy>,
        reference: Arc<dyn RetrievalStrategy>,
        fallback: Arc<dyn RetrievalStrategy>,
        min_candidates: usize,
    ) -> Self {
        Self::new(vec![
            Stage { activation: Activation::Always, strategies: vec![semantic, keyword, reference] },
            Stage { activation: Activation::BelowCandidates(min_candidates.max(1)), strategies: vec![fallback] },
        ])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub async fn run(&self, ctx: &QueryContext<'_>, k: usize, timeout: Duration) -> PlanOutput {
        let mut output = PlanOutput { candidates: Vec::new(), outcomes: Vec::new() };
        let mut seen: HashSet<String> = HashSet::new();

        for stage in &self.stages {
            if !stage.activation.is_active(seen.len()) {
                output.outcomes.extend(stage.strategies.iter().map(|s| StrategyOutcome {
                    strategy: s.kind(),
                    status: StrategyStatus::Skipped,
                    elapsed_ms: 0,
                }));
                continue;
            }
            let runs = stage.strategies.iter().map(|s| run_one(s.as_ref(), ctx, k, timeout));
            for (outcome, candidates) in join_all(runs).await {
                seen.extend(candidates.iter().map(|c| c.chunk_id.clone()));
                output.outcomes.push(outcome);
                if !candidates.is_empty() {
                    output.candidates.push(candidates);
                }
            }
        }
        output
    }
}

async fn run_one(
    strategy: &dyn RetrievalStrategy,
    ctx: &QueryContext<'_>,
    k: usize,
    timeout: Duration,
) -> (StrategyOutcome, Vec<SearchCandidate>) {
    let kind = strategy.kind();
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, strategy.search(ctx, k)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let (status, candidates) = match result {
        Ok(Ok(candidates)) => {
            tracing::debug!(strategy = %kind, hits = candidates.len(), elapsed_ms, "strategy finished");
            (StrategyStatus::Ok(candidates.len()), candidates)
        }
        Ok(Err(e)) => {
            let err = Error::StrategyUnavailable { strategy: kind, reason: e.to_string() };
            tracing::warn!(error = %err, "strategy degraded to empty result");
            (StrategyStatus::Failed(e.to_string()), Vec::new())
        }
        Err(_) => {
            let err = Error::StrategyTimeout { strategy: kind, timeout };
            tracing::warn!(error = %err, "strategy degraded to empty result");
            (StrategyStatus::TimedOut, Vec::new())
        }
    };
    if candidates.is_empty() && !matches!(status, StrategyStatus::Ok(_)) {
        let recovered = strategy.recover(ctx, k);
        if !recovered.is_empty() {
            tracing::info!(strategy = %kind, hits = recovered.len(), "strategy recovered without backend");
            return (StrategyOutcome { strategy: kind, status: StrategyStatus::Recovered(recovered.len()), elapsed_ms }, recovered);
        }
    }
    (StrategyOutcome { strategy: kind, status, elapsed_ms }, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_predicates() {
        assert!(Activation::Always.is_active(100));
        assert!(Activation::BelowCandidates(3).is_active(0));
        assert!(Activation::BelowCandidates(3).is_active(2));
        assert!(!Activation::BelowCandidates(3).is_active(3));
    }
}
