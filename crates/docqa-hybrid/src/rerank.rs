//! Second-pass scoring of fused results by a cross-encoder style model.
//!
//! The reranker only reorders what fusion already selected. Its scores are
//! min-max normalized over the batch and blended with the fused confidence.
//! Any failure leaves the fused order untouched.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::RerankSettings;
use docqa_core::types::RankedResult;

use crate::fusion::{compare_ranked, min_max};

/// `(question, passage) → relevance` for a batch of passages. Higher is
/// more relevant; the scale is the model's own.
pub trait Reranker: Send + Sync {
    fn id(&self) -> &str;
    fn score(&self, question: &str, passages: &[String]) -> anyhow::Result<Vec<f32>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum RerankStatus {
    Disabled,
    Applied,
    /// Fused order kept.
    Failed(String),
}

pub struct RerankStage {
    reranker: Arc<dyn Reranker>,
    weight: f32,
    snippet_chars: usize,
    timeout: Duration,
}

impl RerankStage {
    pub fn new(reranker: Arc<dyn Reranker>, settings: RerankSettings) -> Self {
        Self { reranker, weight: settings.weight, snippet_chars: settings.snippet_chars, timeout: settings.timeout() }
    }

    pub fn id(&self) -> &str {
        self.reranker.id()
    }

    pub async fn apply(&self, question: &str, results: Vec<RankedResult>) -> (Vec<RankedResult>, RerankStatus) {
        if results.is_empty() {
            return (results, RerankStatus::Applied);
        }
        match self.scores(question, &results).await {
            Ok(scores) => (self.blend(results, &scores), RerankStatus::Applied),
            Err(reason) => {
                tracing::warn!(reranker = self.reranker.id(), reason = %reason, "rerank failed; keeping fused order");
                (results, RerankStatus::Failed(reason))
            }
        }
    }

    async fn scores(&self, question: &str, results: &[RankedResult]) -> Result<Vec<f32>, String> {
        let reranker = self.reranker.clone();
        let question = question.to_string();
        let passages: Vec<String> = results.iter().map(|r| r.text.chars().take(self.snippet_chars).collect()).collect();
        let expected = passages.len();
        let task = tokio::task::spawn_blocking(move || reranker.score(&question, &passages));
        let scores = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(scores))) => scores,
            Ok(Ok(Err(e))) => return Err(format!("{e:#}")),
            Ok(Err(join)) => return Err(join.to_string()),
            Err(_) => return Err(format!("timed out after {}ms", self.timeout.as_millis())),
        };
        if scores.len() != expected {
            return Err(format!("reranker returned {} scores for {expected} passages", scores.len()));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err("reranker returned a non-finite score".into());
        }
        Ok(scores)
    }

    fn blend(&self, mut results: Vec<RankedResult>, scores: &[f32]) -> Vec<RankedResult> {
        let normalized = min_max(scores.iter().copied());
        for (result, &score) in results.iter_mut().zip(scores) {
            let blended = (1.0 - self.weight) * result.confidence + self.weight * normalized(score);
            result.confidence = blended.clamp(0.0, 1.0);
        }
        results.sort_by(compare_ranked);
        results
    }
}
