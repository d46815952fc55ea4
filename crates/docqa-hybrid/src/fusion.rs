//! Fusion & ranking: per-strategy min-max normalization, weighted merge by
//! chunk id, deterministic ordering and truncation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use docqa_core::config::FusionWeights;
use docqa_core::types::{ChunkId, RankedResult, SearchCandidate, StrategyKind};
use docqa_core::{Error, Result};

const EPSILON: f32 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct FusionEngine {
    weights: FusionWeights,
}

impl FusionEngine {
    pub fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Fuse candidate lists into at most `max_results` ranked results.
    ///
    /// Confidence is `Σ w_s · n_s / max(1, Σ w)` over the strategies that
    /// found the chunk, where `n_s` is the strategy's normalized score. Ties
    /// break by sequence index, then chunk id. No candidates at all is
    /// `Error::NoRelevantResults`.
    pub fn fuse(&self, session_id: &str, candidate_lists: &[Vec<SearchCandidate>], max_results: usize) -> Result<Vec<RankedResult>> {
        let mut by_strategy: BTreeMap<StrategyKind, BTreeMap<&str, &SearchCandidate>> = BTreeMap::new();
        for candidate in candidate_lists.iter().flatten() {
            if !candidate.raw_score.is_finite() {
                tracing::warn!(chunk = %candidate.chunk_id, strategy = %candidate.strategy, "dropping non-finite score");
                continue;
            }
            let best = by_strategy.entry(candidate.strategy).or_default().entry(candidate.chunk_id.as_str()).or_insert(candidate);
            if candidate.raw_score > best.raw_score {
                *best = candidate;
            }
        }
        if by_strategy.is_empty() {
            return Err(Error::NoRelevantResults(session_id.to_string()));
        }

        let divisor = self.weights.total().max(1.0);
        let mut merged: BTreeMap<ChunkId, RankedResult> = BTreeMap::new();
        for (strategy, candidates) in &by_strategy {
            let normalized = min_max(candidates.values().map(|c| c.raw_score));
            let weight = self.weights.weight(*strategy);
            for candidate in candidates.values() {
                let score = normalized(candidate.raw_score);
                let result = merged.entry(candidate.chunk_id.clone()).or_insert_with(|| RankedResult {
                    chunk_id: candidate.chunk_id.clone(),
                    document_id: candidate.document_id.clone(),
                    filename: candidate.filename.clone(),
                    text: candidate.text.clone(),
                    sequence_index: candidate.sequence_index,
                    page_number: candidate.page_number,
                    confidence: 0.0,
                    contributing_strategies: BTreeSet::new(),
                    strategy_scores: BTreeMap::new(),
                });
                result.confidence += weight * score / divisor;
                result.contributing_strategies.insert(*strategy);
                result.strategy_scores.insert(*strategy, score);
            }
        }

        let mut ranked: Vec<RankedResult> = merged
            .into_values()
            .map(|mut r| {
                r.confidence = r.confidence.clamp(0.0, 1.0);
                r
            })
            .collect();
        ranked.sort_by(compare_ranked);
        ranked.truncate(max_results);
        Ok(ranked)
    }
}

pub(crate) fn compare_ranked(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.sequence_index.cmp(&b.sequence_index))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Min-max scaler over `scores`. A single score, or scores that are all
/// equal, map to 1.0.
pub(crate) fn min_max(scores: impl Iterator<Item = f32>) -> impl Fn(f32) -> f32 {
    let (min, max) = scores.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    let range = max - min;
    move |s| if range.abs() <= EPSILON { 1.0 } else { ((s - min) / range).clamp(0.0, 1.0) }
}

/// Rank-weighted mean (weights `1/rank`) of the first `top_n` confidences.
pub fn overall_confidence(results: &[RankedResult], top_n: usize) -> f32 {
    let (weighted, total) = results
        .iter()
        .take(top_n)
        .enumerate()
        .fold((0.0f32, 0.0f32), |(sum, norm), (i, r)| {
            let w = 1.0 / (i as f32 + 1.0);
            (sum + w * r.confidence, norm + w)
        });
    if total == 0.0 { 0.0 } else { (weighted / total).clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, seq: usize, raw: f32, strategy: StrategyKind) -> SearchCandidate {
        SearchCandidate {
            chunk_id: id.into(),
            document_id: "doc".into(),
            filename: "doc1.pdf".into(),
            text: format!("text of {id}"),
            sequence_index: seq,
            page_number: None,
            raw_score: raw,
            strategy,
        }
    }

    fn weights(semantic: f32, keyword: f32) -> FusionWeights {
        FusionWeights { semantic, keyword, reference: 0.0, fallback: 0.0 }
    }

    #[test]
    fn weighted_combination_matches_formula() {
        // semantic list normalizes c to 0.9, keyword list normalizes c to 0.6
        let semantic = vec![
            candidate("c", 1, 0.9, StrategyKind::Semantic),
            candidate("lo", 5, 0.0, StrategyKind::Semantic),
            candidate("hi", 6, 1.0, StrategyKind::Semantic),
        ];
        let keyword = vec![
            candidate("c", 1, 6.0, StrategyKind::Keyword),
            candidate("lo", 5, 0.0, StrategyKind::Keyword),
            candidate("hi", 6, 10.0, StrategyKind::Keyword),
        ];
        let fused = FusionEngine::new(weights(0.7, 0.3)).fuse("s", &[semantic, keyword], 10).unwrap();
        let c = fused.iter().find(|r| r.chunk_id == "c").unwrap();
        assert!((c.confidence - 0.81).abs() < 1e-5, "got {}", c.confidence);
        assert!(c.confidence > 0.7 * 0.9);
        assert_eq!(c.contributing_strategies.len(), 2);
    }

    #[test]
    fn single_candidate_normalizes_to_one() {
        let fused = FusionEngine::new(FusionWeights::default())
            .fuse("s", &[vec![candidate("a", 0, 0.42, StrategyKind::Reference)]], 10)
            .unwrap();
        assert_eq!(fused[0].strategy_scores[&StrategyKind::Reference], 1.0);
        assert!((fused[0].confidence - 0.2).abs() < 1e-6);
    }

    #[test]
    fn corroborated_chunk_outranks_single_source() {
        let semantic = vec![candidate("a", 3, 0.8, StrategyKind::Semantic), candidate("b", 0, 0.8, StrategyKind::Semantic)];
        let keyword = vec![candidate("a", 3, 2.0, StrategyKind::Keyword)];
        let fused = FusionEngine::new(FusionWeights::default()).fuse("s", &[semantic, keyword], 10).unwrap();
        assert_eq!(fused[0].chunk_id, "a");
        assert!(fused[0].confidence > fused[1].confidence);
    }

    #[test]
    fn dedups_and_truncates() {
        let list: Vec<SearchCandidate> = (0..8).map(|i| candidate(&format!("k{i}"), i, i as f32, StrategyKind::Keyword)).collect();
        let dup = vec![candidate("k7", 7, 3.0, StrategyKind::Keyword), candidate("k7", 7, 0.5, StrategyKind::Semantic)];
        let engine = FusionEngine::new(FusionWeights::default());

        let fused = engine.fuse("s", &[list.clone(), dup.clone()], 5).unwrap();
        assert_eq!(fused.len(), 5);
        let ids: BTreeSet<&str> = fused.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids.len(), fused.len());

        let all = engine.fuse("s", &[list, dup], 50).unwrap();
        assert_eq!(all.len(), 8, "never padded past the candidate count");
        assert!(all.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }

    #[test]
    fn ties_prefer_earlier_sequence_then_id() {
        let list = vec![
            candidate("z", 2, 1.0, StrategyKind::Fallback),
            candidate("b", 0, 1.0, StrategyKind::Fallback),
            candidate("a", 0, 1.0, StrategyKind::Fallback),
        ];
        let fused = FusionEngine::new(FusionWeights::default()).fuse("s", &[list], 10).unwrap();
        let ids: Vec<&str> = fused.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "z"]);
    }

    #[test]
    fn nothing_to_fuse_is_explicit() {
        let err = FusionEngine::new(FusionWeights::default()).fuse("s", &[vec![], vec![]], 10).unwrap_err();
        assert!(matches!(err, Error::NoRelevantResults(_)));
    }

    #[test]
    fn overall_confidence_weights_by_rank() {
        let fused = FusionEngine::new(weights(1.0, 0.0))
            .fuse(
                "s",
                &[vec![
                    candidate("a", 0, 1.0, StrategyKind::Semantic),
                    candidate("b", 1, 0.0, StrategyKind::Semantic),
                ]],
                10,
            )
            .unwrap();
        // (1 * 1.0 + 0.5 * 0.0) / 1.5
        assert!((overall_confidence(&fused, 3) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(overall_confidence(&[], 3), 0.0);
    }
}
