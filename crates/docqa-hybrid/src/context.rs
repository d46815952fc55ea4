use serde::Serialize;
use std::fmt::Write as _;

use docqa_core::types::{ChunkId, RankedResult};

const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// 1-based block number as printed in the context.
    pub index: usize,
    pub chunk_id: ChunkId,
    pub filename: String,
    pub page_number: Option<u32>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Ranked results left out to stay within the character budget.
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Renders ranked results as numbered source blocks, in the given order,
/// within a character budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Keeps the longest ranked prefix whose rendering fits `max_chars`.
    /// Blocks are never cut; the top block is kept even if it alone is over
    /// budget.
    pub fn assemble(&self, results: &[RankedResult]) -> AssembledContext {
        let mut context = AssembledContext::default();
        let mut used = 0usize;
        for (i, result) in results.iter().enumerate() {
            let index = i + 1;
            let block = render_block(index, result);
            let block_chars = block.chars().count();
            let needed = if i == 0 { block_chars } else { block_chars + BLOCK_SEPARATOR.len() };
            if used + needed > self.max_chars {
                if i == 0 {
                    tracing::warn!(chars = block_chars, budget = self.max_chars, "top source exceeds context budget; keeping it whole");
                } else {
                    context.dropped = results.len() - i;
                    tracing::debug!(dropped = context.dropped, budget = self.max_chars, "context budget reached");
                    break;
                }
            }
            if i > 0 {
                context.text.push_str(BLOCK_SEPARATOR);
            }
            context.text.push_str(&block);
            used += needed;
            context.citations.push(Citation {
                index,
                chunk_id: result.chunk_id.clone(),
                filename: result.filename.clone(),
                page_number: result.page_number,
                confidence: result.confidence,
            });
        }
        context
    }
}

fn render_block(index: usize, result: &RankedResult) -> String {
    let mut header = format!("[Source {index}] (confidence: {:.2}, file: {}", result.confidence, result.filename);
    if let Some(page) = result.page_number {
        let _ = write!(header, ", page: {page}");
    }
    header.push(')');
    format!("{header}\n{}", result.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn ranked(id: &str, text: &str, confidence: f32, page: Option<u32>) -> RankedResult {
        RankedResult {
            chunk_id: id.into(),
            document_id: "d".into(),
            filename: "notes.txt".into(),
            text: text.into(),
            sequence_index: 0,
            page_number: page,
            confidence,
            contributing_strategies: BTreeSet::new(),
            strategy_scores: BTreeMap::new(),
        }
    }

    #[test]
    fn numbered_blocks_in_rank_order() {
        let results = vec![ranked("d:1", "second chunk", 0.9, Some(2)), ranked("d:0", "first chunk", 0.5, None)];
        let ctx = ContextAssembler::new(10_000).assemble(&results);
        assert_eq!(
            ctx.text,
            "[Source 1] (confidence: 0.90, file: notes.txt, page: 2)\nsecond chunk\n\n[Source 2] (confidence: 0.50, file: notes.txt)\nfirst chunk"
        );
        let ids: Vec<&str> = ctx.citations.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["d:1", "d:0"]);
        assert_eq!(ctx.citations[0].index, 1);
        assert_eq!(ctx.citations[0].page_number, Some(2));
        assert_eq!(ctx.dropped, 0);
    }

    #[test]
    fn budget_drops_lowest_ranked_whole_blocks() {
        let results: Vec<RankedResult> = (0..5).map(|i| ranked(&format!("d:{i}"), &"x".repeat(100), 0.5, None)).collect();
        let one_block = ContextAssembler::new(usize::MAX).assemble(&results[..1]).text.chars().count();
        let ctx = ContextAssembler::new(one_block * 2 + 2).assemble(&results);
        assert_eq!(ctx.citations.len(), 2);
        assert_eq!(ctx.dropped, 3);
        assert!(ctx.text.chars().count() <= one_block * 2 + 2);
        assert!(ctx.text.ends_with(&"x".repeat(100)), "never cut mid-fragment");
    }

    #[test]
    fn oversized_top_block_is_kept_whole() {
        let results = vec![ranked("d:0", &"y".repeat(500), 0.7, None), ranked("d:1", "small", 0.6, None)];
        let ctx = ContextAssembler::new(50).assemble(&results);
        assert_eq!(ctx.citations.len(), 1);
        assert!(ctx.text.ends_with(&"y".repeat(500)));
        assert_eq!(ctx.dropped, 1);
    }
}
