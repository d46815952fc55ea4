//! Domain types shared by the chunker, the stores and the retrieval engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type ChunkId = String;
pub type DocumentId = String;
pub type SessionId = String;

/// Fresh session identifier, `session_<32 hex>`.
pub fn new_session_id() -> SessionId {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

pub fn new_document_id() -> DocumentId {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Chunk ids are `<document_id>:<sequence_index>`, unique per document position.
pub fn chunk_id(document_id: &str, sequence_index: usize) -> ChunkId {
    format!("{document_id}:{sequence_index}")
}

/// An uploaded document. Owned by exactly one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub session_id: SessionId,
    pub filename: String,
    pub raw_text: String,
    pub upload_time: DateTime<Utc>,
}

impl Document {
    pub fn new(session_id: &str, filename: &str, raw_text: impl Into<String>) -> Self {
        Self {
            document_id: new_document_id(),
            session_id: session_id.to_string(),
            filename: filename.to_string(),
            raw_text: raw_text.into(),
            upload_time: Utc::now(),
        }
    }
}

/// A contiguous fragment of a document's text, the unit of retrieval.
///
/// - `char_start`/`char_end`: half-open range in *characters* (not bytes)
///   into the document's raw text, `char_start < char_end`
/// - `page_number`: 1-based page the chunk starts on, when the extracted
///   text carried form-feed page breaks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub session_id: SessionId,
    pub sequence_index: usize,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub page_number: Option<u32>,
}

/// A chunk after indexing: its embedding plus the lexical tokens that went
/// into the keyword index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub lexical_tokens: Vec<String>,
}

/// Snapshot of a session: the isolation boundary for every retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub document_ids: BTreeSet<DocumentId>,
}

/// The independent retrieval methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Semantic,
    Keyword,
    Reference,
    Fallback,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [Self::Semantic, Self::Keyword, Self::Reference, Self::Fallback];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Reference => "reference",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw hit from one strategy, before normalization.
///
/// `raw_score` is strategy specific; higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub filename: String,
    pub text: String,
    pub sequence_index: usize,
    pub page_number: Option<u32>,
    pub raw_score: f32,
    pub strategy: StrategyKind,
}

/// A fused, deduplicated result with a confidence in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub filename: String,
    pub text: String,
    pub sequence_index: usize,
    pub page_number: Option<u32>,
    pub confidence: f32,
    pub contributing_strategies: BTreeSet<StrategyKind>,
    /// Normalized per-strategy scores that went into `confidence`.
    pub strategy_scores: BTreeMap<StrategyKind, f32>,
}

/// Which strategies produced the final context, as reported to the
/// generation side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Semantic,
    Keyword,
    Reference,
    Hybrid,
    Fallback,
    None,
}

impl SearchMethod {
    pub fn from_results(results: &[RankedResult]) -> Self {
        let used: BTreeSet<StrategyKind> = results
            .iter()
            .flat_map(|r| r.contributing_strategies.iter().copied())
            .collect();
        let mut iter = used.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => Self::None,
            (Some(only), None) => only.into(),
            (Some(_), Some(_)) => Self::Hybrid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Reference => "reference",
            Self::Hybrid => "hybrid",
            Self::Fallback => "fallback",
            Self::None => "none",
        }
    }
}

impl From<StrategyKind> for SearchMethod {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Semantic => Self::Semantic,
            StrategyKind::Keyword => Self::Keyword,
            StrategyKind::Reference => Self::Reference,
            StrategyKind::Fallback => Self::Fallback,
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(strategies: &[StrategyKind]) -> RankedResult {
        RankedResult {
            chunk_id: "d:0".into(),
            document_id: "d".into(),
            filename: "a.txt".into(),
            text: "x".into(),
            sequence_index: 0,
            page_number: None,
            confidence: 0.5,
            contributing_strategies: strategies.iter().copied().collect(),
            strategy_scores: BTreeMap::new(),
        }
    }

    #[test]
    fn search_method_reflects_contributors() {
        assert_eq!(SearchMethod::from_results(&[]), SearchMethod::None);
        assert_eq!(
            SearchMethod::from_results(&[result(&[StrategyKind::Keyword]), result(&[StrategyKind::Keyword])]),
            SearchMethod::Keyword
        );
        assert_eq!(SearchMethod::from_results(&[result(&[StrategyKind::Fallback])]), SearchMethod::Fallback);
        assert_eq!(
            SearchMethod::from_results(&[result(&[StrategyKind::Semantic]), result(&[StrategyKind::Reference])]),
            SearchMethod::Hybrid
        );
    }

    #[test]
    fn chunk_ids_are_positional() {
        assert_eq!(chunk_id("abc", 3), "abc:3");
        assert!(new_session_id().starts_with("session_"));
    }
}
