//! docqa-hybrid
//!
//! Hybrid retrieval and context assembly over per-session indexes. A
//! question runs through semantic, keyword and structural-reference search
//! concurrently (plus a broad fallback when they find too little); the
//! candidates are normalized per strategy, fused by weighted corroboration,
//! optionally reranked, and rendered as numbered, cited source blocks within
//! a character budget. Finished retrievals are cached per session state.

mod backend;
pub mod context;
pub mod engine;
pub mod fusion;
pub mod indexer;
pub mod prompt;
pub mod rerank;
pub mod search_cache;
pub mod session;
pub mod strategy;

pub use context::{AssembledContext, Citation, ContextAssembler};
pub use engine::{Answer, HybridEngine, IngestReport, Retrieval};
pub use fusion::{overall_confidence, FusionEngine};
pub use indexer::{FailedChunk, IndexReport, Indexer};
pub use prompt::{render_prompt, AnswerGenerator};
pub use rerank::{RerankStage, RerankStatus, Reranker};
pub use search_cache::SearchCache;
pub use session::{DocumentRecord, SessionIndex, SessionStats};
pub use strategy::{RetrievalStrategy, StrategyOutcome, StrategyPlan, StrategyStatus};
