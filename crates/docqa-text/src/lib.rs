//! docqa-text
//!
//! Tantivy-backed lexical store. Each session gets its own in-RAM index with a
//! lowercasing, stop-word filtering analyzer; search is BM25 over the
//! session's chunks only.

pub mod index;
pub mod search;
pub mod store;
pub mod tantivy_utils;

pub use index::SessionTextIndex;
pub use store::TantivyLexicalStore;
pub use tantivy_utils::lexical_tokens;
