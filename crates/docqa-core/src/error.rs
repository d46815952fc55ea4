use std::time::Duration;

use thiserror::Error;

use crate::types::{SessionId, StrategyKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Strategy '{strategy}' timed out after {}ms", timeout.as_millis())]
    StrategyTimeout { strategy: StrategyKind, timeout: Duration },

    #[error("Strategy '{strategy}' unavailable: {reason}")]
    StrategyUnavailable { strategy: StrategyKind, reason: String },

    /// The session has zero indexed chunks.
    #[error("Session {0} has no indexed content")]
    NoIndexedContent(SessionId),

    /// Content exists but nothing matched, even after fallback.
    #[error("No relevant results in session {0}")]
    NoRelevantResults(SessionId),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Storage operation failed: {0}")]
    Store(String),

    #[error("Unknown document {document_id} in session {session_id}")]
    UnknownDocument { session_id: SessionId, document_id: String },

    #[error("Chunk belongs to session {found}, not {expected}")]
    SessionMismatch { expected: SessionId, found: SessionId },
}

impl Error {
    /// Configuration errors are fatal at setup; everything else is a runtime condition.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::DimensionMismatch { .. })
    }

    /// The two explicit "nothing to show" signals a caller must distinguish.
    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoIndexedContent(_) | Self::NoRelevantResults(_))
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
