//! Ingestion error types

use thiserror::Error;

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Topic queue has no receiver left
    #[error("queue closed for topic {topic}")]
    QueueClosed {
        /// Topic kind
        topic: &'static str,
    },

    /// Batch payload is neither an array nor a single record
    #[error("malformed batch for topic {topic}: {message}")]
    MalformedBatch {
        /// Upstream topic name
        topic: String,
        /// Error message
        message: String,
    },

    /// Feed source failed (connection drop, protocol error)
    #[error("feed '{source_name}' failed: {message}")]
    Feed {
        /// Feed source name
        source_name: String,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    /// Create a feed failure
    pub fn feed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Feed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
