//! Error types for the `docqa-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in chunking, indexing and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking or pipeline configuration. Never retried.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The chunker produced nothing to ingest for a source.
    #[error("Empty content: source '{source_id}' produced no chunks")]
    EmptyContent {
        /// The source whose content was empty.
        source_id: String,
    },

    /// A vector does not match the collection's embedding dimension.
    #[error("Dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collection that rejected the vector.
        collection: String,
        /// The collection's embedding dimension.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// The collection or a capability has not been set up yet.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// A call to the embedding, generation or store capability failed.
    #[error("Upstream failure ({service}): {message}")]
    UpstreamFailure {
        /// The capability that failed (e.g. `ollama-embed`, `chroma`).
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// Both the primary and the fallback retrieval attempts failed.
    #[error("Retrieval failed with both embedding strategies (primary: {primary}; fallback: {fallback})")]
    ExhaustedFallback {
        /// The error from the bulk-embedding attempt.
        primary: Box<RagError>,
        /// The error from the single-query-embedding attempt.
        fallback: Box<RagError>,
    },
}

impl RagError {
    /// Build an [`RagError::UpstreamFailure`] for the given service.
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFailure { service: service.into(), message: message.into() }
    }

    pub(crate) fn timed_out(service: &str, limit: Duration) -> Self {
        Self::upstream(service, format!("call timed out after {}ms", limit.as_millis()))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Run a capability call under a deadline, reporting expiry as an upstream failure.
pub(crate) async fn bounded<T, F>(service: &str, limit: Duration, call: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RagError::timed_out(service, limit)),
    }
}
