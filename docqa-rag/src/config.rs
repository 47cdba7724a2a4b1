//! Configuration for chunking, retrieval and capability timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 400;
/// Default number of chunks retrieved per question.
pub const DEFAULT_N_RESULTS: usize = 5;
/// Default number of retrieved chunks surfaced as sources.
pub const DEFAULT_SOURCE_LIMIT: usize = 3;

/// The default separator priority list: paragraph, line, sentence-ending
/// punctuation, space, then character-level.
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ".", "?", "!", " ", ""].iter().map(|s| (*s).to_string()).collect()
}

/// What to do with chunks left over from an earlier, longer ingestion of a source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaleChunkPolicy {
    /// Leave them in place; only same-sequence ids are overwritten.
    #[default]
    Retain,
    /// Delete every `<source>_<n>` with `n` at or past the new chunk count.
    Prune,
}

/// Per-call deadlines for the external capabilities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityTimeouts {
    /// Deadline for one embedding call (single or bulk).
    pub embedding: Duration,
    /// Deadline for one generation call.
    pub generation: Duration,
    /// Deadline for one vector store call.
    pub store: Duration,
}

impl Default for CapabilityTimeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(60),
            generation: Duration::from_secs(120),
            store: Duration::from_secs(30),
        }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Separators tried in priority order; `""` means character-level.
    pub separators: Vec<String>,
    /// Number of chunks retrieved when the caller does not say.
    pub n_results: usize,
    /// Maximum number of retrieved chunks returned as sources.
    pub source_limit: usize,
    /// Handling of stale chunks on re-ingestion.
    pub stale_chunks: StaleChunkPolicy,
    /// Deadlines for capability calls.
    pub timeouts: CapabilityTimeouts,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: default_separators(),
            n_results: DEFAULT_N_RESULTS,
            source_limit: DEFAULT_SOURCE_LIMIT,
            stale_chunks: StaleChunkPolicy::default(),
            timeouts: CapabilityTimeouts::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - the separator list is empty
    /// - `n_results == 0`
    /// - any timeout is zero
    pub fn validate(&self) -> Result<()> {
        validate_sizing(self.chunk_size, self.chunk_overlap)?;
        if self.separators.is_empty() {
            return Err(RagError::ConfigurationError(
                "at least one separator is required".to_string(),
            ));
        }
        if self.n_results == 0 {
            return Err(RagError::ConfigurationError(
                "n_results must be greater than zero".to_string(),
            ));
        }
        let timeouts = &self.timeouts;
        if timeouts.embedding.is_zero() || timeouts.generation.is_zero() || timeouts.store.is_zero()
        {
            return Err(RagError::ConfigurationError("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Reject chunk sizing where the overlap would not leave room for new text.
pub(crate) fn validate_sizing(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigurationError("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigurationError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Replace the separator priority list.
    pub fn separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default number of chunks retrieved per question.
    pub fn n_results(mut self, n: usize) -> Self {
        self.config.n_results = n;
        self
    }

    /// Set how many retrieved chunks are returned as sources.
    pub fn source_limit(mut self, limit: usize) -> Self {
        self.config.source_limit = limit;
        self
    }

    /// Set the stale-chunk policy for re-ingestion.
    pub fn stale_chunks(mut self, policy: StaleChunkPolicy) -> Self {
        self.config.stale_chunks = policy;
        self
    }

    /// Set the capability deadlines.
    pub fn timeouts(mut self, timeouts: CapabilityTimeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
