//! Data types for documents, chunks, index entries and answers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key under which an index entry records its source.
pub const SOURCE_KEY: &str = "source";
/// Metadata key under which an index entry records its chunk sequence.
pub const SEQUENCE_KEY: &str = "sequence";

/// Where a piece of text came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceMetadata {
    /// Identifier of the source (file name, URL, ...).
    pub source: String,
}

impl SourceMetadata {
    /// Create metadata for the given source identifier.
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

/// A unit of source text handed to the core by an extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The plain text content.
    pub content: String,
    /// Source metadata.
    pub metadata: SourceMetadata,
}

impl Document {
    /// Create a document for the given source.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: SourceMetadata::new(source) }
    }
}

/// Derive the stable identifier of the chunk at `sequence` within `source`.
pub fn chunk_id(source: &str, sequence: usize) -> String {
    format!("{source}_{sequence}")
}

/// Recover the sequence number from an id produced by [`chunk_id`] for `source`.
///
/// Returns `None` for ids belonging to other sources.
pub fn chunk_sequence(id: &str, source: &str) -> Option<usize> {
    id.strip_prefix(source)?.strip_prefix('_')?.parse().ok()
}

/// A bounded, overlap-linked segment of a source's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `"<source>_<sequence>"`.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Metadata inherited from the source.
    pub metadata: SourceMetadata,
    /// 0-based position within the source's chunk stream.
    pub sequence: usize,
}

impl Chunk {
    /// Create the chunk at `sequence` for `source`, deriving its id.
    pub fn new(source: &str, sequence: usize, text: impl Into<String>) -> Self {
        Self {
            id: chunk_id(source, sequence),
            text: text.into(),
            metadata: SourceMetadata::new(source),
            sequence,
        }
    }
}

/// An entry of a vector index collection: text, vector and string metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Unique id within the collection.
    pub id: String,
    /// The stored text.
    pub text: String,
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// Key-value metadata (`source`, `sequence` for ingested chunks).
    pub metadata: HashMap<String, String>,
}

impl IndexEntry {
    /// Build the entry for an embedded chunk.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        let metadata = HashMap::from([
            (SOURCE_KEY.to_string(), chunk.metadata.source.clone()),
            (SEQUENCE_KEY.to_string(), chunk.sequence.to_string()),
        ]);
        Self { id: chunk.id.clone(), text: chunk.text.clone(), embedding, metadata }
    }
}

/// A retrieved [`IndexEntry`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved entry.
    pub entry: IndexEntry,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of chunks written.
    pub chunk_count: usize,
    /// Number of stale chunks removed from an earlier, longer ingestion.
    pub pruned_count: usize,
}

/// Outcome of clearing the collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearReport {
    /// Number of entries removed.
    pub removed_count: usize,
}

/// A grounded answer with the chunks it was synthesized from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated (or fixed "no documents") answer text.
    pub answer_text: String,
    /// Up to three retrieved chunk texts, nearest first.
    pub sources: Vec<String>,
    /// Whether the single-query embedding fallback produced this answer.
    pub used_fallback: bool,
}
