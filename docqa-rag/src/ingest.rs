//! Write path: chunk → embed in bulk → upsert.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::StaleChunkPolicy;
use crate::context::RagContext;
use crate::document::{Chunk, Document, IndexEntry, IngestReport, chunk_sequence};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result, bounded};
use crate::index::IndexStore;

/// Turns plain text into stored chunks.
///
/// Failures are not rolled back: when the store rejects a write, chunks
/// already accepted by the backend stay in place and the caller decides
/// whether to re-ingest.
pub struct IngestionPipeline {
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<IndexStore>,
    stale_chunks: StaleChunkPolicy,
    embed_timeout: Duration,
}

impl IngestionPipeline {
    /// Build a pipeline over the context's handles, chunking with the
    /// context configuration.
    pub fn new(context: &RagContext) -> Result<Self> {
        let chunker = RecursiveChunker::from_config(context.config())?;
        Ok(Self::with_chunker(context, Arc::new(chunker)))
    }

    /// Build a pipeline with a custom chunker.
    pub fn with_chunker(context: &RagContext, chunker: Arc<dyn Chunker>) -> Self {
        Self {
            chunker,
            embedder: Arc::clone(context.embedder()),
            index: Arc::clone(context.index()),
            stale_chunks: context.config().stale_chunks,
            embed_timeout: context.config().timeouts.embedding,
        }
    }

    /// Ingest `content` under `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyContent`] if chunking yields nothing, and
    /// propagates embedding and store failures without retrying.
    pub async fn ingest(&self, content: &str, source_id: &str) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(&Document::new(content, source_id));
        self.store_chunks(source_id, chunks).await
    }

    /// Ingest a document using its own source metadata.
    pub async fn ingest_document(&self, document: &Document) -> Result<IngestReport> {
        self.ingest(&document.content, &document.metadata.source).await
    }

    /// Ingest several pages of one source.
    ///
    /// Each page is chunked on its own, so no chunk straddles a page break;
    /// the chunks are then numbered with one sequence across all pages and
    /// embedded in a single bulk call.
    pub async fn ingest_pages(&self, pages: &[Document], source_id: &str) -> Result<IngestReport> {
        let chunks: Vec<Chunk> = pages
            .iter()
            .flat_map(|page| self.chunker.split(&page.content))
            .enumerate()
            .map(|(sequence, text)| Chunk::new(source_id, sequence, text))
            .collect();
        info!(source = source_id, pages = pages.len(), chunk_count = chunks.len(), "chunked pages");
        self.store_chunks(source_id, chunks).await
    }

    async fn store_chunks(&self, source_id: &str, chunks: Vec<Chunk>) -> Result<IngestReport> {
        if chunks.is_empty() {
            return Err(RagError::EmptyContent { source_id: source_id.to_string() });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            bounded(self.embedder.name(), self.embed_timeout, self.embedder.embed_batch(&texts))
                .await
                .inspect_err(|e| {
                    error!(source = source_id, error = %e, "embedding failed during ingestion");
                })?;

        if embeddings.len() != chunks.len() {
            error!(
                source = source_id,
                expected = chunks.len(),
                actual = embeddings.len(),
                "embedding count mismatch"
            );
            return Err(RagError::upstream(
                self.embedder.name(),
                format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            ));
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::from_chunk(chunk, embedding))
            .collect();

        self.index.add_entries(&entries).await.inspect_err(|e| {
            error!(source = source_id, error = %e, "upsert failed during ingestion");
        })?;

        let chunk_count = entries.len();
        let pruned_count = match self.stale_chunks {
            StaleChunkPolicy::Retain => 0,
            StaleChunkPolicy::Prune => self.prune_stale(source_id, chunk_count).await?,
        };

        info!(
            source = source_id,
            chunk_count,
            pruned_count,
            collection = self.index.collection_name(),
            "ingested source"
        );
        Ok(IngestReport { chunk_count, pruned_count })
    }

    /// Delete `<source>_<n>` ids with `n >= chunk_count`.
    async fn prune_stale(&self, source_id: &str, chunk_count: usize) -> Result<usize> {
        let stale: Vec<String> = self
            .index
            .ids()
            .await?
            .into_iter()
            .filter(|id| chunk_sequence(id, source_id).is_some_and(|seq| seq >= chunk_count))
            .collect();
        let refs: Vec<&str> = stale.iter().map(String::as_str).collect();
        self.index.delete(&refs).await?;
        Ok(stale.len())
    }
}
