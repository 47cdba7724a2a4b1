//! Process-wide capability handles, built once at startup.

use std::sync::Arc;

use tracing::info;

use crate::config::RagConfig;
use crate::embedding::{EmbeddingProvider, probe_embedding_dimension};
use crate::error::{Result, bounded};
use crate::generation::GenerationProvider;
use crate::index::IndexStore;
use crate::vectorstore::VectorStore;

/// The embedding, generation and index handles shared by ingestion and
/// retrieval. Read-only after construction; clone it freely.
#[derive(Clone)]
pub struct RagContext {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    index: Arc<IndexStore>,
}

impl RagContext {
    /// Assemble a context from already-built parts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`](crate::RagError::ConfigurationError)
    /// if `config` is invalid.
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        index: Arc<IndexStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, embedder, generator, index })
    }

    /// Probe the embedding dimension, bind the matching collection on
    /// `store`, and make sure it exists.
    ///
    /// A freshly connected context therefore answers questions against an
    /// empty collection instead of failing with `NotInitialized`.
    pub async fn connect(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        store: Arc<dyn VectorStore>,
        model_tag: &str,
    ) -> Result<Self> {
        config.validate()?;
        let embedding_dim = bounded(
            embedder.name(),
            config.timeouts.embedding,
            probe_embedding_dimension(embedder.as_ref()),
        )
        .await?;

        let index = IndexStore::new(store, model_tag, embedding_dim, config.timeouts.store);
        index.ensure_collection().await?;
        info!(
            embedder = embedder.name(),
            generator = generator.name(),
            collection = index.collection_name(),
            "rag context ready"
        );

        Self::new(config, embedder, generator, Arc::new(index))
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The embedding capability.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// The generation capability.
    pub fn generator(&self) -> &Arc<dyn GenerationProvider> {
        &self.generator
    }

    /// The chunk index.
    pub fn index(&self) -> &Arc<IndexStore> {
        &self.index
    }
}
