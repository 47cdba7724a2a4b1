//! RAG pipeline facade.
//!
//! The [`RagPipeline`] is what the HTTP layer talks to. It owns one
//! [`RagContext`] and the [`IngestionPipeline`] and [`RetrievalOrchestrator`]
//! built from it, and exposes `ingest`, `answer`, `clear` and `count`.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .model_tag("mxbai")
//!     .build()
//!     .await?;
//!
//! pipeline.ingest(&text, "handbook.pdf").await?;
//! let answer = pipeline.answer("How many vacation days?", 5).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::context::RagContext;
use crate::document::{Answer, ClearReport, Document, IngestReport};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{DocumentTextExtractor, WebTextExtractor};
use crate::generation::GenerationProvider;
use crate::index::IndexStore;
use crate::ingest::IngestionPipeline;
use crate::retrieval::RetrievalOrchestrator;
use crate::vectorstore::VectorStore;

/// The ingest-and-answer entry point. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    context: RagContext,
    ingestion: IngestionPipeline,
    retrieval: RetrievalOrchestrator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Build a pipeline over an existing context, chunking per its config.
    pub fn from_context(context: RagContext) -> Result<Self> {
        let ingestion = IngestionPipeline::new(&context)?;
        let retrieval = RetrievalOrchestrator::new(&context);
        Ok(Self { context, ingestion, retrieval })
    }

    /// The shared capability handles.
    pub fn context(&self) -> &RagContext {
        &self.context
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        self.context.config()
    }

    /// The collection chunks are stored in.
    pub fn collection_name(&self) -> &str {
        self.context.index().collection_name()
    }

    /// The embedding dimension of the collection.
    pub fn embedding_dim(&self) -> usize {
        self.context.index().embedding_dim()
    }

    /// Chunk, embed and store `content` under `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyContent`] when there is nothing to store.
    pub async fn ingest(&self, content: &str, source_id: &str) -> Result<IngestReport> {
        self.ingestion.ingest(content, source_id).await
    }

    /// Ingest the pages of one source with a continuous chunk sequence.
    pub async fn ingest_pages(&self, pages: &[Document], source_id: &str) -> Result<IngestReport> {
        self.ingestion.ingest_pages(pages, source_id).await
    }

    /// Extract the pages of a binary document and ingest them.
    pub async fn ingest_bytes(
        &self,
        extractor: &dyn DocumentTextExtractor,
        bytes: &[u8],
        source_id: &str,
    ) -> Result<IngestReport> {
        let pages = extractor.extract(bytes, source_id).await?;
        info!(source = source_id, pages = pages.len(), "extracted document");
        self.ingest_pages(&pages, source_id).await
    }

    /// Fetch a web page and ingest its text under the page URL.
    pub async fn ingest_url(
        &self,
        extractor: &dyn WebTextExtractor,
        url: &str,
    ) -> Result<IngestReport> {
        let page = extractor.fetch(url).await?;
        self.ingestion.ingest_document(&page).await
    }

    /// Answer `question` from the `n_results` nearest chunks.
    pub async fn answer(&self, question: &str, n_results: usize) -> Result<Answer> {
        self.retrieval.answer(question, n_results).await
    }

    /// Remove every stored chunk.
    pub async fn clear(&self) -> Result<ClearReport> {
        let removed_count = self.context.index().delete_all().await.inspect_err(|e| {
            error!(collection = self.collection_name(), error = %e, "failed to clear collection");
        })?;
        info!(collection = self.collection_name(), removed_count, "cleared collection");
        Ok(ClearReport { removed_count })
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> Result<usize> {
        self.context.index().count().await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider, generation provider and vector store are
/// required. Without an explicit [`embedding_dim`](Self::embedding_dim) the
/// dimension is probed from the embedding provider at build time.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .embedding_provider(Arc::new(embedder))
///     .generation_provider(Arc::new(llm))
///     .vector_store(Arc::new(store))
///     .chunker(Arc::new(paragraph_chunker(2000, 400)?))  // optional
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    model_tag: Option<String>,
    embedding_dim: Option<usize>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Replace the chunker built from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the model tag used in the collection name. Defaults to the
    /// embedding provider's name.
    pub fn model_tag(mut self, tag: impl Into<String>) -> Self {
        self.model_tag = Some(tag.into());
        self
    }

    /// Skip the startup probe and use this embedding dimension.
    pub fn embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = Some(dim);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set
    /// and that the collection exists.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if a required field is missing
    /// or the config is invalid, and propagates probe and store failures.
    pub async fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedder = self.embedding_provider.ok_or_else(|| {
            RagError::ConfigurationError("embedding_provider is required".to_string())
        })?;
        let generator = self.generation_provider.ok_or_else(|| {
            RagError::ConfigurationError("generation_provider is required".to_string())
        })?;
        let store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigurationError("vector_store is required".to_string()))?;
        let model_tag = self.model_tag.unwrap_or_else(|| embedder.name().to_string());

        let context = match self.embedding_dim {
            Some(dim) => {
                config.validate()?;
                let index = IndexStore::new(store, &model_tag, dim, config.timeouts.store);
                index.ensure_collection().await?;
                RagContext::new(config, embedder, generator, Arc::new(index))?
            }
            None => RagContext::connect(config, embedder, generator, store, &model_tag).await?,
        };

        match self.chunker {
            Some(chunker) => Ok(RagPipeline {
                ingestion: IngestionPipeline::with_chunker(&context, chunker),
                retrieval: RetrievalOrchestrator::new(&context),
                context,
            }),
            None => RagPipeline::from_context(context),
        }
    }
}
