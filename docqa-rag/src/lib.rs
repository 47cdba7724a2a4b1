//! # docqa-rag
//!
//! Grounded question answering over a local document base.
//!
//! ## Overview
//!
//! Plain text goes in through [`IngestionPipeline`]: it is split into
//! overlapping chunks by a [`RecursiveChunker`], embedded in one bulk call,
//! and upserted into an [`IndexStore`] collection named after the embedding
//! model and dimension. Questions go through [`RetrievalOrchestrator`],
//! which embeds the question, fetches the nearest chunks and asks a
//! [`GenerationProvider`] for an answer restricted to that context.
//!
//! [`RagPipeline`] ties both paths together behind one builder.
//!
//! ## Features
//!
//! - `ollama`: [`ollama::OllamaEmbeddingProvider`] and [`ollama::OllamaGenerator`]
//! - `chroma`: [`chroma::ChromaVectorStore`]
//! - `full`: everything above
//!
//! Without features the crate still ships [`InMemoryVectorStore`], which is
//! enough for tests and single-process use.

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod ingest;
pub mod pipeline;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "chroma")]
pub mod chroma;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use chunking::{Chunker, RecursiveChunker, paragraph_chunker, split_text};
pub use config::{CapabilityTimeouts, RagConfig, RagConfigBuilder, StaleChunkPolicy};
pub use context::RagContext;
pub use document::{
    Answer, Chunk, ClearReport, Document, IndexEntry, IngestReport, SearchResult, SourceMetadata,
    chunk_id, chunk_sequence,
};
pub use embedding::{EmbeddingProvider, probe_embedding_dimension};
pub use error::{RagError, Result};
pub use extract::{DocumentTextExtractor, WebTextExtractor, normalize_page_text};
pub use generation::GenerationProvider;
pub use index::{IndexStore, collection_name};
pub use inmemory::InMemoryVectorStore;
pub use ingest::IngestionPipeline;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retrieval::{EmbeddingStrategy, NO_DOCUMENTS_ANSWER, RetrievalOrchestrator};
pub use vectorstore::VectorStore;
