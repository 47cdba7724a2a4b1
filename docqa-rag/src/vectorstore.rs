//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`IndexEntry`]s and support
/// upserting, deleting, listing, and searching by vector similarity.
/// Operations on a collection that was never created return
/// [`RagError::NotInitialized`](crate::RagError::NotInitialized).
///
/// The core does not synchronize writers: concurrent upserts of one id are
/// last-writer-wins, and a clear racing with an upsert may or may not remove
/// the new entry, depending on the backend's own atomicity.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs_mxbai_1024d", 1024).await?;
/// store.upsert("docs_mxbai_1024d", &entries).await?;
/// let results = store.search("docs_mxbai_1024d", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and error messages.
    fn backend(&self) -> &str;

    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Upsert entries into a collection; an existing id is overwritten.
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Delete entries by their IDs from a collection. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// List every id stored in a collection, in no particular order.
    async fn ids(&self, collection: &str) -> Result<Vec<String>>;

    /// Number of entries in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Search for the `top_k` most similar entries to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}
