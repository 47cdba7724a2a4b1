//! The dimension-namespaced chunk collection the pipeline reads and writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result, bounded};
use crate::vectorstore::VectorStore;

/// Name of the collection holding vectors of `embedding_dim` from the model
/// identified by `model_tag`.
///
/// Swapping to a model with a different dimension selects a different
/// collection instead of mixing vector lengths in one index.
pub fn collection_name(model_tag: &str, embedding_dim: usize) -> String {
    format!("docs_{model_tag}_{embedding_dim}d")
}

/// A single collection of a [`VectorStore`] bound to one embedding dimension.
///
/// Every vector written or used as a query must have exactly
/// `embedding_dim` components. The collection is created on first write (or
/// by [`ensure_collection`](Self::ensure_collection)); reads before that
/// fail with [`RagError::NotInitialized`].
pub struct IndexStore {
    backend: Arc<dyn VectorStore>,
    collection: String,
    embedding_dim: usize,
    timeout: Duration,
    created: OnceCell<()>,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("backend", &self.backend.backend())
            .field("collection", &self.collection)
            .field("embedding_dim", &self.embedding_dim)
            .finish()
    }
}

impl IndexStore {
    /// Bind to the collection for `model_tag` and `embedding_dim` on `backend`.
    ///
    /// Every backend call is bounded by `timeout`.
    pub fn new(
        backend: Arc<dyn VectorStore>,
        model_tag: &str,
        embedding_dim: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            collection: collection_name(model_tag, embedding_dim),
            embedding_dim,
            timeout,
            created: OnceCell::new(),
        }
    }

    /// The collection this store reads and writes.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// The vector length every entry must have.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Create the collection if it does not exist yet. Idempotent.
    pub async fn ensure_collection(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| async {
                self.call(self.backend.create_collection(&self.collection, self.embedding_dim))
                    .await?;
                info!(
                    collection = %self.collection,
                    embedding_dim = self.embedding_dim,
                    backend = self.backend.backend(),
                    "using collection"
                );
                Ok::<(), RagError>(())
            })
            .await?;
        Ok(())
    }

    /// Upsert one entry without metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `vector.len()` differs from
    /// the collection's dimension.
    pub async fn add(&self, id: &str, text: &str, vector: Vec<f32>) -> Result<()> {
        let entry = IndexEntry {
            id: id.to_string(),
            text: text.to_string(),
            embedding: vector,
            metadata: HashMap::new(),
        };
        self.add_entries(std::slice::from_ref(&entry)).await
    }

    /// Upsert a batch of entries in one backend call.
    ///
    /// The whole batch is rejected before any write if one vector has the
    /// wrong length. A backend failure part way through is not rolled back.
    pub async fn add_entries(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in entries {
            self.check_dimension(entry.embedding.len())?;
        }
        self.ensure_collection().await?;
        self.call(self.backend.upsert(&self.collection, entries)).await?;
        debug!(collection = %self.collection, count = entries.len(), "upserted entries");
        Ok(())
    }

    /// The texts of the `n_results` entries nearest to `vector`, nearest first.
    ///
    /// An empty collection yields an empty `Vec`.
    pub async fn query(&self, vector: &[f32], n_results: usize) -> Result<Vec<String>> {
        Ok(self.search(vector, n_results).await?.into_iter().map(|r| r.entry.text).collect())
    }

    /// Like [`query`](Self::query) but keeps scores and metadata.
    pub async fn search(&self, vector: &[f32], n_results: usize) -> Result<Vec<SearchResult>> {
        self.check_dimension(vector.len())?;
        if n_results == 0 {
            return Ok(Vec::new());
        }
        self.call(self.backend.search(&self.collection, vector, n_results)).await
    }

    /// Remove entries by id; unknown ids are ignored.
    pub async fn delete(&self, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.call(self.backend.delete(&self.collection, ids)).await
    }

    /// Remove every entry, returning how many were removed.
    pub async fn delete_all(&self) -> Result<usize> {
        let ids = self.ids().await?;
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.delete(&refs).await?;
        Ok(ids.len())
    }

    /// Every id currently stored.
    pub async fn ids(&self) -> Result<Vec<String>> {
        self.call(self.backend.ids(&self.collection)).await
    }

    /// Number of entries currently stored.
    pub async fn count(&self) -> Result<usize> {
        self.call(self.backend.count(&self.collection)).await
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.embedding_dim {
            return Err(RagError::DimensionMismatch {
                collection: self.collection.clone(),
                expected: self.embedding_dim,
                actual,
            });
        }
        Ok(())
    }

    async fn call<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        bounded(self.backend.backend(), self.timeout, fut).await
    }
}
