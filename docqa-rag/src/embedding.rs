//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Embedding back-ends commonly expose two call shapes, a single-text call
/// and a batch call, which are not guaranteed to return numerically
/// identical vectors. Ingestion always uses [`embed_batch`](Self::embed_batch);
/// retrieval uses it too and only falls back to [`embed`](Self::embed) when
/// the batch path fails.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let vectors = provider.embed_batch(&["hello world"]).await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Determine the embedding dimension by embedding a probe text with both
/// call shapes.
///
/// When the shapes disagree, the batch dimension wins since ingestion stores
/// batch vectors.
///
/// # Errors
///
/// Propagates provider failures, and returns [`RagError::UpstreamFailure`]
/// if the batch call returns no vector or a zero-length one.
pub async fn probe_embedding_dimension(provider: &dyn EmbeddingProvider) -> Result<usize> {
    let single = provider.embed("test").await?;
    let batch = provider.embed_batch(&["test"]).await?;
    let batch_dim = batch.first().map(Vec::len).unwrap_or(0);

    if batch_dim == 0 {
        return Err(RagError::upstream(
            provider.name(),
            "batch embedding returned no vector for the probe text",
        ));
    }

    if single.len() != batch_dim {
        warn!(
            provider = provider.name(),
            single_dim = single.len(),
            batch_dim,
            "embedding dimension inconsistency between call shapes, using batch dimension"
        );
    } else {
        info!(provider = provider.name(), embedding_dim = batch_dim, "probed embedding dimension");
    }

    Ok(batch_dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShapeMismatch;

    #[async_trait]
    impl EmbeddingProvider for ShapeMismatch {
        fn name(&self) -> &str {
            "shape-mismatch"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 3])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.25; 5]).collect())
        }
    }

    struct Constant;

    #[async_trait]
    impl EmbeddingProvider for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[tokio::test]
    async fn probe_prefers_the_batch_dimension() {
        assert_eq!(probe_embedding_dimension(&ShapeMismatch).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn default_batch_embeds_each_text_in_order() {
        let vectors = Constant.embed_batch(&["a", "bbb"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
        assert_eq!(probe_embedding_dimension(&Constant).await.unwrap(), 2);
    }
}
