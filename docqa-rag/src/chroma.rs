//! Chroma vector store backend.
//!
//! Provides [`ChromaVectorStore`] which implements [`VectorStore`] against a
//! Chroma server's REST API (`/api/v1`). Collections are created with cosine
//! space, so a returned distance `d` maps to the score `1 - d`.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::chroma::ChromaVectorStore;
//!
//! let store = ChromaVectorStore::new("http://localhost:8000")?;
//! store.create_collection("docs_mxbai_1024d", 1024).await?;
//! store.upsert("docs_mxbai_1024d", &entries).await?;
//! let results = store.search("docs_mxbai_1024d", &query_embedding, 5).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "chroma";

/// A [`VectorStore`] backed by [Chroma](https://www.trychroma.com/).
///
/// Chroma addresses collections by id in its data endpoints, so resolved
/// name-to-id mappings are cached for the lifetime of the store.
pub struct ChromaVectorStore {
    client: reqwest::Client,
    base_url: String,
    ids: RwLock<HashMap<String, String>>,
}

impl ChromaVectorStore {
    /// Create a store talking to the Chroma server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(Self::map_err)?;
        Ok(Self::from_client(client, base_url))
    }

    /// Bound every HTTP request at the transport level.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build().map_err(Self::map_err)?;
        Ok(self)
    }

    /// Create a store from an existing HTTP client.
    pub fn from_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ids: RwLock::new(HashMap::new()),
        }
    }

    fn map_err(e: reqwest::Error) -> RagError {
        RagError::upstream(BACKEND, e.to_string())
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::upstream(BACKEND, format!("API returned {status}: {body}")));
        }
        response.json().await.map_err(Self::map_err)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> Result<R> {
        let response = self.client.post(url).json(body).send().await.map_err(Self::map_err)?;
        Self::decode(response).await
    }

    /// Look the collection up by name, returning `None` when Chroma does not know it.
    async fn lookup(&self, name: &str) -> Result<Option<String>> {
        if let Some(id) = self.ids.read().await.get(name) {
            return Ok(Some(id.clone()));
        }

        let url = format!("{}/{name}", self.collections_url());
        let response = self.client.get(&url).send().await.map_err(Self::map_err)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Older servers report a missing collection as a 500 with a ValueError.
            if status == StatusCode::NOT_FOUND || body.contains("does not exist") {
                return Ok(None);
            }
            return Err(RagError::upstream(BACKEND, format!("API returned {status}: {body}")));
        }

        let collection: CollectionResponse = response.json().await.map_err(Self::map_err)?;
        self.ids.write().await.insert(name.to_string(), collection.id.clone());
        Ok(Some(collection.id))
    }

    async fn resolve(&self, name: &str) -> Result<String> {
        self.lookup(name).await?.ok_or_else(|| {
            RagError::NotInitialized(format!("collection '{name}' does not exist in {BACKEND}"))
        })
    }
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a HashMap<String, String>>,
}

impl<'a> UpsertRequest<'a> {
    fn from_entries(entries: &'a [IndexEntry]) -> Self {
        Self {
            ids: entries.iter().map(|e| e.id.as_str()).collect(),
            embeddings: entries.iter().map(|e| e.embedding.as_slice()).collect(),
            documents: entries.iter().map(|e| e.text.as_str()).collect(),
            metadatas: entries.iter().map(|e| &e.metadata).collect(),
        }
    }
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
}

/// Query results are nested one level per query embedding.
#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<HashMap<String, serde_json::Value>>>>>,
}

impl QueryResponse {
    fn into_results(self) -> Vec<SearchResult> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut documents = self.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let mut distances = self.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let mut metadatas = self.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        documents.resize(ids.len(), None);
        distances.resize(ids.len(), 1.0);
        metadatas.resize(ids.len(), None);

        ids.into_iter()
            .zip(documents)
            .zip(distances)
            .zip(metadatas)
            .map(|(((id, text), distance), metadata)| {
                let metadata = metadata
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect();
                SearchResult {
                    entry: IndexEntry {
                        id,
                        text: text.unwrap_or_default(),
                        embedding: vec![],
                        metadata,
                    },
                    score: 1.0 - distance,
                }
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let body = json!({
            "name": name,
            "get_or_create": true,
            "metadata": { "hnsw:space": "cosine" },
        });
        let collection: CollectionResponse = self.post(&self.collections_url(), &body).await?;
        self.ids.write().await.insert(name.to_string(), collection.id);

        debug!(collection = name, dimensions, "ensured chroma collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let id = self.resolve(collection).await?;
        let url = format!("{}/{id}/upsert", self.collections_url());
        let _: serde_json::Value = self.post(&url, &UpsertRequest::from_entries(entries)).await?;

        debug!(collection, count = entries.len(), "upserted entries to chroma");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let id = self.resolve(collection).await?;
        let url = format!("{}/{id}/delete", self.collections_url());
        let _: serde_json::Value = self.post(&url, &json!({ "ids": ids })).await?;

        debug!(collection, count = ids.len(), "deleted entries from chroma");
        Ok(())
    }

    async fn ids(&self, collection: &str) -> Result<Vec<String>> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/{id}/get", self.collections_url());
        let response: GetResponse = self.post(&url, &json!({ "include": [] })).await?;
        Ok(response.ids)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/{id}/count", self.collections_url());
        let response = self.client.get(&url).send().await.map_err(Self::map_err)?;
        Self::decode(response).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/{id}/query", self.collections_url());
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "distances", "metadatas"],
        });
        let response: QueryResponse = self.post(&url, &body).await?;
        let results = response.into_results();

        debug!(collection, top_k, returned = results.len(), "queried chroma");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_maps_distance_to_score() {
        let raw = json!({
            "ids": [["a_0", "a_1"]],
            "documents": [["first", "second"]],
            "distances": [[0.25, 0.75]],
            "metadatas": [[{"source": "a", "sequence": "0"}, null]],
        });
        let response: QueryResponse = serde_json::from_value(raw).unwrap();
        let results = response.into_results();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.id, "a_0");
        assert_eq!(results[0].entry.text, "first");
        assert!((results[0].score - 0.75).abs() < 1e-6);
        assert_eq!(results[0].entry.metadata.get("source").map(String::as_str), Some("a"));
        assert!(results[1].entry.metadata.is_empty());
    }

    #[test]
    fn timeout_keeps_the_normalized_base_url() {
        let store = ChromaVectorStore::new("http://localhost:8000/")
            .unwrap()
            .with_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(store.collections_url(), "http://localhost:8000/api/v1/collections");
    }

    #[test]
    fn empty_query_response_yields_no_results() {
        let response: QueryResponse = serde_json::from_value(json!({"ids": [[]]})).unwrap();
        assert!(response.into_results().is_empty());
    }

    #[test]
    fn upsert_request_uses_parallel_arrays() {
        let entries = vec![IndexEntry {
            id: "s_0".into(),
            text: "hello".into(),
            embedding: vec![1.0, 0.0],
            metadata: HashMap::from([("source".to_string(), "s".to_string())]),
        }];
        let value = serde_json::to_value(UpsertRequest::from_entries(&entries)).unwrap();
        assert_eq!(
            value,
            json!({
                "ids": ["s_0"],
                "embeddings": [[1.0, 0.0]],
                "documents": ["hello"],
                "metadatas": [{"source": "s"}],
            })
        );
    }
}
