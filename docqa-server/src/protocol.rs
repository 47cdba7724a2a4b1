//! JSON request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub content: String,
    pub source: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    /// Number of chunks written for the source.
    pub document_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Defaults to the pipeline's configured `n_results`.
    #[serde(default)]
    pub n_results: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub success: bool,
    pub removed_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
    pub success: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub embeddings: String,
    pub llm: String,
    pub vector_store: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
    pub components: ComponentStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when the collection answers, `degraded` otherwise.
    pub status: String,
    pub embedding_dimension: usize,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Machine-readable error kind, e.g. `empty_content`.
    pub error: String,
    pub message: String,
}
