use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use docqa_rag::{
    EmbeddingProvider, GenerationProvider, InMemoryVectorStore, RagError, RagPipeline,
    VectorStore,
    chroma::ChromaVectorStore,
    ollama::{OllamaEmbeddingProvider, OllamaGenerator},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub use crate::config::ServerConfig;
use crate::protocol::{
    ClearResponse, ComponentStatus, CountResponse, ErrorResponse, HealthResponse, IngestRequest,
    IngestResponse, QueryRequest, QueryResponse, RootResponse,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub components: ComponentStatus,
}

impl AppState {
    pub fn new(pipeline: RagPipeline, components: ComponentStatus) -> Self {
        Self { pipeline: Arc::new(pipeline), components }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .route("/clear", delete(clear))
        .route("/documents/count", get(document_count))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Connect to Ollama and the configured store, probe the embedding
/// dimension, and make sure the collection exists.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        OllamaEmbeddingProvider::new(&config.ollama_url)?
            .with_model(&config.embed_model)
            .with_timeout(config.timeouts.embedding)?,
    );
    let generator: Arc<dyn GenerationProvider> = Arc::new(
        OllamaGenerator::new(&config.ollama_url)?
            .with_model(&config.llm_model)
            .with_temperature(config.temperature)
            .with_timeout(config.timeouts.generation)?,
    );
    let store: Arc<dyn VectorStore> = match &config.chroma_url {
        Some(url) => Arc::new(ChromaVectorStore::new(url)?.with_timeout(config.timeouts.store)?),
        None => {
            warn!("DOCQA_CHROMA_URL not set, chunks are kept in memory only");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    let components = ComponentStatus {
        embeddings: config.embed_model.clone(),
        llm: config.llm_model.clone(),
        vector_store: store.backend().to_string(),
    };

    let pipeline = RagPipeline::builder()
        .config(config.rag_config()?)
        .embedding_provider(embedder)
        .generation_provider(generator)
        .vector_store(store)
        .model_tag(&config.embed_tag)
        .build()
        .await
        .context("failed to initialize components; is Ollama running with the models pulled?")?;

    Ok(AppState::new(pipeline, components))
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// A [`RagError`] rendered as a JSON error body with a matching status code.
pub struct ApiError(RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            RagError::ConfigurationError(_) => (StatusCode::BAD_REQUEST, "configuration_error"),
            RagError::EmptyContent { .. } => (StatusCode::BAD_REQUEST, "empty_content"),
            RagError::DimensionMismatch { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "dimension_mismatch")
            }
            RagError::NotInitialized(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_initialized"),
            RagError::UpstreamFailure { .. } => (StatusCode::BAD_GATEWAY, "upstream_failure"),
            RagError::ExhaustedFallback { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "exhausted_fallback")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            error!(error = %self.0, %status, "request failed");
        }
        let body =
            ErrorResponse { success: false, error: kind.to_string(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(RootResponse {
        message: "docqa document question answering API".to_string(),
        status: "running".to_string(),
        components: state.components,
    })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    let (status, document_count) = match pipeline.count().await {
        Ok(count) => ("healthy", Some(count)),
        Err(e) => {
            warn!(error = %e, "health check could not count documents");
            ("degraded", None)
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        embedding_dimension: pipeline.embedding_dim(),
        collection: pipeline.collection_name().to_string(),
        document_count,
    })
}

async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if request.source.trim().is_empty() {
        return Err(RagError::ConfigurationError("source must not be empty".to_string()).into());
    }

    let report = state.pipeline.ingest(&request.content, &request.source).await?;
    Ok(Json(IngestResponse {
        success: true,
        message: format!("Successfully processed {}", request.source),
        document_count: report.chunk_count,
    }))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let n_results = request.n_results.unwrap_or(state.pipeline.config().n_results);
    let answer = state.pipeline.answer(&request.question, n_results).await?;

    let message = if answer.sources.is_empty() {
        Some("No matching documents".to_string())
    } else if answer.used_fallback {
        Some("Used fallback query method".to_string())
    } else {
        None
    };
    Ok(Json(QueryResponse {
        answer: answer.answer_text,
        sources: answer.sources,
        success: true,
        message,
    }))
}

async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let report = state.pipeline.clear().await?;
    let message = match report.removed_count {
        0 => "Database was already empty".to_string(),
        n => format!("Cleared {n} documents"),
    };
    Ok(Json(ClearResponse { message, success: true, removed_count: report.removed_count }))
}

async fn document_count(State(state): State<AppState>) -> Result<Json<CountResponse>, ApiError> {
    let count = state.pipeline.count().await?;
    Ok(Json(CountResponse { count, success: true }))
}
