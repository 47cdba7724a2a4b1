//! Ollama embedding and generation clients.
//!
//! This module is only available when the `ollama` feature is enabled.
//!
//! Ollama exposes both embedding call shapes the pipeline relies on:
//! `/api/embeddings` takes one `prompt`, and `/api/embed` takes an `input`
//! array. Generation goes through `/api/generate` with streaming disabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

/// The default local Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "mxbai-embed-large";

/// The default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "llama3";

const DEFAULT_TEMPERATURE: f32 = 0.7;

fn build_client(timeout: Option<Duration>, service: &str) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| RagError::upstream(service, format!("failed to build client: {e}")))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// POST `body` as JSON and decode the response, mapping every failure to
/// [`RagError::UpstreamFailure`] for `service`.
async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B, service: &str) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client.post(url).json(body).send().await.map_err(|e| {
        error!(service, error = %e, "request failed");
        RagError::upstream(service, format!("request failed: {e}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

        error!(service, %status, "API error");
        return Err(RagError::upstream(service, format!("API returned {status}: {detail}")));
    }

    response.json().await.map_err(|e| {
        error!(service, error = %e, "failed to parse response");
        RagError::upstream(service, format!("failed to parse response: {e}"))
    })
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434")?
///     .with_model("nomic-embed-text");
/// let vectors = provider.embed_batch(&["hello world"]).await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the server at `base_url` with the default model.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(None, "ollama-embed")?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
        })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every HTTP request at the transport level.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(Some(timeout), "ollama-embed")?;
        Ok(self)
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct SingleEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct SingleEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct BatchEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct BatchEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        "ollama-embed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "ollama", model = %self.model, text_len = text.len(), "embedding single text");

        let url = format!("{}/api/embeddings", self.base_url);
        let request = SingleEmbeddingRequest { model: &self.model, prompt: text };
        let response: SingleEmbeddingResponse =
            post_json(&self.client, &url, &request, self.name()).await?;

        if response.embedding.is_empty() {
            return Err(RagError::upstream(self.name(), "API returned an empty embedding"));
        }
        Ok(response.embedding)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = "ollama", model = %self.model, batch_size = texts.len(), "embedding batch");

        let url = format!("{}/api/embed", self.base_url);
        let request = BatchEmbeddingRequest { model: &self.model, input: texts };
        let response: BatchEmbeddingResponse =
            post_json(&self.client, &url, &request, self.name()).await?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::upstream(
                self.name(),
                format!(
                    "API returned {} embeddings for {} inputs",
                    response.embeddings.len(),
                    texts.len()
                ),
            ));
        }
        Ok(response.embeddings)
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`GenerationProvider`] backed by Ollama's `/api/generate`.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    /// Create a generator for the server at `base_url` with the default model.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(None, "ollama-generate")?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_GENERATION_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Bound every HTTP request at the transport level.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(Some(timeout), "ollama-generate")?;
        Ok(self)
    }
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama-generate"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = "ollama", model = %self.model, prompt_len = prompt.len(), "generating");

        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };
        let response: GenerateResponse =
            post_json(&self.client, &url, &request, self.name()).await?;
        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_serialize_to_the_ollama_wire_format() {
        let batch = BatchEmbeddingRequest { model: "m", input: &["a", "b"] };
        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            serde_json::json!({"model": "m", "input": ["a", "b"]})
        );

        let generate = GenerateRequest {
            model: "llama3",
            prompt: "p",
            stream: false,
            options: GenerateOptions { temperature: 0.5 },
        };
        assert_eq!(
            serde_json::to_value(&generate).unwrap(),
            serde_json::json!({
                "model": "llama3",
                "prompt": "p",
                "stream": false,
                "options": {"temperature": 0.5}
            })
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = OllamaEmbeddingProvider::new("http://host:11434/").unwrap();
        assert_eq!(provider.base_url, "http://host:11434");
        assert_eq!(provider.model(), DEFAULT_EMBEDDING_MODEL);
    }
}
