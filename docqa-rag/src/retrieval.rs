//! Read path: embed the question, retrieve, and synthesize a grounded answer.
//!
//! [`RetrievalOrchestrator::answer`] makes at most two attempts. The primary
//! attempt embeds the question through the bulk call shape, the same one
//! ingestion uses, so query and chunk vectors come from the same code path.
//! If anything in that attempt fails (embedding, search, or generation), a
//! single fallback attempt repeats the whole sequence with the single-text
//! call shape. There is no third attempt.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::CapabilityTimeouts;
use crate::context::RagContext;
use crate::document::Answer;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result, bounded};
use crate::generation::GenerationProvider;
use crate::index::IndexStore;

/// Answer returned when the index holds nothing to retrieve.
pub const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found for your question.";

/// Sentence the model is told to emit when the context is insufficient.
pub const REFUSAL: &str =
    "The provided context doesn't contain enough information to answer this question.";

const ANSWER_TEMPLATE: &str = "\
You are an intelligent assistant that answers questions based on provided context from documents. Your role is to:

1. **Analyze the provided context carefully** and extract relevant information to answer the user's question
2. **Answer based ONLY on the information provided** in the context - do not use external knowledge
3. **Be accurate and precise** - if the context doesn't contain enough information to answer the question, clearly state this
4. **Quote directly from the context** when appropriate, using quotation marks
5. **Maintain the same tone and style** as the source material when possible

## Instructions:
- If the answer is clearly stated in the context, provide a direct answer
- If the context contains partial information, explain what you can determine and what is unclear
- If the context doesn't contain relevant information, respond with: \"{refusal}\"
- Always be honest about the limitations of the provided context

## Context:
{context}

## Question:
{question}

## Answer:
";

/// Format the fixed instruction template for `context` and `question`.
pub fn render_prompt(context: &str, question: &str) -> String {
    // Context goes in last so braces inside documents are never re-expanded.
    ANSWER_TEMPLATE
        .replacen("{refusal}", REFUSAL, 1)
        .replacen("{question}", question, 1)
        .replacen("{context}", context, 1)
}

/// Join retrieved chunk texts, nearest first, into one context string.
pub fn assemble_context(chunks: &[String]) -> String {
    chunks.join("\n\n")
}

/// Which embedding call shape an attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingStrategy {
    /// `embed_batch` with a one-element input.
    Batch,
    /// `embed` with the bare question.
    Single,
}

/// Answers questions from the index.
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    index: Arc<IndexStore>,
    source_limit: usize,
    timeouts: CapabilityTimeouts,
}

impl RetrievalOrchestrator {
    /// Build an orchestrator over the context's handles.
    pub fn new(context: &RagContext) -> Self {
        Self {
            embedder: Arc::clone(context.embedder()),
            generator: Arc::clone(context.generator()),
            index: Arc::clone(context.index()),
            source_limit: context.config().source_limit,
            timeouts: context.config().timeouts,
        }
    }

    /// Answer `question` from the `n_results` nearest chunks.
    ///
    /// An empty index is a successful outcome carrying
    /// [`NO_DOCUMENTS_ANSWER`] and no sources.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`] if `n_results == 0`, and
    /// [`RagError::ExhaustedFallback`] if both attempts fail.
    pub async fn answer(&self, question: &str, n_results: usize) -> Result<Answer> {
        if n_results == 0 {
            return Err(RagError::ConfigurationError(
                "n_results must be greater than zero".to_string(),
            ));
        }

        let primary = match self.attempt(question, n_results, EmbeddingStrategy::Batch).await {
            Ok(answer) => return Ok(answer),
            Err(e) => e,
        };
        warn!(error = %primary, "primary retrieval failed, trying single-query embedding");

        match self.attempt(question, n_results, EmbeddingStrategy::Single).await {
            Ok(answer) => {
                info!(sources = answer.sources.len(), "answered with fallback embedding");
                Ok(Answer { used_fallback: true, ..answer })
            }
            Err(fallback) => {
                error!(primary = %primary, fallback = %fallback, "fallback retrieval failed");
                Err(RagError::ExhaustedFallback {
                    primary: Box::new(primary),
                    fallback: Box::new(fallback),
                })
            }
        }
    }

    async fn attempt(
        &self,
        question: &str,
        n_results: usize,
        strategy: EmbeddingStrategy,
    ) -> Result<Answer> {
        let vector = self.embed_question(question, strategy).await?;
        let chunks = self.index.query(&vector, n_results).await?;
        debug!(?strategy, retrieved = chunks.len(), "retrieved chunks");

        if chunks.is_empty() {
            return Ok(Answer {
                answer_text: NO_DOCUMENTS_ANSWER.to_string(),
                sources: Vec::new(),
                used_fallback: false,
            });
        }

        let prompt = render_prompt(&assemble_context(&chunks), question);
        let generation = self.generator.generate(&prompt);
        let answer_text =
            bounded(self.generator.name(), self.timeouts.generation, generation).await?;

        let sources = chunks.into_iter().take(self.source_limit).collect();
        info!(?strategy, n_results, "answered question");
        Ok(Answer { answer_text, sources, used_fallback: false })
    }

    async fn embed_question(
        &self,
        question: &str,
        strategy: EmbeddingStrategy,
    ) -> Result<Vec<f32>> {
        let name = self.embedder.name();
        let limit = self.timeouts.embedding;
        let batch = [question];
        match strategy {
            EmbeddingStrategy::Batch => bounded(name, limit, self.embedder.embed_batch(&batch))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| RagError::upstream(name, "batch embedding returned no vector")),
            EmbeddingStrategy::Single => bounded(name, limit, self.embedder.embed(question)).await,
        }
    }
}
