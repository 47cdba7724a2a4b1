//! End-to-end tests for ingestion and retrieval over the in-memory store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::{
    CapabilityTimeouts, Document, DocumentTextExtractor, EmbeddingProvider, GenerationProvider,
    InMemoryVectorStore, IndexEntry, NO_DOCUMENTS_ANSWER, RagConfig, RagError, RagPipeline, Result,
    StaleChunkPolicy, WebTextExtractor,
};

const DIM: usize = 8;

/// Hashes each word into one of `DIM` buckets, so texts sharing words are close.
#[derive(Default)]
struct KeywordEmbedder {
    fail_batch: AtomicBool,
    fail_single: AtomicBool,
    batch_calls: AtomicUsize,
}

fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    for word in text.split_whitespace() {
        let bucket = word.bytes().map(usize::from).sum::<usize>() % DIM;
        vector[bucket] += 1.0;
    }
    vector[DIM - 1] += 0.01;
    vector
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_single.load(Ordering::SeqCst) {
            return Err(RagError::upstream("keyword", "single embedding unavailable"));
        }
        Ok(keyword_vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(RagError::upstream("keyword", "batch embedding unavailable"));
        }
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::upstream("recording", "model offline"));
        }
        Ok("generated answer".to_string())
    }
}

struct Harness {
    pipeline: RagPipeline,
    embedder: Arc<KeywordEmbedder>,
    generator: Arc<RecordingGenerator>,
}

fn small_config() -> RagConfig {
    RagConfig::builder().chunk_size(100).chunk_overlap(20).build().unwrap()
}

async fn harness_with(config: RagConfig, generator: RecordingGenerator) -> Harness {
    let embedder = Arc::new(KeywordEmbedder::default());
    let generator = Arc::new(generator);
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .generation_provider(generator.clone())
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .model_tag("kw")
        .build()
        .await
        .unwrap();
    Harness { pipeline, embedder, generator }
}

async fn harness() -> Harness {
    harness_with(small_config(), RecordingGenerator::default()).await
}

const HANDBOOK: &str = "Employees receive twenty vacation days per year.\n\n\
Remote work is allowed on Fridays with manager approval.\n\n\
The office is closed on public holidays and the last week of December.";

#[tokio::test]
async fn collection_is_named_after_tag_and_probed_dimension() {
    let h = harness().await;
    assert_eq!(h.pipeline.embedding_dim(), DIM);
    assert_eq!(h.pipeline.collection_name(), "docs_kw_8d");
    assert_eq!(h.pipeline.count().await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_then_answer_uses_retrieved_context() {
    let h = harness().await;
    let report = h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    assert_eq!(report.chunk_count, 3);
    assert_eq!(h.pipeline.count().await.unwrap(), 3);

    let answer = h.pipeline.answer("How many vacation days per year?", 5).await.unwrap();
    assert_eq!(answer.answer_text, "generated answer");
    assert!(!answer.used_fallback);
    assert_eq!(answer.sources.len(), 3);
    assert!(answer.sources.iter().any(|s| s.contains("twenty vacation days")));

    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("How many vacation days per year?"));
    assert!(prompts[0].contains("twenty vacation days"));
}

#[tokio::test]
async fn sources_are_capped_even_when_more_chunks_are_retrieved() {
    let h = harness().await;
    let paragraphs: Vec<String> = (0..8)
        .map(|i| format!("Paragraph number {i} talks about topic {i} in considerable and careful detail."))
        .collect();
    let report = h.pipeline.ingest(&paragraphs.join("\n\n"), "topics.txt").await.unwrap();
    assert_eq!(report.chunk_count, 8);

    let answer = h.pipeline.answer("topic", 6).await.unwrap();
    assert_eq!(answer.sources.len(), 3);
    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts[0].matches("Paragraph number").count(), 6);
}

/// Every stored entry, ordered by id.
async fn stored_entries(h: &Harness) -> Vec<IndexEntry> {
    let index = h.pipeline.context().index();
    let mut entries: Vec<IndexEntry> = index
        .search(&keyword_vector("handbook"), 100)
        .await
        .unwrap()
        .into_iter()
        .map(|result| result.entry)
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}

#[tokio::test]
async fn reingesting_a_source_is_idempotent() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    let first = stored_entries(&h).await;
    assert_eq!(first.len(), 3);

    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    assert_eq!(stored_entries(&h).await, first);
    assert_eq!(h.pipeline.count().await.unwrap(), 3);

    h.pipeline.ingest(HANDBOOK, "copy.txt").await.unwrap();
    assert_eq!(h.pipeline.count().await.unwrap(), 6);
}

#[tokio::test]
async fn blank_content_is_rejected_without_writing() {
    let h = harness().await;
    let err = h.pipeline.ingest("  \n\n\t ", "blank.txt").await.unwrap_err();
    assert!(matches!(err, RagError::EmptyContent { ref source_id } if source_id == "blank.txt"));
    assert_eq!(h.pipeline.count().await.unwrap(), 0);
}

#[tokio::test]
async fn ingestion_embeds_all_chunks_in_one_call() {
    let h = harness().await;
    let before = h.embedder.batch_calls.load(Ordering::SeqCst);
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    assert_eq!(h.embedder.batch_calls.load(Ordering::SeqCst), before + 1);
}

#[tokio::test]
async fn failed_embedding_aborts_ingestion() {
    let h = harness().await;
    h.embedder.fail_batch.store(true, Ordering::SeqCst);
    let err = h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap_err();
    assert!(matches!(err, RagError::UpstreamFailure { .. }));
    assert_eq!(h.pipeline.count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_index_answers_without_calling_the_model() {
    let h = harness().await;
    let answer = h.pipeline.answer("Anything?", 5).await.unwrap();
    assert_eq!(answer.answer_text, NO_DOCUMENTS_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(!answer.used_fallback);
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unrelated_questions_still_get_the_nearest_sources() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    let answer = h.pipeline.answer("zebra xylophone", 2).await.unwrap();
    assert_eq!(answer.sources.len(), 2);
}

#[tokio::test]
async fn zero_results_is_a_configuration_error() {
    let h = harness().await;
    let err = h.pipeline.answer("q", 0).await.unwrap_err();
    assert!(matches!(err, RagError::ConfigurationError(_)));
}

#[tokio::test]
async fn batch_failure_falls_back_to_single_embedding() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    h.embedder.fail_batch.store(true, Ordering::SeqCst);

    let answer = h.pipeline.answer("Remote work on Fridays?", 5).await.unwrap();
    assert!(answer.used_fallback);
    assert_eq!(answer.answer_text, "generated answer");
    assert!(!answer.sources.is_empty());
}

#[tokio::test]
async fn both_embedding_shapes_failing_exhausts_the_fallback() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    h.embedder.fail_batch.store(true, Ordering::SeqCst);
    h.embedder.fail_single.store(true, Ordering::SeqCst);

    match h.pipeline.answer("Remote work?", 5).await {
        Err(RagError::ExhaustedFallback { primary, fallback }) => {
            assert!(primary.to_string().contains("batch embedding unavailable"));
            assert!(fallback.to_string().contains("single embedding unavailable"));
        }
        other => panic!("expected exhausted fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn generation_failure_is_retried_once_then_surfaced() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    h.generator.fail.store(true, Ordering::SeqCst);

    let err = h.pipeline.answer("Remote work?", 5).await.unwrap_err();
    assert!(matches!(err, RagError::ExhaustedFallback { .. }));
    assert_eq!(h.generator.prompts.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_generation_times_out() {
    let config = RagConfig::builder()
        .chunk_size(100)
        .chunk_overlap(20)
        .timeouts(CapabilityTimeouts {
            generation: Duration::from_millis(100),
            ..CapabilityTimeouts::default()
        })
        .build()
        .unwrap();
    let generator = RecordingGenerator { delay: Some(Duration::from_secs(10)), ..Default::default() };
    let h = harness_with(config, generator).await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();

    match h.pipeline.answer("Remote work?", 5).await {
        Err(RagError::ExhaustedFallback { primary, .. }) => {
            assert!(primary.to_string().contains("timed out"), "{primary}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn clear_reports_removed_entries() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();

    assert_eq!(h.pipeline.clear().await.unwrap().removed_count, 3);
    assert_eq!(h.pipeline.count().await.unwrap(), 0);
    assert_eq!(h.pipeline.clear().await.unwrap().removed_count, 0);

    let answer = h.pipeline.answer("vacation", 5).await.unwrap();
    assert_eq!(answer.answer_text, NO_DOCUMENTS_ANSWER);
}

#[tokio::test]
async fn shorter_reingest_retains_stale_chunks_by_default() {
    let h = harness().await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    let report = h.pipeline.ingest("Now just one line.", "handbook.txt").await.unwrap();

    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.pruned_count, 0);
    assert_eq!(h.pipeline.count().await.unwrap(), 3);
}

#[tokio::test]
async fn prune_policy_removes_stale_chunks_of_that_source_only() {
    let config = RagConfig::builder()
        .chunk_size(100)
        .chunk_overlap(20)
        .stale_chunks(StaleChunkPolicy::Prune)
        .build()
        .unwrap();
    let h = harness_with(config, RecordingGenerator::default()).await;
    h.pipeline.ingest(HANDBOOK, "handbook.txt").await.unwrap();
    h.pipeline.ingest(HANDBOOK, "handbook.txt_v2").await.unwrap();

    let report = h.pipeline.ingest("Now just one line.", "handbook.txt").await.unwrap();
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.pruned_count, 2);
    assert_eq!(h.pipeline.count().await.unwrap(), 4);
}

#[tokio::test]
async fn pages_share_one_chunk_sequence() {
    let h = harness().await;
    let pages = vec![
        Document::new("Page one talks about onboarding.", "guide.pdf"),
        Document::new("   ", "guide.pdf"),
        Document::new("Page three covers the expense policy.", "guide.pdf"),
    ];
    let report = h.pipeline.ingest_pages(&pages, "guide.pdf").await.unwrap();
    assert_eq!(report.chunk_count, 2);

    let mut ids = h.pipeline.context().index().ids().await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["guide.pdf_0", "guide.pdf_1"]);
}

struct PagedExtractor;

#[async_trait]
impl DocumentTextExtractor for PagedExtractor {
    async fn extract(&self, bytes: &[u8], source_id: &str) -> Result<Vec<Document>> {
        let text = String::from_utf8_lossy(bytes);
        Ok(text.split('\x0c').map(|page| Document::new(page, source_id)).collect())
    }
}

struct StaticPage;

#[async_trait]
impl WebTextExtractor for StaticPage {
    async fn fetch(&self, url: &str) -> Result<Document> {
        Ok(Document::new("Support hours are nine to five on weekdays.", url))
    }
}

#[tokio::test]
async fn extracted_documents_and_pages_are_ingested() {
    let h = harness().await;
    let report = h
        .pipeline
        .ingest_bytes(&PagedExtractor, b"first page text\x0csecond page text", "scan.pdf")
        .await
        .unwrap();
    assert_eq!(report.chunk_count, 2);

    let report = h.pipeline.ingest_url(&StaticPage, "https://example.com/support").await.unwrap();
    assert_eq!(report.chunk_count, 1);

    let ids = h.pipeline.context().index().ids().await.unwrap();
    assert!(ids.contains(&"https://example.com/support_0".to_string()));
    assert_eq!(h.pipeline.count().await.unwrap(), 3);
}

#[tokio::test]
async fn builder_requires_every_capability() {
    let result = RagPipeline::builder()
        .embedding_provider(Arc::new(KeywordEmbedder::default()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .await;
    assert!(matches!(result, Err(RagError::ConfigurationError(_))));
}

#[tokio::test]
async fn explicit_dimension_skips_the_probe() {
    let embedder = Arc::new(KeywordEmbedder::default());
    embedder.fail_single.store(true, Ordering::SeqCst);
    embedder.fail_batch.store(true, Ordering::SeqCst);

    let pipeline = RagPipeline::builder()
        .embedding_provider(embedder)
        .generation_provider(Arc::new(RecordingGenerator::default()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .embedding_dim(DIM)
        .build()
        .await
        .unwrap();
    assert_eq!(pipeline.collection_name(), "docs_keyword_8d");
}

#[tokio::test]
async fn invalid_chunk_sizing_fails_the_build() {
    let mut config = small_config();
    config.chunk_overlap = config.chunk_size;
    let result = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(KeywordEmbedder::default()))
        .generation_provider(Arc::new(RecordingGenerator::default()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .await;
    assert!(matches!(result, Err(RagError::ConfigurationError(_))));
}
