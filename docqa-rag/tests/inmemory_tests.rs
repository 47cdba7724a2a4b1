//! Property tests for in-memory vector store search ordering.

use std::collections::HashMap;

use docqa_rag::document::IndexEntry;
use docqa_rag::inmemory::InMemoryVectorStore;
use docqa_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an index entry with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = IndexEntry> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| IndexEntry {
            id: format!("doc_{id}"),
            text,
            embedding,
            metadata: HashMap::from([("source".to_string(), "doc".to_string())]),
        },
    )
}

/// Searching returns results ordered by descending cosine similarity, never
/// more than `top_k`, and every stored entry when fewer than `top_k` exist.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("docs_test_16d", DIM).await.unwrap();

                // Upserting a repeated id overwrites, so count distinct ids.
                let mut deduped: HashMap<String, IndexEntry> = HashMap::new();
                for entry in &entries {
                    deduped.entry(entry.id.clone()).or_insert_with(|| entry.clone());
                }
                let unique: Vec<IndexEntry> = deduped.into_values().collect();
                let count = unique.len();

                store.upsert("docs_test_16d", &unique).await.unwrap();
                let results = store.search("docs_test_16d", &query, top_k).await.unwrap();
                (results, count)
            });

            let (results, unique_count) = results;

            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn upserting_the_same_ids_twice_keeps_the_count(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (first, second) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("c", DIM).await.unwrap();
                store.upsert("c", &entries).await.unwrap();
                let first = store.count("c").await.unwrap();
                store.upsert("c", &entries).await.unwrap();
                (first, store.count("c").await.unwrap())
            });
            prop_assert_eq!(first, second);
        }
    }
}
