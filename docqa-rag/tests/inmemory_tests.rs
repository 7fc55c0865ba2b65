//! Property tests for in-memory vector store search ordering.

use std::collections::HashMap;

use docqa_rag::document::{Chunk, Metadata, VectorRecord};
use docqa_rag::inmemory::InMemoryVectorStore;
use docqa_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a record built from a chunk with a normalized embedding.
fn arb_record(dim: usize) -> impl Strategy<Value = VectorRecord> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(|(id, text, vector)| {
        let chunk = Chunk {
            id,
            document_id: "doc_1".to_string(),
            text,
            overlap_text: String::new(),
            metadata: Metadata::new(),
        };
        VectorRecord::from_chunk(chunk, vector)
    })
}

/// Search results are ordered by descending score, equal scores by ascending
/// id, and there are never more than `top_k` of them.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_and_bounded_by_top_k(
            records in proptest::collection::vec(arb_record(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();

                let mut deduped: HashMap<String, VectorRecord> = HashMap::new();
                for record in &records {
                    deduped.entry(record.id.clone()).or_insert_with(|| record.clone());
                }
                let unique: Vec<VectorRecord> = deduped.into_values().collect();
                let count = unique.len();

                store.upsert("test", &unique).await.unwrap();
                (store.search("test", &query, top_k).await.unwrap(), count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score > window[1].score
                        || (window[0].score == window[1].score && window[0].id < window[1].id),
                    "results out of order: ({}, {}) before ({}, {})",
                    window[0].score,
                    window[0].id,
                    window[1].score,
                    window[1].id,
                );
            }
        }

        #[test]
        fn upserting_the_same_chunk_twice_replaces_it(
            record in arb_record(DIM),
            replacement in arb_normalized_embedding(DIM),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let stats = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();
                store.upsert("test", std::slice::from_ref(&record)).await.unwrap();

                let mut again = record.clone();
                again.vector = replacement;
                store.upsert("test", &[again]).await.unwrap();
                store.describe("test").await.unwrap()
            });
            prop_assert_eq!(stats.point_count, 1);
        }
    }
}
