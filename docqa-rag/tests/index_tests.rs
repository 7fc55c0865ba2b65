//! Collection bootstrap and ingestion behaviour against mocked providers.

mod common;

use std::sync::Arc;

use common::{CountingStore, DIM, HashEmbedder};
use docqa_rag::{
    Document, ExtractOptions, InMemoryTableSource, IndexManager, RagConfig, RagError,
    SourceFilter, TableExtractor, TableRow, VectorStore,
};

fn config() -> RagConfig {
    RagConfig::builder().chunk_size(20).chunk_overlap(5).embed_batch_size(2).build().unwrap()
}

fn index_manager(store: &Arc<CountingStore>) -> IndexManager {
    IndexManager::new(&config(), Arc::new(HashEmbedder::new()), store.clone()).unwrap()
}

fn docs(n: usize) -> Vec<Document> {
    (0..n).map(|i| Document::new(format!("doc{i}"), format!("short text number {i}"))).collect()
}

#[tokio::test]
async fn bootstrap_creates_once_and_then_opens() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);

    let first = manager.bootstrap("documents").await.unwrap();
    let handle = manager.bootstrap("documents").await.unwrap();

    assert_eq!(first, handle);
    assert_eq!(handle.dimension(), DIM);
    assert_eq!(store.creates(), 1);
}

#[tokio::test]
async fn bootstrap_keeps_existing_records() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("documents").await.unwrap();
    manager.ingest_documents(&handle, &docs(3)).await.unwrap();

    manager.bootstrap("documents").await.unwrap();
    assert_eq!(store.describe("documents").await.unwrap().point_count, 3);
}

#[tokio::test]
async fn unreachable_store_during_check_falls_through_to_create() {
    let store = Arc::new(CountingStore::unreachable_on_exists());
    let manager = index_manager(&store);

    let handle = manager.bootstrap("documents").await.unwrap();
    assert_eq!(handle.name(), "documents");
    assert_eq!(store.creates(), 1);
}

#[tokio::test]
async fn empty_input_writes_nothing() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("documents").await.unwrap();

    let err = manager.ingest_documents(&handle, &[]).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput(_)));
    assert_eq!(store.upserts(), 0);
}

#[tokio::test]
async fn documents_without_text_are_empty_input() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("documents").await.unwrap();

    let blank = [Document::new("a", ""), Document::new("b", "")];
    let err = manager.ingest_documents(&handle, &blank).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput(_)));
    assert!(!err.is_retryable());
    assert_eq!(store.upserts(), 0);
}

#[tokio::test]
async fn existing_collection_with_other_dimension_is_refused() {
    let store = Arc::new(CountingStore::new());
    store.create_collection("documents", DIM - 1).await.unwrap();
    let manager = index_manager(&store);

    let err = manager.bootstrap("documents").await.unwrap_err();
    assert!(matches!(
        err,
        RagError::DimensionMismatch { expected, actual, .. } if expected == DIM - 1 && actual == DIM
    ));
    assert_eq!(store.creates(), 1);
    assert_eq!(store.upserts(), 0);
}

#[tokio::test]
async fn filtered_out_rows_are_empty_input() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("faq").await.unwrap();
    let source = TableExtractor::new(InMemoryTableSource::new(
        "faq",
        vec![TableRow::new(1i64, [("question", "q"), ("answer", "a")])],
    ));
    let options = ExtractOptions::default().filter(SourceFilter::rows(|_| false));

    let err = manager.ingest(&handle, &source, &options).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyInput(_)));
    assert_eq!(store.upserts(), 0);
}

#[tokio::test]
async fn wrong_embedding_dimension_aborts_before_writing() {
    let store = Arc::new(CountingStore::new());
    let embedder = Arc::new(HashEmbedder::new().with_output_dimensions(DIM - 1));
    let manager = IndexManager::new(&config(), embedder, store.clone()).unwrap();
    let handle = manager.bootstrap("documents").await.unwrap();

    let err = manager.ingest_documents(&handle, &docs(1)).await.unwrap_err();
    match err {
        RagError::IngestAborted { records_written, source } => {
            assert_eq!(records_written, 0);
            assert!(matches!(
                *source,
                RagError::DimensionMismatch { expected, actual, .. }
                    if expected == DIM && actual == DIM - 1
            ));
        }
        other => panic!("expected IngestAborted, got {other:?}"),
    }
    assert_eq!(store.upserts(), 0);
}

#[tokio::test]
async fn provider_failure_mid_run_reports_committed_records() {
    let store = Arc::new(CountingStore::new());
    let embedder = Arc::new(HashEmbedder::new().failing_after_batches(1));
    let manager = IndexManager::new(&config(), embedder, store.clone()).unwrap();
    let handle = manager.bootstrap("documents").await.unwrap();

    // Five single-chunk documents at two chunks per batch: the first batch lands.
    let err = manager.ingest_documents(&handle, &docs(5)).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, RagError::IngestAborted { records_written: 2, .. }));
    assert!(matches!(err.root(), RagError::ProviderUnavailable { .. }));
    assert_eq!(store.describe("documents").await.unwrap().point_count, 2);
}

#[tokio::test]
async fn reingesting_a_document_replaces_its_records() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("documents").await.unwrap();
    let doc = [Document::new("sky", "The sky is blue. Water is wet.")];

    let first = manager.ingest_documents(&handle, &doc).await.unwrap();
    let second = manager.ingest_documents(&handle, &doc).await.unwrap();

    assert_eq!(first.chunk_count, 2);
    assert_eq!(second.record_count, 2);
    assert_eq!(store.describe("documents").await.unwrap().point_count, 2);
}

#[tokio::test]
async fn table_rows_become_documents_with_row_metadata() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("faq").await.unwrap();
    let source = TableExtractor::new(InMemoryTableSource::new(
        "faq",
        vec![
            TableRow::new(1i64, [("question", "Opening hours?"), ("answer", "Nine to five.")]),
            TableRow::new(2i64, [("question", "Parking?"), ("answer", "Behind the building.")]),
        ],
    ));

    let report = manager.ingest(&handle, &source, &ExtractOptions::default()).await.unwrap();
    assert_eq!(report.document_count, 2);
    assert_eq!(report.record_count, report.chunk_count);

    let hits = store.search("faq", &vec![1.0; DIM], 10).await.unwrap();
    assert!(hits.iter().all(|h| h.payload.metadata["source"].as_str() == Some("database")));
    assert!(hits.iter().any(|h| h.payload.document_id == "faq_2"));
}

#[tokio::test]
async fn dropped_collection_is_gone() {
    let store = Arc::new(CountingStore::new());
    let manager = index_manager(&store);
    let handle = manager.bootstrap("documents").await.unwrap();
    manager.ingest_documents(&handle, &docs(2)).await.unwrap();

    manager.drop_collection(&handle).await.unwrap();
    assert!(!store.collection_exists("documents").await.unwrap());
}
