//! Deterministic mock providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_rag::{
    ChatTurn, CollectionStats, EmbeddingProvider, GenerativeProvider, InMemoryVectorStore,
    QueryEngine, RagConfig, RagError, Result, ScoredRecord, VectorRecord, VectorStore,
};

pub const DIM: usize = 256;

/// Bag-of-words embedder: each lowercase word is hashed into one of `DIM`
/// buckets and the counts are L2-normalized. Texts sharing words score higher.
pub struct HashEmbedder {
    dimensions: usize,
    output_dimensions: usize,
    fail_after_batches: Option<usize>,
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dimensions: DIM,
            output_dimensions: DIM,
            fail_after_batches: None,
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Report `DIM` but produce vectors of `actual` length.
    pub fn with_output_dimensions(mut self, actual: usize) -> Self {
        self.output_dimensions = actual;
        self
    }

    /// Succeed for the first `n` batches, then fail as unreachable.
    pub fn failing_after_batches(mut self, n: usize) -> Self {
        self.fail_after_batches = Some(n);
        self
    }

    pub fn calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.output_dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.output_dimensions;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes()
        .fold(0xcbf2_9ce4_8422_2325, |hash, b| (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3))
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let done = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after_batches.is_some_and(|n| done >= n) {
            return Err(RagError::ProviderUnavailable {
                provider: "hash".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Echoes the question found in the prompt, so answers can be traced back to
/// the request that produced them.
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: AtomicUsize,
}

impl EchoGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeProvider for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str, _history: &[ChatTurn]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Query: "))
            .unwrap_or_default();
        Ok(format!("echo: {question}"))
    }
}

/// Wraps an [`InMemoryVectorStore`] with call counters and fault injection.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryVectorStore,
    pub unreachable_on_exists: AtomicBool,
    pub exists_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub upsert_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable_on_exists() -> Self {
        let store = Self::default();
        store.unreachable_on_exists.store(true, Ordering::SeqCst);
        store
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable_on_exists.load(Ordering::SeqCst) {
            return Err(RagError::ProviderUnavailable {
                provider: "counting".to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.inner.collection_exists(name).await
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(collection, records).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(collection, embedding, top_k).await
    }

    async fn describe(&self, collection: &str) -> Result<CollectionStats> {
        self.inner.describe(collection).await
    }
}

/// A fully mocked engine and handles to its providers.
pub struct Harness {
    pub engine: QueryEngine,
    pub embedder: Arc<HashEmbedder>,
    pub generator: Arc<EchoGenerator>,
    pub store: Arc<CountingStore>,
}

pub async fn harness(config: RagConfig) -> Harness {
    let embedder = Arc::new(HashEmbedder::new());
    let generator = Arc::new(EchoGenerator::default());
    let store = Arc::new(CountingStore::new());
    let engine = QueryEngine::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .generative_provider(generator.clone())
        .vector_store(store.clone())
        .build()
        .await
        .unwrap();
    Harness { engine, embedder, generator, store }
}
