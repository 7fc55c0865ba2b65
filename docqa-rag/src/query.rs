//! The query façade: the single entry point used by API layers.
//!
//! [`QueryEngine`] bootstraps the deployment's collection on construction and
//! then serves concurrent questions, ingestion runs and stats lookups.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{InMemoryVectorStore, QueryEngine, RagConfig};
//!
//! let engine = QueryEngine::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .generative_provider(Arc::new(generator))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()
//!     .await?;
//!
//! let result = engine.answer("What color is the sky?", 3, &[]).await?;
//! println!("{} ({:.2}s)", result.answer, result.elapsed_seconds);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RagConfig;
use crate::document::{Document, Metadata, RetrievedChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{ExtractOptions, Extractor};
use crate::generation::{ChatTurn, GenerativeProvider};
use crate::index::{CollectionHandle, IndexManager, IngestReport};
use crate::retriever::Retriever;
use crate::synthesizer::Synthesizer;
use crate::vectorstore::{CollectionStatus, VectorStore};

/// A chunk surfaced to the caller as evidence for an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAttribution {
    /// The beginning of the chunk text.
    pub excerpt: String,
    /// Relevance in `[0, 1]`.
    pub score: f32,
    /// The chunk metadata.
    pub metadata: Metadata,
}

/// The answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// The generated answer.
    pub answer: String,
    /// Supporting chunks, most relevant first.
    pub sources: Vec<SourceAttribution>,
    /// Wall-clock time spent answering.
    pub elapsed_seconds: f64,
}

/// Best-effort collection statistics. When the lookup fails, the counters
/// are absent and `error` explains why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionStatsReport {
    /// The collection name.
    pub collection_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CollectionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Combines the [`Retriever`] and [`Synthesizer`] behind one entry point.
///
/// Safe to share across tasks (`Arc<QueryEngine>`); each question is handled
/// independently and the only shared mutable state is the query counter.
pub struct QueryEngine {
    config: RagConfig,
    index: IndexManager,
    collection: CollectionHandle,
    retriever: Retriever,
    synthesizer: Synthesizer,
    query_count: AtomicU64,
}

impl QueryEngine {
    /// Create a new [`QueryEngineBuilder`].
    pub fn builder() -> QueryEngineBuilder {
        QueryEngineBuilder::default()
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The collection this engine serves.
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// The index manager, for lifecycle operations such as dropping the collection.
    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    /// Number of questions accepted so far. Advisory only.
    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Answer `question`, surfacing at most `max_sources` sources.
    ///
    /// Retrieval fetches `max(max_sources, min_retrieval_width)` chunks so the
    /// model sees more context than is shown as sources.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] for a blank question, before any provider call.
    /// - Retrieval and generation errors, unchanged.
    pub async fn answer(
        &self,
        question: &str,
        max_sources: usize,
        history: &[ChatTurn],
    ) -> Result<QueryResult> {
        if question.trim().is_empty() {
            return Err(RagError::validation("question", "must not be blank"));
        }
        let started = Instant::now();
        self.query_count.fetch_add(1, Ordering::Relaxed);

        let top_k = max_sources.max(self.config.min_retrieval_width);
        let retrieved = self.retriever.retrieve(question, top_k).await?;
        let synthesis = self.synthesizer.synthesize(question, &retrieved, history).await?;

        let sources = synthesis
            .used
            .iter()
            .take(max_sources)
            .map(|chunk| self.attribute(chunk))
            .collect::<Vec<_>>();
        let elapsed_seconds = started.elapsed().as_secs_f64();

        info!(
            collection = self.collection.name(),
            retrieved = retrieved.len(),
            context_chunks = synthesis.used.len(),
            source_count = sources.len(),
            elapsed_ms = (elapsed_seconds * 1000.0) as u64,
            "answered question"
        );
        Ok(QueryResult { answer: synthesis.answer, sources, elapsed_seconds })
    }

    fn attribute(&self, chunk: &RetrievedChunk) -> SourceAttribution {
        SourceAttribution {
            excerpt: excerpt(&chunk.text, self.config.excerpt_chars),
            score: chunk.score,
            metadata: chunk.metadata.clone(),
        }
    }

    /// Report the collection's counters. Never fails: lookup errors are
    /// returned in [`CollectionStatsReport::error`].
    pub async fn collection_stats(&self) -> CollectionStatsReport {
        let collection_name = self.collection.name().to_string();
        match self.index.store().describe(&collection_name).await {
            Ok(stats) => CollectionStatsReport {
                collection_name,
                vector_count: Some(stats.vector_count),
                point_count: Some(stats.point_count),
                status: Some(stats.status),
                error: None,
            },
            Err(e) => {
                warn!(collection = %collection_name, error = %e, "could not get collection stats");
                CollectionStatsReport {
                    collection_name,
                    vector_count: None,
                    point_count: None,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Ingest documents from `source` into the served collection.
    pub async fn ingest(
        &self,
        source: &dyn Extractor,
        options: &ExtractOptions,
    ) -> Result<IngestReport> {
        self.index.ingest(&self.collection, source, options).await
    }

    /// Ingest already-extracted documents into the served collection.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestReport> {
        self.index.ingest_documents(&self.collection, documents).await
    }

    /// Delete the served collection and all of its records.
    ///
    /// The engine is unusable for queries afterwards until it is rebuilt.
    pub async fn drop_collection(&self) -> Result<()> {
        self.index.drop_collection(&self.collection).await
    }
}

/// The first `max_chars` characters of `text`, with `...` appended when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Builder for constructing a [`QueryEngine`].
///
/// All fields are required. [`build()`](QueryEngineBuilder::build) validates
/// the configuration and runs the collection bootstrap, so a built engine is
/// always ready to serve.
#[derive(Default)]
pub struct QueryEngineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generative_provider: Option<Arc<dyn GenerativeProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl QueryEngineBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for both ingestion and questions.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generative model provider.
    pub fn generative_provider(mut self, provider: Arc<dyn GenerativeProvider>) -> Self {
        self.generative_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Validate, bootstrap the collection, and build the [`QueryEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a field is missing or the configuration
    /// is invalid (checked before any I/O), or the bootstrap error.
    pub async fn build(self) -> Result<QueryEngine> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;
        let embedder = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let generator = self
            .generative_provider
            .ok_or_else(|| RagError::Config("generative_provider is required".to_string()))?;
        let store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;

        let index = IndexManager::new(&config, embedder.clone(), store.clone())?;
        let collection = index.bootstrap(&config.collection_name).await?;
        let retriever = Retriever::new(embedder, store, collection.clone());
        let synthesizer = Synthesizer::new(generator, config.context_budget_chars);

        Ok(QueryEngine {
            config,
            index,
            collection,
            retriever,
            synthesizer,
            query_count: AtomicU64::new(0),
        })
    }
}
