//! Indexing and retrieval-augmented question answering over a private
//! document corpus.
//!
//! This crate provides:
//! - Document extraction from database tables and directory trees
//! - Fixed-size, overlapping character chunking
//! - Idempotent collection bootstrap and batched ingestion
//! - Top-k retrieval and single-call grounded answer synthesis
//! - A query façade with source attribution and collection stats
//!
//! External services sit behind three traits: [`EmbeddingProvider`],
//! [`GenerativeProvider`] and [`VectorStore`]. The `ollama` and `qdrant`
//! features enable the production backends; [`InMemoryVectorStore`] is always
//! available.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{ExtractOptions, FileExtractor, InMemoryVectorStore, QueryEngine, RagConfig};
//!
//! let engine = QueryEngine::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder)
//!     .generative_provider(generator)
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()
//!     .await?;
//!
//! engine.ingest(&FileExtractor::new("./docs"), &ExtractOptions::default()).await?;
//! let result = engine.answer("How do I reset my password?", 3, &[]).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod query;
pub mod retriever;
pub mod synthesizer;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{FixedSizeChunker, TextWindow};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, Document, Metadata, MetadataValue, RecordPayload, RetrievedChunk, ScoredRecord,
    VectorRecord, record_id,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
#[cfg(feature = "postgres")]
pub use extract::PostgresTableSource;
pub use extract::{
    DEFAULT_TEXT_FIELDS, ExtractOptions, Extractor, FileExtractor, InMemoryTableSource,
    SourceFilter, SourceItem, TableExtractor, TableRow, TableSource,
};
pub use generation::{ChatRole, ChatTurn, GenerativeProvider};
pub use index::{CollectionHandle, IndexManager, IngestReport};
pub use inmemory::InMemoryVectorStore;
pub use query::{
    CollectionStatsReport, QueryEngine, QueryEngineBuilder, QueryResult, SourceAttribution,
};
pub use retriever::Retriever;
pub use synthesizer::{Synthesis, Synthesizer};
pub use vectorstore::{CollectionStats, CollectionStatus, VectorStore};
