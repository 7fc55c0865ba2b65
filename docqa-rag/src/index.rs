//! Collection lifecycle and ingestion.
//!
//! The [`IndexManager`] owns the detect-or-create bootstrap of the deployment's
//! collection and the extract → chunk → embed → upsert ingestion workflow.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{ExtractOptions, FileExtractor, IndexManager};
//!
//! let manager = IndexManager::new(&config, embedder, store)?;
//! let handle = manager.bootstrap("documents").await?;
//! let report = manager
//!     .ingest(&handle, &FileExtractor::new("./data/docs"), &ExtractOptions::default())
//!     .await?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunking::FixedSizeChunker;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{ExtractOptions, Extractor};
use crate::vectorstore::VectorStore;

/// An opened collection: its name and the vector dimension it was opened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionHandle {
    name: String,
    dimension: usize,
}

impl CollectionHandle {
    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed vector dimension of the collection.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents produced by extraction.
    pub document_count: usize,
    /// Chunks produced by the chunker.
    pub chunk_count: usize,
    /// Records upserted into the vector store.
    pub record_count: usize,
}

/// Owns the collection lifecycle and the ingestion workflow.
pub struct IndexManager {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: FixedSizeChunker,
    embed_batch_size: usize,
}

impl IndexManager {
    /// Create a manager from validated configuration and providers.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the chunk sizing or batch size is invalid.
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?;
        if config.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        Ok(Self { embedder, store, chunker, embed_batch_size: config.embed_batch_size })
    }

    /// The vector store backing this manager.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Open `name` if it exists, otherwise create it empty.
    ///
    /// An existing collection is opened as-is: nothing is recreated or
    /// re-embedded, but its stored dimension must match the embedder's. If
    /// the store cannot be reached while checking for the collection, the
    /// collection is treated as absent and creation is attempted; stores
    /// treat creating an existing name as a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the existing collection was
    /// built for another dimension, or the store's error if creation fails.
    pub async fn bootstrap(&self, name: &str) -> Result<CollectionHandle> {
        let dimension = self.embedder.dimensions();
        let handle = CollectionHandle { name: name.to_string(), dimension };

        let exists = match self.store.collection_exists(name).await {
            Ok(exists) => exists,
            Err(e) if e.is_retryable() => {
                warn!(collection = name, error = %e, "could not check collection, assuming absent");
                false
            }
            Err(e) => return Err(e),
        };

        if exists {
            let handle = self.open_existing(handle).await?;
            info!(collection = name, dimension = handle.dimension, "loading existing collection");
            return Ok(handle);
        }

        self.store.create_collection(name, dimension).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            e
        })?;
        info!(collection = name, dimension, "created empty collection");
        Ok(handle)
    }

    /// Check the stored dimension of an existing collection against the embedder.
    async fn open_existing(&self, handle: CollectionHandle) -> Result<CollectionHandle> {
        match self.store.describe(&handle.name).await {
            Ok(stats) => match stats.dimension {
                Some(stored) if stored != handle.dimension => {
                    error!(
                        collection = handle.name(),
                        stored,
                        embedder = handle.dimension,
                        "collection was built with a different embedding dimension"
                    );
                    Err(RagError::DimensionMismatch {
                        context: format!(
                            "collection '{}' opened with embedder '{}'",
                            handle.name,
                            self.embedder.name()
                        ),
                        expected: stored,
                        actual: handle.dimension,
                    })
                }
                _ => Ok(handle),
            },
            Err(e) if e.is_retryable() => {
                warn!(
                    collection = handle.name(),
                    error = %e,
                    "could not read collection dimension"
                );
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the collection and every record in it.
    pub async fn drop_collection(&self, handle: &CollectionHandle) -> Result<()> {
        self.store.delete_collection(handle.name()).await.map_err(|e| {
            error!(collection = handle.name(), error = %e, "failed to delete collection");
            e
        })?;
        info!(collection = handle.name(), "dropped collection");
        Ok(())
    }

    /// Extract documents from `source` and ingest them.
    ///
    /// # Errors
    ///
    /// Extraction errors (including [`RagError::EmptyInput`]) are returned
    /// before any store write. See [`ingest_documents`](Self::ingest_documents)
    /// for failures after that point.
    pub async fn ingest(
        &self,
        handle: &CollectionHandle,
        source: &dyn Extractor,
        options: &ExtractOptions,
    ) -> Result<IngestReport> {
        info!(collection = handle.name(), source = %source.describe(), "starting ingestion");
        let documents = source.extract(options).await.map_err(|e| {
            error!(source = %source.describe(), error = %e, "extraction failed");
            e
        })?;
        self.ingest_documents(handle, &documents).await
    }

    /// Chunk, embed and upsert `documents`, batch by batch.
    ///
    /// No internal retries: the first failing batch stops the run.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyInput`] if `documents` is empty or yields no chunks;
    ///   nothing is written.
    /// - [`RagError::IngestAborted`] if embedding or upserting fails, carrying
    ///   the number of records already committed and the root cause (for
    ///   example [`RagError::DimensionMismatch`] when the provider returns a
    ///   vector of the wrong length).
    pub async fn ingest_documents(
        &self,
        handle: &CollectionHandle,
        documents: &[Document],
    ) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(RagError::EmptyInput("no documents supplied for ingestion".to_string()));
        }

        let started = Instant::now();
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunks(d)).collect();
        if chunks.is_empty() {
            return Err(RagError::EmptyInput(format!(
                "{} documents produced no chunks",
                documents.len()
            )));
        }
        let mut report = IngestReport {
            document_count: documents.len(),
            chunk_count: chunks.len(),
            record_count: 0,
        };
        info!(
            collection = handle.name(),
            document_count = report.document_count,
            chunk_count = report.chunk_count,
            "chunked documents"
        );

        for batch in chunks.chunks(self.embed_batch_size) {
            let written = self.ingest_batch(handle, batch).await.map_err(|e| {
                error!(
                    collection = handle.name(),
                    records_written = report.record_count,
                    error = %e,
                    "ingestion aborted"
                );
                RagError::IngestAborted {
                    records_written: report.record_count,
                    source: Box::new(e),
                }
            })?;
            report.record_count += written;
            debug!(
                collection = handle.name(),
                records_written = report.record_count,
                "batch stored"
            );
        }

        info!(
            collection = handle.name(),
            record_count = report.record_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingestion complete"
        );
        self.log_collection_totals(handle).await;
        Ok(report)
    }

    async fn ingest_batch(&self, handle: &CollectionHandle, batch: &[Chunk]) -> Result<usize> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(RagError::MalformedResponse {
                provider: self.embedder.name().to_string(),
                message: format!("expected {} embeddings, got {}", batch.len(), embeddings.len()),
            });
        }

        let mut records = Vec::with_capacity(batch.len());
        for (chunk, vector) in batch.iter().zip(embeddings) {
            if vector.len() != handle.dimension {
                return Err(RagError::DimensionMismatch {
                    context: format!("embedding of chunk '{}'", chunk.id),
                    expected: handle.dimension,
                    actual: vector.len(),
                });
            }
            records.push(VectorRecord::from_chunk(chunk.clone(), vector));
        }

        self.store.upsert(handle.name(), &records).await?;
        Ok(records.len())
    }

    async fn log_collection_totals(&self, handle: &CollectionHandle) {
        match self.store.describe(handle.name()).await {
            Ok(stats) => info!(
                collection = handle.name(),
                vector_count = stats.vector_count,
                point_count = stats.point_count,
                "collection totals"
            ),
            Err(e) => warn!(collection = handle.name(), error = %e, "could not retrieve stats"),
        }
    }
}
