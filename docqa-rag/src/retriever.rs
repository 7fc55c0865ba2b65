//! Question → ranked chunks.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::RetrievedChunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::CollectionHandle;
use crate::vectorstore::{VectorStore, rank_order};

/// Embeds a question with the ingestion embedder and runs a top-k similarity
/// search against the collection.
///
/// Results are ordered by descending relevance, ties broken by ascending
/// record id, whatever order the store returned them in. Relevance is the
/// store's similarity score clamped into `[0, 1]`.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: CollectionHandle,
}

impl Retriever {
    /// Create a retriever over an opened collection.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: CollectionHandle,
    ) -> Self {
        Self { embedder, store, collection }
    }

    /// The collection searched by this retriever.
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Return at most `top_k` chunks relevant to `question`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if `top_k` is zero.
    /// - [`RagError::DimensionMismatch`] if the question embedding does not
    ///   match the collection dimension.
    /// - Provider errors from embedding or search, unchanged.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(RagError::validation("top_k", "must be at least 1"));
        }

        let query_embedding = self.embedder.embed(question).await.map_err(|e| {
            error!(provider = self.embedder.name(), error = %e, "embedding failed during query");
            e
        })?;
        if query_embedding.len() != self.collection.dimension() {
            return Err(RagError::DimensionMismatch {
                context: "question embedding".to_string(),
                expected: self.collection.dimension(),
                actual: query_embedding.len(),
            });
        }

        let hits = self
            .store
            .search(self.collection.name(), &query_embedding, top_k)
            .await
            .map_err(|e| {
                error!(
                    collection = self.collection.name(),
                    error = %e,
                    "vector store search failed"
                );
                e
            })?;

        let mut results: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                id: hit.id,
                document_id: hit.payload.document_id,
                text: hit.payload.text,
                metadata: hit.payload.metadata,
                score: if hit.score.is_nan() { 0.0 } else { hit.score.clamp(0.0, 1.0) },
            })
            .collect();
        results.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
        results.truncate(top_k);

        debug!(
            collection = self.collection.name(),
            top_k,
            result_count = results.len(),
            "retrieved"
        );
        Ok(results)
    }
}
