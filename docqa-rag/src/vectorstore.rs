//! Vector store trait for storing and searching vector embeddings.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{ScoredRecord, VectorRecord};
use crate::error::Result;

/// Health of a collection as reported by the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Fully operational.
    Green,
    /// Operational, optimizations running.
    Yellow,
    /// Operational, optimizations pending.
    Grey,
    /// The collection is in an error state.
    Red,
    /// The store did not report a status.
    Unknown,
}

impl CollectionStatus {
    /// Whether the status indicates a failed collection.
    pub fn is_error(self) -> bool {
        matches!(self, Self::Red)
    }
}

/// Aggregate counters for a collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    /// Number of stored vectors.
    pub vector_count: u64,
    /// Number of stored points (records).
    pub point_count: u64,
    /// Collection health.
    pub status: CollectionStatus,
    /// The vector dimension fixed at creation, when the store reports a single one.
    pub dimension: Option<usize>,
}

/// Ranking used for search results: descending score, then ascending id.
pub(crate) fn rank_order(a_score: f32, a_id: &str, b_score: f32, b_id: &str) -> Ordering {
    b_score.partial_cmp(&a_score).unwrap_or(Ordering::Equal).then_with(|| a_id.cmp(b_id))
}

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`VectorRecord`]s whose vectors
/// all share one dimension, fixed at creation. Implementations must be safe
/// for concurrent use.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// if !store.collection_exists("docs").await? {
///     store.create_collection("docs", 384).await?;
/// }
/// store.upsert("docs", &records).await?;
/// let hits = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create a named collection for vectors of `dimensions` length.
    /// No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its records.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace records by id.
    ///
    /// Returns [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// if a vector's length differs from the collection's dimension.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    /// Search for the `top_k` most similar records to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Report the collection's counters, health and vector dimension.
    async fn describe(&self, collection: &str) -> Result<CollectionStats>;
}
