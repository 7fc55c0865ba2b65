//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{ScoredRecord, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionStats, CollectionStatus, VectorStore, rank_order};

const BACKEND: &str = "in-memory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    records: HashMap<String, VectorRecord>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as nested `HashMap`s: collection name → record ID → record.
/// Equal scores are ordered by ascending record id.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn missing(collection: &str) -> RagError {
    RagError::CollectionNotFound(collection.to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, records: HashMap::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        // Validate the whole batch first so a bad record never leaves it half-applied.
        if let Some(bad) = records.iter().find(|r| r.vector.len() != store.dimensions) {
            return Err(RagError::DimensionMismatch {
                context: format!("record {} in collection '{collection}'", bad.id),
                expected: store.dimensions,
                actual: bad.vector.len(),
            });
        }
        for record in records {
            store.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        if embedding.len() != store.dimensions {
            return Err(RagError::DimensionMismatch {
                context: format!("search in collection '{collection}'"),
                expected: store.dimensions,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<ScoredRecord> = store
            .records
            .values()
            .map(|record| ScoredRecord {
                id: record.id.clone(),
                payload: record.payload.clone(),
                score: cosine_similarity(&record.vector, embedding),
            })
            .collect();

        scored.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn describe(&self, collection: &str) -> Result<CollectionStats> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        let count = store.records.len() as u64;
        Ok(CollectionStats {
            vector_count: count,
            point_count: count,
            status: CollectionStatus::Green,
            dimension: Some(store.dimensions),
        })
    }
}
