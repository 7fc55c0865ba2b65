//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::qdrant::{QdrantConfig, QdrantVectorStore};
//!
//! let store = QdrantVectorStore::new(&QdrantConfig::default())?;
//! store.create_collection("docs", 384).await?;
//! store.upsert("docs", &records).await?;
//! let results = store.search("docs", &query_embedding, 5).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CollectionInfo, CollectionStatus as QdrantStatus, CreateCollectionBuilder, Distance,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::{Metadata, MetadataValue, RecordPayload, ScoredRecord, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionStats, CollectionStatus, VectorStore};

const BACKEND: &str = "qdrant";

/// The default Qdrant gRPC address.
pub const DEFAULT_URL: &str = "http://localhost:6334";

/// Connection settings for [`QdrantVectorStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// gRPC endpoint.
    pub url: String,
    /// Deadline for each store call.
    pub timeout: Duration,
    /// API key for secured deployments.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self { url: DEFAULT_URL.to_string(), timeout: Duration::from_secs(30), api_key: None }
    }
}

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Collections use cosine distance. The record payload (`chunk_id`,
/// `document_id`, `text`, `metadata`) is stored as Qdrant payload, and every
/// call is bounded by the configured timeout.
pub struct QdrantVectorStore {
    client: Qdrant,
    timeout: Duration,
}

impl QdrantVectorStore {
    /// Create a store for the configured endpoint. No connection is made yet.
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        if config.timeout.is_zero() {
            return Err(RagError::Config("qdrant timeout must be greater than zero".to_string()));
        }
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("invalid qdrant configuration: {e}")))?;
        Ok(Self { client, timeout: config.timeout })
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Await `call`, mapping client errors and the deadline to [`RagError`]s.
    async fn call<T>(
        &self,
        operation: &str,
        collection: &str,
        call: impl Future<Output = std::result::Result<T, QdrantError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = match &e {
                    QdrantError::ResponseError { status }
                    | QdrantError::ResourceExhaustedError { status, .. } => classify(
                        operation,
                        collection,
                        status.code() as i32,
                        status.message(),
                        self.timeout,
                    ),
                    other => RagError::unavailable(BACKEND, format!("{operation} failed: {other}")),
                };
                error!(
                    backend = BACKEND,
                    operation,
                    collection,
                    error = %err,
                    "qdrant call failed"
                );
                Err(err)
            }
            Err(_) => {
                error!(
                    backend = BACKEND,
                    operation,
                    collection,
                    timeout = ?self.timeout,
                    "qdrant call timed out"
                );
                Err(RagError::ProviderTimeout {
                    provider: BACKEND.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }

    fn to_point(record: &VectorRecord) -> Result<PointStruct> {
        let json = serde_json::to_value(&record.payload)
            .map_err(|e| malformed_payload(&record.id, e))?;
        let payload = Payload::try_from(json).map_err(|e| malformed_payload(&record.id, e))?;
        Ok(PointStruct::new(record.id.clone(), record.vector.clone(), payload))
    }
}

// gRPC status codes returned by Qdrant.
const CODE_DEADLINE_EXCEEDED: i32 = 4;
const CODE_NOT_FOUND: i32 = 5;
const CODE_RESOURCE_EXHAUSTED: i32 = 8;
const CODE_ABORTED: i32 = 10;
const CODE_UNAVAILABLE: i32 = 14;

/// Map a gRPC status to an error. Only overload, outage and deadline
/// statuses are transient; everything else is a rejection of the request.
fn classify(
    operation: &str,
    collection: &str,
    code: i32,
    message: &str,
    timeout: Duration,
) -> RagError {
    match code {
        CODE_NOT_FOUND => RagError::CollectionNotFound(collection.to_string()),
        CODE_DEADLINE_EXCEEDED => {
            RagError::ProviderTimeout { provider: BACKEND.to_string(), timeout }
        }
        CODE_UNAVAILABLE | CODE_RESOURCE_EXHAUSTED | CODE_ABORTED => {
            RagError::unavailable(BACKEND, format!("{operation} failed: {message}"))
        }
        _ => RagError::Rejected {
            provider: BACKEND.to_string(),
            message: format!("{operation} on '{collection}' failed: {message}"),
        },
    }
}

/// The dimension of the collection's single unnamed vector, if it has one.
fn stored_dimension(info: &CollectionInfo) -> Option<usize> {
    let vectors = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;
    match vectors.config.as_ref()? {
        VectorsConfigKind::Params(params) => usize::try_from(params.size).ok(),
        VectorsConfigKind::ParamsMap(_) => None,
    }
}

fn malformed_payload(id: &str, e: impl std::fmt::Display) -> RagError {
    RagError::MalformedResponse {
        provider: BACKEND.to_string(),
        message: format!("could not encode payload of record {id}: {e}"),
    }
}

fn extract_string(value: &QdrantValue) -> Option<String> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn extract_metadata_value(value: &QdrantValue) -> Option<MetadataValue> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(MetadataValue::Text(s.clone())),
        Some(Kind::IntegerValue(n)) => Some(MetadataValue::Integer(*n)),
        Some(Kind::DoubleValue(x)) => Some(MetadataValue::Float(*x)),
        _ => None,
    }
}

fn extract_metadata(value: &QdrantValue) -> Metadata {
    match &value.kind {
        Some(Kind::StructValue(s)) => s
            .fields
            .iter()
            .filter_map(|(k, v)| extract_metadata_value(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => Metadata::new(),
    }
}

fn map_status(status: i32) -> CollectionStatus {
    match QdrantStatus::try_from(status) {
        Ok(QdrantStatus::Green) => CollectionStatus::Green,
        Ok(QdrantStatus::Yellow) => CollectionStatus::Yellow,
        Ok(QdrantStatus::Grey) => CollectionStatus::Grey,
        Ok(QdrantStatus::Red) => CollectionStatus::Red,
        _ => CollectionStatus::Unknown,
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.call("collection_exists", name, self.client.collection_exists(name)).await
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if matches!(self.collection_exists(name).await, Ok(true)) {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        let request = CreateCollectionBuilder::new(name)
            .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine));
        match self.call("create_collection", name, self.client.create_collection(request)).await {
            Ok(_) => {}
            // Lost a race with another creator.
            Err(RagError::Rejected { message, .. }) if message.contains("already exists") => {
                debug!(collection = name, "qdrant collection created concurrently");
            }
            Err(e) => return Err(e),
        }

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        match self.call("delete_collection", name, self.client.delete_collection(name)).await {
            Ok(_) => debug!(collection = name, "deleted qdrant collection"),
            Err(RagError::CollectionNotFound(_)) => {
                debug!(collection = name, "qdrant collection already absent");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records.iter().map(Self::to_point).collect::<Result<Vec<_>>>()?;
        self.call(
            "upsert_points",
            collection,
            self.client.upsert_points(UpsertPointsBuilder::new(collection, points).wait(true)),
        )
        .await?;

        debug!(collection, count = records.len(), "upserted records to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let request = SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
            .with_payload(true);
        let response =
            self.call("search_points", collection, self.client.search_points(request)).await?;

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .id
                    .as_ref()
                    .and_then(|pid| match &pid.point_id_options {
                        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                        None => None,
                    })
                    .unwrap_or_default();
                let field = |key: &str| scored.payload.get(key).and_then(extract_string);

                ScoredRecord {
                    payload: RecordPayload {
                        chunk_id: field("chunk_id").unwrap_or_else(|| id.clone()),
                        document_id: field("document_id").unwrap_or_default(),
                        text: field("text").unwrap_or_default(),
                        metadata: scored
                            .payload
                            .get("metadata")
                            .map(extract_metadata)
                            .unwrap_or_default(),
                    },
                    id,
                    score: scored.score,
                }
            })
            .collect::<Vec<_>>();

        debug!(collection, top_k, result_count = results.len(), "qdrant search");
        Ok(results)
    }

    async fn describe(&self, collection: &str) -> Result<CollectionStats> {
        let info_call = self.client.collection_info(collection);
        let response = self.call("collection_info", collection, info_call).await?;
        let info = response.result.ok_or_else(|| RagError::MalformedResponse {
            provider: BACKEND.to_string(),
            message: format!("no info returned for collection '{collection}'"),
        })?;
        Ok(CollectionStats {
            vector_count: info.vectors_count.unwrap_or_default(),
            point_count: info.points_count.unwrap_or_default(),
            status: map_status(info.status),
            dimension: stored_dimension(&info),
        })
    }
}
