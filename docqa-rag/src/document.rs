//! Data types for documents, chunks, vector records and search results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key-value metadata attached to documents, chunks and stored records.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A metadata value: either text or a number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// An integer, such as a row id or chunk index.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// Free text, such as a file name.
    Text(String),
}

impl MetadataValue {
    /// Return the value as a string slice if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as an integer if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A source document containing raw text and metadata.
///
/// Produced by an [`Extractor`](crate::extract::Extractor) and consumed by
/// the chunker during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The raw text content of the document.
    pub text: String,
    /// Metadata describing where the document came from.
    pub metadata: Metadata,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new(), source_uri: None }
    }

    /// Add a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A window of a [`Document`]'s text sized for embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `{document_id}_{chunk_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The chunk text.
    pub text: String,
    /// The leading part of `text` shared with the previous chunk. Empty for
    /// the first chunk of a document.
    pub overlap_text: String,
    /// Document metadata plus `chunk_index` and `chunk_offset`.
    pub metadata: Metadata,
}

impl Chunk {
    /// The position of this chunk within its document.
    pub fn index(&self) -> Option<i64> {
        self.metadata.get("chunk_index").and_then(MetadataValue::as_i64)
    }
}

/// The payload persisted alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordPayload {
    /// The chunk id the record was built from.
    pub chunk_id: String,
    /// The ID of the source document.
    pub document_id: String,
    /// The chunk text, needed later for synthesis and attribution.
    pub text: String,
    /// The chunk metadata.
    pub metadata: Metadata,
}

/// The unit persisted in a vector store collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Unique identifier within the collection.
    pub id: String,
    /// The embedding. Its length equals the collection dimension.
    pub vector: Vec<f32>,
    /// Chunk text and metadata.
    pub payload: RecordPayload,
}

impl VectorRecord {
    /// Build a record from a chunk and its embedding, keyed by [`record_id`].
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: record_id(&chunk.id),
            vector,
            payload: RecordPayload {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                text: chunk.text,
                metadata: chunk.metadata,
            },
        }
    }
}

/// Namespace for record ids, so that the same chunk id always maps to the same record.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_4c1e_9a53_0d8e_71b2_c4f5);

/// Derive the stable record id for a chunk id.
///
/// Re-ingesting a document therefore overwrites its records instead of
/// duplicating them.
pub fn record_id(chunk_id: &str) -> String {
    Uuid::new_v5(&RECORD_NAMESPACE, chunk_id.as_bytes()).to_string()
}

/// A vector store search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// The record id.
    pub id: String,
    /// The stored payload.
    pub payload: RecordPayload,
    /// The similarity score reported by the store (higher is more relevant).
    pub score: f32,
}

/// A chunk returned by the [`Retriever`](crate::retriever::Retriever).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// The record id.
    pub id: String,
    /// The source document id.
    pub document_id: String,
    /// The chunk text.
    pub text: String,
    /// The chunk metadata.
    pub metadata: Metadata,
    /// Relevance in `[0, 1]`.
    pub score: f32,
}
