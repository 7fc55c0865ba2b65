//! Error types for the `docqa-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while indexing or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration, detected before any I/O happens.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An embedding, generation or vector store backend could not be reached
    /// or rejected the request. Retryable by the caller.
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// The provider that failed.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A provider call exceeded its configured timeout. Never retried internally.
    #[error("Provider timed out ({provider}) after {timeout:?}")]
    ProviderTimeout {
        /// The provider that timed out.
        provider: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A provider answered, but the response broke its contract
    /// (e.g. fewer embeddings than inputs).
    #[error("Malformed response ({provider}): {message}")]
    MalformedResponse {
        /// The provider that produced the response.
        provider: String,
        /// What was wrong with it.
        message: String,
    },

    /// A backend refused the request as invalid. Sending it again fails the
    /// same way, so this is never retryable.
    #[error("Request rejected ({provider}): {message}")]
    Rejected {
        /// The backend that refused the request.
        provider: String,
        /// The backend's explanation.
        message: String,
    },

    /// A vector's length disagrees with the collection's fixed dimension.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Where the mismatch was detected (chunk id, query, collection).
        context: String,
        /// The collection's dimension.
        expected: usize,
        /// The dimension actually observed.
        actual: usize,
    },

    /// An ingestion run had nothing to ingest.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A caller-supplied argument was rejected.
    #[error("Validation error on '{field}': {message}")]
    Validation {
        /// The offending field or argument.
        field: String,
        /// Why it was rejected.
        message: String,
    },

    /// The generative model returned an error or an empty answer.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generative provider.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The named collection does not exist in the vector store.
    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// A document source could not be read.
    #[error("Extraction error ({source_name}): {message}")]
    Extraction {
        /// The file path or table the failure relates to.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// An ingestion run stopped part-way. `records_written` records were
    /// committed to the vector store before `source` occurred.
    #[error("Ingestion aborted after {records_written} records: {source}")]
    IngestAborted {
        /// Records upserted before the failure.
        records_written: usize,
        /// The failure that stopped the run.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable { .. } | Self::ProviderTimeout { .. } => true,
            Self::IngestAborted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The innermost error, looking through [`RagError::IngestAborted`].
    pub fn root(&self) -> &RagError {
        match self {
            Self::IngestAborted { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation { field: field.to_string(), message: message.into() }
    }

    #[cfg(any(feature = "ollama", feature = "qdrant", feature = "postgres"))]
    pub(crate) fn unavailable(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
