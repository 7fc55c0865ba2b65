//! Configuration for the indexing and query pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters shared by the index manager, retriever and synthesizer.
///
/// Built once at startup and passed by reference into each component. Construct
/// it via [`RagConfig::builder()`] so that the sizing rules are checked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the single collection this deployment serves.
    pub collection_name: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Minimum number of chunks retrieved per question, regardless of how many
    /// sources the caller asks to see.
    pub min_retrieval_width: usize,
    /// Number of chunks sent to the embedding provider per request during ingestion.
    pub embed_batch_size: usize,
    /// Maximum number of context characters handed to the generative model.
    pub context_budget_chars: usize,
    /// Length of the excerpt shown for each source.
    pub excerpt_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            min_retrieval_width: 5,
            embed_batch_size: 32,
            context_budget_chars: 12_000,
            excerpt_chars: 200,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check the invariants enforced by [`RagConfigBuilder::build`].
    ///
    /// Useful for configs obtained through deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.collection_name.trim().is_empty() {
            return Err(RagError::Config("collection_name must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap == 0 {
            return Err(RagError::Config("chunk_overlap must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_retrieval_width == 0 {
            return Err(RagError::Config(
                "min_retrieval_width must be greater than zero".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        if self.context_budget_chars == 0 {
            return Err(RagError::Config(
                "context_budget_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the minimum number of chunks retrieved per question.
    pub fn min_retrieval_width(mut self, width: usize) -> Self {
        self.config.min_retrieval_width = width;
        self
    }

    /// Set the embedding batch size used during ingestion.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the context budget, in characters, for answer synthesis.
    pub fn context_budget_chars(mut self, budget: usize) -> Self {
        self.config.context_budget_chars = budget;
        self
    }

    /// Set the source excerpt length in characters.
    pub fn excerpt_chars(mut self, chars: usize) -> Self {
        self.config.excerpt_chars = chars;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `min_retrieval_width`, `embed_batch_size` or `context_budget_chars` is zero
    /// - `collection_name` is blank
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
