//! Generative model provider trait and chat history types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The author of a [`ChatTurn`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// A message from the person asking questions.
    User,
    /// A previous answer from the model.
    Assistant,
}

/// One prior message in a multi-turn conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    /// Who wrote the message.
    pub role: ChatRole,
    /// The message text.
    pub content: String,
}

impl ChatTurn {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A black-box text generation backend.
///
/// Implementations own their timeout and temperature settings. A timeout must
/// surface as [`RagError::ProviderTimeout`](crate::RagError::ProviderTimeout)
/// and is never retried by the implementation.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`, optionally preceded by prior turns.
    ///
    /// Returns the generated text verbatim.
    async fn generate(&self, prompt: &str, history: &[ChatTurn]) -> Result<String>;
}
