//! Grounded answer synthesis.
//!
//! The [`Synthesizer`] packs retrieved chunks into a single prompt, within a
//! character budget, and makes exactly one call to the generative provider.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::RetrievedChunk;
use crate::error::{RagError, Result};
use crate::generation::{ChatTurn, GenerativeProvider};

const CONTEXT_SEPARATOR: &str = "\n\n";

/// The generated answer and the chunks that were placed in its prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// The model output, verbatim.
    pub answer: String,
    /// Chunks included in the context, in the order given.
    pub used: Vec<RetrievedChunk>,
}

/// Turns a question plus retrieved context into an answer.
pub struct Synthesizer {
    generator: Arc<dyn GenerativeProvider>,
    context_budget_chars: usize,
}

impl Synthesizer {
    /// Create a synthesizer that spends at most `context_budget_chars`
    /// characters of prompt on retrieved context.
    pub fn new(generator: Arc<dyn GenerativeProvider>, context_budget_chars: usize) -> Self {
        Self { generator, context_budget_chars }
    }

    /// Generate an answer to `question` grounded in `chunks`.
    ///
    /// `chunks` are expected in descending relevance order. Chunks are added
    /// whole, in order, until the next one would exceed the budget; if even
    /// the first chunk is too large it is cut to fit.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Generation`] if the model returns blank text, and
    /// propagates provider errors such as
    /// [`RagError::ProviderTimeout`] unchanged. There is no fallback answer.
    pub async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        history: &[ChatTurn],
    ) -> Result<Synthesis> {
        let (context, used) = self.pack_context(chunks);
        let prompt = build_prompt(question, &context);
        debug!(
            provider = self.generator.name(),
            context_chunks = used.len(),
            prompt_chars = prompt.chars().count(),
            history_turns = history.len(),
            "generating answer"
        );

        let answer = self.generator.generate(&prompt, history).await.map_err(|e| {
            error!(provider = self.generator.name(), error = %e, "generation failed");
            e
        })?;
        if answer.trim().is_empty() {
            error!(provider = self.generator.name(), "generation returned an empty answer");
            return Err(RagError::Generation {
                provider: self.generator.name().to_string(),
                message: "model returned an empty response".to_string(),
            });
        }

        Ok(Synthesis { answer, used })
    }

    fn pack_context(&self, chunks: &[RetrievedChunk]) -> (String, Vec<RetrievedChunk>) {
        let mut context = String::new();
        let mut used_chars = 0;
        let mut used = Vec::new();

        for chunk in chunks {
            let separator = if used.is_empty() { 0 } else { CONTEXT_SEPARATOR.len() };
            let len = chunk.text.chars().count();
            if used_chars + separator + len <= self.context_budget_chars {
                if separator > 0 {
                    context.push_str(CONTEXT_SEPARATOR);
                }
                context.push_str(&chunk.text);
                used_chars += separator + len;
                used.push(chunk.clone());
            } else {
                if used.is_empty() {
                    context.extend(chunk.text.chars().take(self.context_budget_chars));
                    used.push(chunk.clone());
                }
                break;
            }
        }
        (context, used)
    }
}

fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn chunk(id: &str, text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            text: text.to_string(),
            metadata: Metadata::new(),
            score,
        }
    }

    struct Fixed(&'static str);

    #[async_trait::async_trait]
    impl GenerativeProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str, _history: &[ChatTurn]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn packing_keeps_highest_ranked_chunks_within_budget() {
        let synth = Synthesizer::new(Arc::new(Fixed("ok")), 12);
        let chunks = [chunk("a", "aaaaa", 0.9), chunk("b", "bbbbb", 0.8), chunk("c", "c", 0.1)];
        let (context, used) = synth.pack_context(&chunks);
        assert_eq!(context, "aaaaa\n\nbbbbb");
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn oversized_first_chunk_is_truncated() {
        let synth = Synthesizer::new(Arc::new(Fixed("ok")), 3);
        let (context, used) = synth.pack_context(&[chunk("a", "abcdef", 0.9)]);
        assert_eq!(context, "abc");
        assert_eq!(used.len(), 1);
    }

    #[tokio::test]
    async fn blank_answer_is_a_generation_error() {
        let synth = Synthesizer::new(Arc::new(Fixed("  \n")), 100);
        let err = synth.synthesize("q", &[chunk("a", "ctx", 0.5)], &[]).await.unwrap_err();
        assert!(matches!(err, RagError::Generation { .. }));
    }

    #[tokio::test]
    async fn answer_is_returned_verbatim() {
        let synth = Synthesizer::new(Arc::new(Fixed(" Blue. ")), 100);
        let out = synth.synthesize("q", &[chunk("a", "ctx", 0.5)], &[]).await.unwrap();
        assert_eq!(out.answer, " Blue. ");
        assert_eq!(out.used.len(), 1);
    }
}
