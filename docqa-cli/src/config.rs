//! Settings loaded from the process environment.

use std::str::FromStr;
use std::time::Duration;

use docqa_rag::ollama::OllamaConfig;
use docqa_rag::qdrant::QdrantConfig;
use docqa_rag::{RagConfig, RagError, Result};

/// Everything the binary needs to build a query engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rag: RagConfig,
    pub ollama: OllamaConfig,
    pub qdrant: QdrantConfig,
    pub database_url: Option<String>,
}

impl Settings {
    /// Read settings from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset keys.
    ///
    /// Unparseable values are [`RagError::Config`] errors naming the variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = RagConfig::default();

        let mut rag = RagConfig::builder()
            .chunk_size(parse(&var, "CHUNK_SIZE")?.unwrap_or(defaults.chunk_size))
            .chunk_overlap(parse(&var, "CHUNK_OVERLAP")?.unwrap_or(defaults.chunk_overlap))
            .min_retrieval_width(
                parse(&var, "DOCQA_RETRIEVAL_WIDTH")?.unwrap_or(defaults.min_retrieval_width),
            )
            .context_budget_chars(
                parse(&var, "DOCQA_CONTEXT_BUDGET")?.unwrap_or(defaults.context_budget_chars),
            );
        if let Some(name) = var("DOCQA_COLLECTION").or_else(|| var("QDRANT_COLLECTION")) {
            rag = rag.collection_name(name);
        }

        let ollama_defaults = OllamaConfig::default();
        let model = var("OLLAMA_MODEL").unwrap_or(ollama_defaults.model);
        let ollama = OllamaConfig {
            base_url: var("OLLAMA_BASE_URL").unwrap_or(ollama_defaults.base_url),
            embedding_model: var("OLLAMA_EMBED_MODEL").unwrap_or_else(|| model.clone()),
            model,
            embedding_dimensions: parse(&var, "OLLAMA_EMBED_DIMENSIONS")?,
            temperature: parse(&var, "OLLAMA_TEMPERATURE")?.unwrap_or(ollama_defaults.temperature),
            timeout: parse(&var, "OLLAMA_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(ollama_defaults.timeout),
        };

        let qdrant_defaults = QdrantConfig::default();
        let qdrant = QdrantConfig {
            url: var("QDRANT_URL").unwrap_or(qdrant_defaults.url),
            timeout: parse(&var, "QDRANT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(qdrant_defaults.timeout),
            api_key: var("QDRANT_API_KEY"),
        };

        Ok(Self { rag: rag.build()?, ollama, qdrant, database_url: var("DATABASE_URL") })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| RagError::Config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.rag, RagConfig::default());
        assert_eq!(s.ollama, OllamaConfig::default());
        assert_eq!(s.qdrant, QdrantConfig::default());
        assert!(s.database_url.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let s = settings(&[
            ("QDRANT_COLLECTION", "faq"),
            ("CHUNK_SIZE", "256"),
            ("CHUNK_OVERLAP", "32"),
            ("OLLAMA_MODEL", "mistral"),
            ("OLLAMA_EMBED_DIMENSIONS", "768"),
            ("QDRANT_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(s.rag.collection_name, "faq");
        assert_eq!(s.rag.chunk_size, 256);
        assert_eq!(s.ollama.embedding_model, "mistral");
        assert_eq!(s.ollama.embedding_dimensions, Some(768));
        assert_eq!(s.qdrant.timeout, Duration::from_secs(5));
    }

    #[test]
    fn docqa_collection_wins_over_alias() {
        let s = settings(&[("DOCQA_COLLECTION", "a"), ("QDRANT_COLLECTION", "b")]).unwrap();
        assert_eq!(s.rag.collection_name, "a");
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let err = settings(&[("CHUNK_SIZE", "big")]).unwrap_err();
        assert!(matches!(err, RagError::Config(msg) if msg.contains("CHUNK_SIZE")));
    }

    #[test]
    fn invalid_sizing_is_rejected() {
        let err = settings(&[("CHUNK_SIZE", "10"), ("CHUNK_OVERLAP", "10")]).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
