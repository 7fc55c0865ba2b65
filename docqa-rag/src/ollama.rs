//! Ollama embedding and generative providers.
//!
//! This module is only available when the `ollama` feature is enabled. Both
//! providers talk to a local or remote Ollama server over its HTTP API using
//! `reqwest`.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::ollama::{OllamaConfig, OllamaEmbeddingProvider, OllamaGenerativeProvider};
//!
//! let config = OllamaConfig::default();
//! let embedder = OllamaEmbeddingProvider::from_config(&config).await?;
//! let generator = OllamaGenerativeProvider::new(&config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{ChatRole, ChatTurn, GenerativeProvider};

const PROVIDER: &str = "ollama";

/// The default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default chat model.
pub const DEFAULT_MODEL: &str = "llama3";

/// Text embedded to learn a model's output dimension.
const DIMENSION_SAMPLE: &str = "dimension sample";

/// Connection and model settings shared by both Ollama providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server base URL, without a trailing `/api`.
    pub base_url: String,
    /// Model used for chat completions.
    pub model: String,
    /// Model used for embeddings. Defaults to `model`.
    pub embedding_model: String,
    /// Embedding dimension. Detected from the server when `None`.
    pub embedding_dimensions: Option<usize>,
    /// Sampling temperature for generation.
    pub temperature: f32,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_MODEL.to_string(),
            embedding_dimensions: None,
            temperature: 0.1,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OllamaConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url.trim_end_matches('/'))
    }

    fn client(&self) -> Result<reqwest::Client> {
        if self.base_url.trim().is_empty() {
            return Err(RagError::Config("ollama base_url must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(RagError::Config("ollama timeout must be greater than zero".to_string()));
        }
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))
    }
}

fn map_send_err(e: reqwest::Error, timeout: Duration) -> RagError {
    if e.is_timeout() {
        error!(provider = PROVIDER, ?timeout, "request timed out");
        RagError::ProviderTimeout { provider: PROVIDER.to_string(), timeout }
    } else {
        error!(provider = PROVIDER, error = %e, "request failed");
        RagError::unavailable(PROVIDER, format!("request failed: {e}"))
    }
}

/// Map a non-success status. Server-side failures and throttling are
/// transient; `otherwise` builds the error for everything else.
fn status_error(
    status: StatusCode,
    detail: &str,
    otherwise: impl FnOnce(String) -> RagError,
) -> RagError {
    let message = format!("API returned {status}: {detail}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RagError::unavailable(PROVIDER, message)
    } else {
        otherwise(message)
    }
}

/// Read the whole body, then decode it. Transport failures while reading,
/// including the deadline, are reported like send failures.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<T> {
    let body = response.bytes().await.map_err(|e| map_send_err(e, timeout))?;
    serde_json::from_slice(&body).map_err(malformed)
}

fn malformed(e: impl std::fmt::Display) -> RagError {
    error!(provider = PROVIDER, error = %e, "failed to parse response");
    RagError::MalformedResponse {
        provider: PROVIDER.to_string(),
        message: format!("failed to parse response: {e}"),
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body)
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// Batches are sent in a single request.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl OllamaEmbeddingProvider {
    /// Create a provider with the configured dimension.
    ///
    /// Returns [`RagError::Config`] if `embedding_dimensions` is not set; use
    /// [`from_config`](Self::from_config) to ask the server instead.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let dimensions = config.embedding_dimensions.ok_or_else(|| {
            RagError::Config(
                "embedding_dimensions is required; use from_config to detect it".to_string(),
            )
        })?;
        Self::with_dimensions(config, dimensions)
    }

    /// Create a provider, probing the server for the embedding dimension when
    /// the configuration does not set one.
    pub async fn from_config(config: &OllamaConfig) -> Result<Self> {
        match config.embedding_dimensions {
            Some(dimensions) => Self::with_dimensions(config, dimensions),
            None => {
                let mut provider = Self::with_dimensions(config, 0)?;
                provider.dimensions = provider.detect_dimensions().await?;
                info!(
                    provider = PROVIDER,
                    model = %provider.model,
                    dimensions = provider.dimensions,
                    "detected embedding dimension"
                );
                Ok(provider)
            }
        }
    }

    fn with_dimensions(config: &OllamaConfig, dimensions: usize) -> Result<Self> {
        if config.embedding_dimensions == Some(0) {
            return Err(RagError::Config(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            client: config.client()?,
            url: config.endpoint("embed"),
            model: config.embedding_model.clone(),
            dimensions,
            timeout: config.timeout,
        })
    }

    /// Embed a sample string and return the length of the resulting vector.
    pub async fn detect_dimensions(&self) -> Result<usize> {
        let embedding = self.embed(DIMENSION_SAMPLE).await?;
        if embedding.is_empty() {
            return Err(RagError::MalformedResponse {
                provider: PROVIDER.to_string(),
                message: "model returned an empty embedding".to_string(),
            });
        }
        Ok(embedding.len())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::MalformedResponse {
            provider: PROVIDER.to_string(),
            message: "API returned no embeddings".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| map_send_err(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %status, "embedding API error");
            return Err(status_error(status, &detail, |message| RagError::Rejected {
                provider: PROVIDER.to_string(),
                message,
            }));
        }

        let body: EmbedResponse = read_json(response, self.timeout).await?;
        Ok(body.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`GenerativeProvider`] backed by Ollama's non-streaming `/api/chat` endpoint.
pub struct OllamaGenerativeProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaGenerativeProvider {
    /// Create a provider from the given configuration.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            url: config.endpoint("chat"),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl GenerativeProvider for OllamaGenerativeProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str, history: &[ChatTurn]) -> Result<String> {
        let messages = history
            .iter()
            .map(|turn| ChatMessage { role: turn.role, content: &turn.content })
            .chain(std::iter::once(ChatMessage { role: ChatRole::User, content: prompt }))
            .collect();
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions { temperature: self.temperature },
        };
        debug!(
            provider = PROVIDER,
            model = %self.model,
            history_turns = history.len(),
            "chat request"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_err(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %status, "chat API error");
            return Err(status_error(status, &detail, |message| RagError::Generation {
                provider: PROVIDER.to_string(),
                message,
            }));
        }

        let body: ChatResponse = read_json(response, self.timeout).await?;
        Ok(body.message.content)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    fn local_config(base_url: String, timeout: Duration) -> OllamaConfig {
        OllamaConfig { base_url, embedding_dimensions: Some(4), timeout, ..Default::default() }
    }

    /// Read one request, headers and `Content-Length` body.
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Serve a single connection: read the request, write `response`, then
    /// hold the socket open for `hold`.
    async fn serve_once(response: String, hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            read_request(&mut socket).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
            tokio::time::sleep(hold).await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn only_server_errors_and_throttling_are_transient() {
        let rejected =
            |message: String| RagError::Rejected { provider: PROVIDER.to_string(), message };
        for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::SERVICE_UNAVAILABLE] {
            assert!(status_error(status, "", rejected).is_retryable());
        }
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "", rejected).is_retryable());

        let err = status_error(StatusCode::NOT_FOUND, "model not found", rejected);
        assert!(matches!(err, RagError::Rejected { ref message, .. } if message.contains("404")));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn missing_model_is_rejected_not_retried() {
        let body = r#"{"error":"model \"nomic-embed-text\" not found"}"#;
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let url = serve_once(response, Duration::ZERO).await;
        let provider =
            OllamaEmbeddingProvider::new(&local_config(url, Duration::from_secs(5))).unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        assert!(
            matches!(err, RagError::Rejected { ref message, .. } if message.contains("not found")),
            "got {err:?}"
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = local_config(format!("http://{addr}"), Duration::from_secs(5));
        let provider = OllamaEmbeddingProvider::new(&config).unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, RagError::ProviderUnavailable { .. }), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let url = serve_once(String::new(), Duration::from_secs(10)).await;
        let timeout = Duration::from_millis(200);
        let provider = OllamaEmbeddingProvider::new(&local_config(url, timeout)).unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        assert!(
            matches!(err, RagError::ProviderTimeout { timeout: t, .. } if t == timeout),
            "got {err:?}"
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn stalled_body_times_out_instead_of_failing_to_parse() {
        let response = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                        Content-Length: 64\r\n\r\n{\"message\":";
        let url = serve_once(response.to_string(), Duration::from_secs(10)).await;
        let provider =
            OllamaGenerativeProvider::new(&local_config(url, Duration::from_millis(300))).unwrap();

        let err = provider.generate("hello", &[]).await.unwrap_err();
        assert!(matches!(err, RagError::ProviderTimeout { .. }), "got {err:?}");
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let config =
            OllamaConfig { base_url: "http://ollama:11434/".to_string(), ..Default::default() };
        assert_eq!(config.endpoint("embed"), "http://ollama:11434/api/embed");
    }

    #[test]
    fn embedding_provider_requires_a_dimension() {
        let err = OllamaEmbeddingProvider::new(&OllamaConfig::default()).err();
        assert!(matches!(err, Some(RagError::Config(_))));

        let config = OllamaConfig { embedding_dimensions: Some(768), ..Default::default() };
        let provider = OllamaEmbeddingProvider::new(&config).unwrap();
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = OllamaConfig { timeout: Duration::ZERO, ..Default::default() };
        let err = OllamaGenerativeProvider::new(&config).err();
        assert!(matches!(err, Some(RagError::Config(_))));
    }

    #[test]
    fn chat_request_serializes_history_before_prompt() {
        let history = [ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let messages: Vec<ChatMessage<'_>> = history
            .iter()
            .map(|t| ChatMessage { role: t.role, content: &t.content })
            .chain(std::iter::once(ChatMessage { role: ChatRole::User, content: "q" }))
            .collect();
        let request = ChatRequest {
            model: "llama3",
            messages,
            stream: false,
            options: ChatOptions { temperature: 0.1 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][2]["content"], "q");
        assert_eq!(json["stream"], false);
    }
}
